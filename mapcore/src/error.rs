//! The error taxonomy surfaced to callers.

use std::path::PathBuf;

/// Errors produced by map operations and format adapters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file could not be opened for reading.
    #[error("could not open `{0}`")]
    FileOpen(PathBuf),
    /// A file could not be created or written.
    #[error("could not save `{0}`")]
    FileSave(PathBuf),
    /// A structural failure while parsing a text format.
    #[error("parse error at line {line}: unexpected `{token}`")]
    Parse {
        /// 1-based line number where parsing failed.
        line: usize,
        /// The offending token.
        token: String,
    },
    /// The operation requires a populated map.
    #[error("no map loaded")]
    NoMapLoaded,
    /// An allocation required by a bulk operation failed.
    #[error("out of memory during bulk operation")]
    OutOfMemory,
    /// The file is recognised but not supported.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// A parameter was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A specialized [`Result`] for map operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A generic parse failure on an unknown token.
    pub(crate) fn parse(line: usize, token: impl Into<String>) -> Self {
        Self::Parse {
            line,
            token: token.into(),
        }
    }
}

impl From<worldfile::Error> for Error {
    fn from(e: worldfile::Error) -> Self {
        match e {
            worldfile::Error::Io(_) => Self::FileOpen(PathBuf::new()),
            worldfile::Error::Syntax { line, token } => Self::Parse { line, token },
            worldfile::Error::IncludeDepth(path) => Self::UnsupportedFormat(format!(
                "include depth exceeded at `{path}`"
            )),
        }
    }
}
