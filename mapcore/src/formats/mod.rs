//! Readers and writers for the supported map file formats.

pub(crate) mod beesoft;
pub(crate) mod carmen;
pub(crate) mod mapviewer;
pub(crate) mod path;
pub(crate) mod pnm;
pub(crate) mod pointlist;
pub(crate) mod rossum;
pub(crate) mod saphira;
pub(crate) mod stage;
pub(crate) mod voronoi_file;

use std::path::Path;

use blockgrid::GridMap;
use tracing::debug;

use crate::error::{Error, Result};

/// A whitespace token stream with line tracking, shared by the textual
/// parsers.
pub(crate) struct TextTokens {
    tokens: Vec<(String, usize)>,
    pos: usize,
}

impl TextTokens {
    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|_| Error::FileOpen(path.to_path_buf()))?;
        Ok(Self::from_str(&text))
    }

    pub(crate) fn from_str(text: &str) -> Self {
        let mut tokens = Vec::new();
        for (i, line) in text.lines().enumerate() {
            for word in line.split_whitespace() {
                tokens.push((word.to_owned(), i + 1));
            }
        }
        Self { tokens, pos: 0 }
    }

    /// The line of the most recently consumed token.
    pub(crate) fn line(&self) -> usize {
        if self.pos == 0 {
            1
        } else {
            self.tokens[self.pos - 1].1
        }
    }

    pub(crate) fn next(&mut self) -> Option<&str> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(&t.0)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn expect(&mut self) -> Result<String> {
        let line = self.line();
        match self.next() {
            Some(t) => Ok(t.to_owned()),
            None => Err(Error::parse(line, "<eof>")),
        }
    }

    pub(crate) fn expect_i64(&mut self) -> Result<i64> {
        let t = self.expect()?;
        t.parse().map_err(|_| Error::parse(self.line(), t))
    }

    pub(crate) fn expect_f32(&mut self) -> Result<f32> {
        let t = self.expect()?;
        t.parse().map_err(|_| Error::parse(self.line(), t))
    }
}

/// Loads any supported grid map format into `map`, trying MapViewer,
/// Carmen, Beesoft and the legacy grid format in that order.
pub(crate) fn load_grid_file(path: &Path, map: &mut GridMap) -> Result<()> {
    match mapviewer::parse_file(path) {
        Ok(parsed) => {
            if let Some(grid) = parsed.grid {
                debug!(path = %path.display(), "loaded as MapViewer grid");
                *map = grid;
                return Ok(());
            }
        }
        Err(Error::FileOpen(p)) => return Err(Error::FileOpen(p)),
        Err(_) => {}
    }
    if carmen::load_into(path, map).is_ok() {
        debug!(path = %path.display(), "loaded as Carmen grid");
        return Ok(());
    }
    if beesoft::load_into(path, map).is_ok() {
        debug!(path = %path.display(), "loaded as Beesoft grid");
        return Ok(());
    }
    if map.load(path).is_ok() {
        debug!(path = %path.display(), "loaded as legacy grid");
        return Ok(());
    }
    Err(Error::UnsupportedFormat(format!(
        "`{}` is not a recognised grid map",
        path.display()
    )))
}

impl crate::MapCore {
    /// Loads a grid map in any supported format (MapViewer, Carmen,
    /// Beesoft or the legacy grid format).
    pub fn load_grid_map(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.load_map_viewer(path).is_ok() {
            return Ok(());
        }
        let mut map = GridMap::new();
        if let Err(e) = load_grid_file(path, &mut map) {
            self.set_error_strings("Error!", "Failed to parse the grid map file");
            return Err(e);
        }
        self.add_map(map);
        self.set_view_grid_map(true);
        self.set_view_vector_map(false);
        Ok(())
    }

    /// Saves the displayed grid in the legacy grid format.
    pub fn save_grid_map(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut map = GridMap::with_default_value(blockgrid::DEFAULT_BLOCK_SIZE, -1.0);
        self.latest_grid_map(&mut map);
        map.save(path).map_err(|_| Error::FileSave(path.to_path_buf()))
    }
}
