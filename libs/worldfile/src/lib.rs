//! A Player/Stage world-file parser.
//!
//! World files describe simulated environments as a tree of *entities*
//! (`name ( … )`) carrying *properties* (`name value` or `name [v v v]`),
//! with `define` macros and `include "file"` directives. Reading is
//! two-phase: a tokeniser produces a flat token stream (includes are
//! spliced in at this stage, resolved relative to the including file), and
//! a recursive-descent pass builds the entity/property tables.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), worldfile::Error> {
//! let world = worldfile::WorldFile::load("cave.world")?;
//! if let Some(robot) = world.find_entity("position") {
//!     let x = world.get_tuple_f64(robot, "pose", 0, 0.0);
//!     let y = world.get_tuple_f64(robot, "pose", 1, 0.0);
//!     println!("robot at ({x}, {y})");
//! }
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

mod lexer;
mod parser;

use std::path::Path;

use arcstr::ArcStr;
use tracing::debug;

pub use lexer::Token;

/// The maximum depth of nested `include` directives.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Errors produced while reading a world file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The tokeniser or parser rejected the input.
    #[error("syntax error at line {line}: unexpected `{token}`")]
    Syntax {
        /// 1-based line of the offending token.
        line: usize,
        /// The token that could not be handled.
        token: String,
    },
    /// Too many nested `include` directives (likely a cycle).
    #[error("include depth exceeded at `{0}`")]
    IncludeDepth(String),
}

/// A specialized [`Result`] for world-file reading.
pub type Result<T> = std::result::Result<T, Error>;

/// One entity of the world tree.
#[derive(Debug, Clone)]
pub(crate) struct Entity {
    pub(crate) parent: Option<usize>,
    pub(crate) kind: ArcStr,
}

/// One property attached to an entity.
#[derive(Debug, Clone)]
pub(crate) struct Property {
    pub(crate) entity: usize,
    pub(crate) name: ArcStr,
    pub(crate) values: Vec<String>,
}

/// A parsed world file.
///
/// Entity `0` is the implicit global entity with the empty type; top-level
/// properties such as `unit_length` or `resolution` attach to it.
#[derive(Debug, Clone)]
pub struct WorldFile {
    entities: Vec<Entity>,
    properties: Vec<Property>,
}

impl WorldFile {
    /// Reads and parses a world file, following includes.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading world file");
        let tokens = lexer::tokenize_file(path, 0)?;
        parser::parse(&tokens)
    }

    /// Parses world-file text directly (no include resolution).
    pub fn parse_str(input: &str) -> Result<Self> {
        let tokens = lexer::tokenize(input)?;
        parser::parse(&tokens)
    }

    /// The number of entities, including the global entity `0`.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// The type name of an entity (empty for the global entity).
    pub fn entity_type(&self, entity: usize) -> &str {
        &self.entities[entity].kind
    }

    /// The parent of an entity, if any.
    pub fn parent(&self, entity: usize) -> Option<usize> {
        self.entities[entity].parent
    }

    /// Finds the first entity of the given type, case-insensitively.
    pub fn find_entity(&self, kind: &str) -> Option<usize> {
        self.entities
            .iter()
            .position(|e| e.kind.eq_ignore_ascii_case(kind))
    }

    /// The first value of a property of an entity, if present.
    pub fn get_str(&self, entity: usize, name: &str) -> Option<&str> {
        self.property(entity, name)
            .and_then(|p| p.values.first())
            .map(String::as_str)
    }

    /// A property value parsed as `f64`, or `default` when the property is
    /// absent or non-numeric.
    pub fn get_f64(&self, entity: usize, name: &str, default: f64) -> f64 {
        self.get_str(entity, name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// One element of a tuple property parsed as `f64`, or `default`.
    pub fn get_tuple_f64(&self, entity: usize, name: &str, index: usize, default: f64) -> f64 {
        self.property(entity, name)
            .and_then(|p| p.values.get(index))
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// The number of values carried by a property (0 when absent).
    pub fn property_len(&self, entity: usize, name: &str) -> usize {
        self.property(entity, name).map_or(0, |p| p.values.len())
    }

    fn property(&self, entity: usize, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.entity == entity && p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_entities_and_properties() {
        let world = WorldFile::parse_str(
            "# a cave world\n\
             unit_length \"m\"\n\
             resolution 0.1\n\
             position ( pose [1.5 2.5 90] port 6665 )\n",
        )
        .unwrap();
        assert_eq!(world.num_entities(), 2);
        let robot = world.find_entity("position").unwrap();
        assert_eq!(world.get_tuple_f64(robot, "pose", 0, 0.0), 1.5);
        assert_eq!(world.get_tuple_f64(robot, "pose", 1, 0.0), 2.5);
        assert_eq!(world.get_tuple_f64(robot, "pose", 2, 0.0), 90.0);
        assert_eq!(world.get_f64(robot, "port", 0.0), 6665.0);
        assert_eq!(world.get_str(0, "unit_length"), Some("m"));
        assert_eq!(world.get_f64(0, "resolution", -1.0), 0.1);
    }

    #[test]
    fn nested_entities_record_parents() {
        let world = WorldFile::parse_str(
            "environment ( file \"cave.pnm\" position ( pose [1 1 0] ) )\n",
        )
        .unwrap();
        let env = world.find_entity("environment").unwrap();
        let robot = world.find_entity("position").unwrap();
        assert_eq!(world.parent(robot), Some(env));
        assert_eq!(world.get_str(env, "file"), Some("cave.pnm"));
    }

    #[test]
    fn define_macro_expands_to_entity_body() {
        let world = WorldFile::parse_str(
            "define pioneer position ( shape \"circle\" )\n\
             pioneer ( pose [3 4 0] )\n",
        )
        .unwrap();
        let robot = world.find_entity("position").unwrap();
        assert_eq!(world.get_str(robot, "shape"), Some("circle"));
        assert_eq!(world.get_tuple_f64(robot, "pose", 0, 0.0), 3.0);
    }

    #[test]
    fn unknown_construct_fails_with_line() {
        let err = WorldFile::parse_str("position ( pose [1 2 3] )\n% bogus\n").unwrap_err();
        match err {
            Error::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {other}"),
        }
    }

    #[test]
    fn includes_are_spliced_relative_to_the_including_file() {
        let dir = tempfile::tempdir().unwrap();
        let inc = dir.path().join("common.inc");
        writeln!(std::fs::File::create(&inc).unwrap(), "resolution 0.25").unwrap();
        let world_path = dir.path().join("main.world");
        writeln!(
            std::fs::File::create(&world_path).unwrap(),
            "include \"common.inc\"\nposition ( pose [0 0 0] )"
        )
        .unwrap();

        let world = WorldFile::load(&world_path).unwrap();
        assert_eq!(world.get_f64(0, "resolution", -1.0), 0.25);
        assert!(world.find_entity("position").is_some());
    }
}
