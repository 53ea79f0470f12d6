/// Error types for the fallible seams: configuration and level loading.
/// The simulation tick itself never fails.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level has no rows")]
    Empty,
    #[error("row {row} has {found} columns, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("unknown tile glyph {ch:?} at row {row}, col {col}")]
    UnknownTile { row: usize, col: usize, ch: char },
    #[error("level has no player spawn")]
    MissingPlayerSpawn,
    #[error("unknown unicorn profile: {0}")]
    UnknownProfile(String),
    #[error("bad portal definition: {0}")]
    BadPortal(String),
    #[error("bad metadata line: {0}")]
    BadMetadata(String),
    #[error("no levels available")]
    NoLevels,
    #[error("could not read level file: {0}")]
    Io(#[from] std::io::Error),
}
