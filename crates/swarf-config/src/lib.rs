#![warn(missing_docs)]

//! Configuration parsing for the swarf cutting simulation.
//!
//! Three line-oriented, whitespace-tokenised formats come in from the
//! outside world: the setup file (octree, step size, stock and parts
//! blocks), the machine-spec file (axis limits, feeds, spindle power,
//! holder geometry) and the tool table (one cutter per slot). Angles are
//! degrees in the files and radians everywhere inside.
//!
//! Setup and machine-spec parsing recover per line: a bad directive is
//! reported, skipped, and counted; loading continues and the aggregate
//! error count is surfaced to the caller.

mod lexer;
mod machine_spec;
mod paths;
mod setup;
mod tooltable;

pub use lexer::LineLexer;
pub use machine_spec::parse_machine_spec;
pub use paths::PersistedPaths;
pub use setup::{CsgOp, SetupConfig, StockVolume};
pub use tooltable::ToolTable;

use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read at all.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An STL file referenced by a stock block failed to load.
    #[error(transparent)]
    Volume(#[from] swarf_volume::VolumeError),

    /// Persisted state could not be decoded.
    #[error("bad persisted state: {0}")]
    Persisted(#[from] serde_json::Error),
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;
