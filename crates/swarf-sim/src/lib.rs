#![warn(missing_docs)]

//! The simulation orchestrator.
//!
//! One *transaction* is the unit of work: ask the motion player for the
//! next pose, subtract the positioned cutter from the octree with
//! collision reporting, convert removed material into spindle power,
//! re-extract the invalidated cells, swap the geometry buffers for the
//! renderer, and only then request the next pose. Transactions are
//! strictly serialised; the octree is observably consistent only at their
//! boundaries, which is why pause and stop take effect between
//! transactions, never inside one.

mod events;
mod simulator;

pub use events::{SimCommand, SimEvent, SimWarning, WarningKind};
pub use simulator::{SimState, Simulator};

use thiserror::Error;

/// Errors that abort the simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// A CSG operation hit an internal invariant violation.
    #[error(transparent)]
    Tree(#[from] swarf_octree::TreeError),

    /// The program could not be loaded.
    #[error(transparent)]
    Motion(#[from] swarf_motion::MotionError),
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
