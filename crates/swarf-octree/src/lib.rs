#![warn(missing_docs)]

//! Adaptive signed-distance octree for the swarf cutting simulation.
//!
//! The stock is a rooted 8-ary tree of cubes storing the distance field at
//! the eight corners of every cell. CSG operations walk the tree, update
//! corner samples through the min/max monoid of the operation, subdivide
//! undecided cells down to the depth budget, and prune subtrees that
//! become uniform. Cells whose state changed are flagged for the
//! iso-surface extractor through a validity bit that propagates towards
//! the root.

mod node;
mod tree;

pub use node::{Node, NodeState, CORNER_DIRECTIONS};
pub use tree::{CuttingStatus, Octree, TreeStats};

use thiserror::Error;

/// Errors from octree CSG operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Pruning was attempted on children with disagreeing states.
    ///
    /// This is an internal invariant violation; the operation that
    /// detected it is aborted.
    #[error("cannot prune at depth {depth}: children disagree on state")]
    PruneStateMismatch {
        /// Depth of the parent whose children disagreed.
        depth: u8,
    },

    /// The maximum depth passed to the constructor is too small.
    #[error("octree max depth must be at least 3, got {0}")]
    DepthTooSmall(u8),
}

/// Result type for octree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
