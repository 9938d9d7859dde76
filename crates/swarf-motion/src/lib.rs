#![warn(missing_docs)]

//! Canonical tool motion for the swarf cutting simulation.
//!
//! An RS-274 interpreter reduces a part program to a stream of *canonical
//! lines*: straight moves, helical arcs, and motionless state changes
//! (spindle, coolant, feed, tool, plane, origin). This crate parses that
//! stream, threads the machine status through it, and samples the
//! resulting motions into tool poses at a bounded step size for the
//! simulation to consume one at a time.

mod canon;
mod interp;
mod motion;
mod player;
mod status;

pub use canon::{parse_canon_line, parse_canon_lines, CanonicalLine};
pub use interp::Interpreter;
pub use motion::{HelicalMotion, Motion, StraightMotion};
pub use player::{MotionPlayer, PlayerStep, Progress, Sample};
pub use status::{Coolant, MachineStatus, MotionFlags, Plane, Pose, SpindleStatus};

use thiserror::Error;

/// Errors from canonical-line parsing and interpreter driving.
#[derive(Debug, Error)]
pub enum MotionError {
    /// A canonical line could not be parsed.
    #[error("malformed canonical line {line}: {reason}")]
    Malformed {
        /// 1-based line number in the canonical stream.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// The canonical stream ended without a program end command.
    #[error("program not terminated by PROGRAM_END")]
    Unterminated,

    /// The interpreter subprocess failed.
    #[error("interpreter failed: {0}")]
    Interpreter(String),

    /// The interpreter produced no output within the timeout budget.
    #[error("timed out waiting for interpreter output")]
    InterpreterTimeout,

    /// I/O failure talking to the interpreter or reading a program.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for motion operations.
pub type Result<T> = std::result::Result<T, MotionError>;
