//! Commands into and events out of the simulator.

use swarf_machine::LimitFlags;
use swarf_motion::{MotionFlags, Pose, Progress};
use swarf_volume::CollisionFlags;

/// Control commands accepted between transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    /// Start or resume execution.
    Play,
    /// Finish the in-flight transaction, then stop dispatching.
    Pause,
    /// Finish the in-flight transaction, then discard the rest of the
    /// program.
    Stop,
}

/// What triggered a warning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarningKind {
    /// A guarded tool region (or protected part material) was cut.
    Collision(CollisionFlags),
    /// An axis travel limit was exceeded.
    Limit(LimitFlags),
    /// The required spindle power exceeded the cap (watts carried).
    PowerOver(f64),
    /// Material was removed with the spindle stopped or during a rapid.
    Advisory(MotionFlags),
}

/// A structured warning, attributable to the program line that produced
/// the triggering pose.
#[derive(Debug, Clone)]
pub struct SimWarning {
    /// What happened.
    pub kind: WarningKind,
    /// Tool pose at the time.
    pub pose: Pose,
    /// Canonical line index.
    pub line: usize,
    /// Interpreter sequence number of that line.
    pub seq: usize,
    /// Verbatim canonical line.
    pub tag: String,
    /// True if this warning pauses execution.
    pub hard: bool,
}

impl std::fmt::Display for SimWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::Collision(c) => write!(f, "{c} collision")?,
            WarningKind::Limit(l) => write!(f, "machine limit {l}")?,
            WarningKind::PowerOver(w) => write!(f, "power over: {w:.1} W required")?,
            WarningKind::Advisory(m) => {
                if m.intersects(MotionFlags::TRAVERSE) {
                    write!(f, "cutting at traverse speed")?
                } else {
                    write!(f, "cutting with spindle stopped")?
                }
            }
        }
        write!(
            f,
            " at line {} (X:{:.3} Y:{:.3} Z:{:.3})",
            self.seq, self.pose.loc.x, self.pose.loc.y, self.pose.loc.z
        )
    }
}

/// Observable simulator output.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// The tool reached a new pose.
    ToolPosition {
        /// World pose.
        pose: Pose,
        /// Canonical line index.
        line: usize,
    },
    /// A different tool slot was loaded.
    ToolChange(usize),
    /// Program progress.
    Progress(Progress),
    /// A structured warning.
    Warning(SimWarning),
    /// Free-form diagnostics.
    Debug(String),
    /// The program ran to its end.
    Finished,
}
