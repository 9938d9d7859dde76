#![warn(missing_docs)]

//! Machine envelope: soft axis limits, feed rates, spindle power budget
//! and tool-holder geometry.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use swarf_motion::Pose;

/// Bit set of exceeded axis limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitFlags(u32);

impl LimitFlags {
    /// No limit exceeded.
    pub const NONE: Self = Self(0);
    /// X above its maximum.
    pub const MAX_X: Self = Self(0x001);
    /// X below its minimum.
    pub const MIN_X: Self = Self(0x002);
    /// Y above its maximum.
    pub const MAX_Y: Self = Self(0x004);
    /// Y below its minimum.
    pub const MIN_Y: Self = Self(0x008);
    /// Z above its maximum.
    pub const MAX_Z: Self = Self(0x010);
    /// Z below its minimum.
    pub const MIN_Z: Self = Self(0x020);
    /// A above its maximum.
    pub const MAX_A: Self = Self(0x040);
    /// A below its minimum.
    pub const MIN_A: Self = Self(0x080);
    /// B above its maximum.
    pub const MAX_B: Self = Self(0x100);
    /// B below its minimum.
    pub const MIN_B: Self = Self(0x200);
    /// C above its maximum.
    pub const MAX_C: Self = Self(0x400);
    /// C below its minimum.
    pub const MIN_C: Self = Self(0x800);

    /// True if no limit is exceeded.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for LimitFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LimitFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for LimitFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(u32, &str); 12] = [
            (0x001, "MAX_X"),
            (0x002, "MIN_X"),
            (0x004, "MAX_Y"),
            (0x008, "MIN_Y"),
            (0x010, "MAX_Z"),
            (0x020, "MIN_Z"),
            (0x040, "MAX_A"),
            (0x080, "MIN_A"),
            (0x100, "MAX_B"),
            (0x200, "MIN_B"),
            (0x400, "MAX_C"),
            (0x800, "MIN_C"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|&(_, name)| name)
            .collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("+"))
        }
    }
}

/// The machine's working envelope and power budget.
///
/// Rotational limits are optional: an absent limit never fires. Linear
/// axes get a generous default envelope. All angles are radians.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineEnvelope {
    /// X travel limits.
    pub max_x_limit: f64,
    /// Minimum X.
    pub min_x_limit: f64,
    /// Maximum Y.
    pub max_y_limit: f64,
    /// Minimum Y.
    pub min_y_limit: f64,
    /// Maximum Z.
    pub max_z_limit: f64,
    /// Minimum Z.
    pub min_z_limit: f64,
    /// Maximum A in radians, if limited.
    pub max_a_limit: Option<f64>,
    /// Minimum A.
    pub min_a_limit: Option<f64>,
    /// Maximum B.
    pub max_b_limit: Option<f64>,
    /// Minimum B.
    pub min_b_limit: Option<f64>,
    /// Maximum C.
    pub max_c_limit: Option<f64>,
    /// Minimum C.
    pub min_c_limit: Option<f64>,
    /// Z limits shift down by this much; set to the current tool length.
    pub z_limit_offset: f64,
    /// Maximum cutting feed rate.
    pub max_feed_rate: f64,
    /// Rapid traverse feed rate.
    pub traverse_feed_rate: f64,
    /// Spindle power cap in watts.
    pub max_spindle_power: f64,
    /// Tool holder radius.
    pub holder_radius: f64,
    /// Tool holder length.
    pub holder_length: f64,
    /// Spindle nose radius.
    pub spindle_radius: f64,
    /// Spindle nose length.
    pub spindle_length: f64,
    /// Radius of the rendered scene.
    pub scene_radius: f64,
}

impl Default for MachineEnvelope {
    fn default() -> Self {
        Self {
            max_x_limit: 500.0,
            min_x_limit: -500.0,
            max_y_limit: 500.0,
            min_y_limit: -500.0,
            max_z_limit: 500.0,
            min_z_limit: 0.0,
            max_a_limit: None,
            min_a_limit: None,
            max_b_limit: None,
            min_b_limit: None,
            max_c_limit: None,
            min_c_limit: None,
            z_limit_offset: 0.0,
            max_feed_rate: 4000.0,
            traverse_feed_rate: 8000.0,
            max_spindle_power: 2000.0,
            holder_radius: 30.0,
            holder_length: 50.0,
            spindle_radius: 60.0,
            spindle_length: 200.0,
            scene_radius: 300.0,
        }
    }
}

impl MachineEnvelope {
    /// Which limits the pose exceeds; NaN limits never fire.
    pub fn check_limits(&self, pose: &Pose) -> LimitFlags {
        let mut result = LimitFlags::NONE;
        let p = pose.loc;
        let d = pose.dir;
        if p.x > self.max_x_limit {
            result |= LimitFlags::MAX_X;
        } else if p.x < self.min_x_limit {
            result |= LimitFlags::MIN_X;
        }
        if p.y > self.max_y_limit {
            result |= LimitFlags::MAX_Y;
        } else if p.y < self.min_y_limit {
            result |= LimitFlags::MIN_Y;
        }
        if p.z > self.max_z_limit - self.z_limit_offset {
            result |= LimitFlags::MAX_Z;
        } else if p.z < self.min_z_limit - self.z_limit_offset {
            result |= LimitFlags::MIN_Z;
        }
        if self.max_a_limit.is_some_and(|lim| d.x > lim) {
            result |= LimitFlags::MAX_A;
        } else if self.min_a_limit.is_some_and(|lim| d.x < lim) {
            result |= LimitFlags::MIN_A;
        }
        if self.max_b_limit.is_some_and(|lim| d.y > lim) {
            result |= LimitFlags::MAX_B;
        } else if self.min_b_limit.is_some_and(|lim| d.y < lim) {
            result |= LimitFlags::MIN_B;
        }
        if self.max_c_limit.is_some_and(|lim| d.z > lim) {
            result |= LimitFlags::MAX_C;
        } else if self.min_c_limit.is_some_and(|lim| d.z < lim) {
            result |= LimitFlags::MIN_C;
        }
        result
    }
}

/// Converts removed material per step into required spindle power.
#[derive(Debug, Clone, Copy)]
pub struct SpindlePower {
    coefficient: f64,
    max_power: f64,
}

impl SpindlePower {
    /// Create the power meter from the deepest-cell size, the specific
    /// cutting force coefficient and the spindle's power cap.
    pub fn new(cube_resolution: f64, specific_cutting_force: f64, max_power: f64) -> Self {
        Self {
            coefficient: cube_resolution * cube_resolution * specific_cutting_force
                / (60.0 * 16.0 * 1e3),
            max_power,
        }
    }

    /// Required power in watts for one cut step.
    pub fn required(&self, cut_count: u32, feed: f64) -> f64 {
        self.coefficient * f64::from(cut_count) * feed
    }

    /// True if the step exceeds the spindle's power cap.
    pub fn over_limit(&self, cut_count: u32, feed: f64) -> bool {
        self.required(cut_count, feed) > self.max_power
    }

    /// The configured power cap.
    pub fn max_power(&self) -> f64 {
        self.max_power
    }
}
