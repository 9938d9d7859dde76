//! Machine state threaded through the canonical command stream.

use std::ops::{BitOr, BitOrAssign};

use swarf_math::{Point3, Vec3};

/// A six-axis pose: tool position and tool-axis direction angles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Position.
    pub loc: Vec3,
    /// Rotational axes (A, B, C) in radians.
    pub dir: Vec3,
}

impl Pose {
    /// Create a pose.
    pub fn new(loc: Vec3, dir: Vec3) -> Self {
        Self { loc, dir }
    }

    /// Position as a point.
    pub fn point(&self) -> Point3 {
        Point3::from(self.loc)
    }
}

/// Spindle rotation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpindleStatus {
    /// Stopped.
    #[default]
    Off,
    /// Turning clockwise.
    Cw,
    /// Turning counterclockwise.
    Ccw,
    /// Stopped with the brake engaged.
    Brake,
}

/// Coolant switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coolant {
    /// Flood coolant on.
    pub flood: bool,
    /// Mist coolant on.
    pub mist: bool,
}

/// The plane selected for arc interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plane {
    /// Arcs in XY, helix along Z.
    #[default]
    Xy,
    /// Arcs in YZ, helix along X.
    Yz,
    /// Arcs in XZ, helix along Y.
    Xz,
}

impl Plane {
    /// World-axis indices `(first, second, helix)` of the plane's two arc
    /// coordinates and the helix translation axis, in canonical RS-274
    /// order (G18 arcs are Z–X).
    pub fn axes(&self) -> (usize, usize, usize) {
        match self {
            Plane::Xy => (0, 1, 2),
            Plane::Yz => (1, 2, 0),
            Plane::Xz => (2, 0, 1),
        }
    }
}

/// Bit set describing the motion kind, spindle state and plunge
/// direction of one emitted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionFlags(u32);

impl MotionFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Motionless command.
    pub const MOTIONLESS: Self = Self(0x1);
    /// Helical arc motion.
    pub const HELICAL: Self = Self(0x2);
    /// Straight cutting feed.
    pub const STRAIGHT_FEED: Self = Self(0x4);
    /// Rapid traverse.
    pub const TRAVERSE: Self = Self(0x8);
    /// Spindle stopped.
    pub const SPINDLE_OFF: Self = Self(0x100);
    /// Spindle turning clockwise.
    pub const SPINDLE_CW: Self = Self(0x200);
    /// Spindle turning counterclockwise.
    pub const SPINDLE_CCW: Self = Self(0x400);
    /// Spindle brake engaged.
    pub const SPINDLE_BRAKE: Self = Self(0x800);
    /// The move descends in Z.
    pub const PLUNGE_NEG: Self = Self(0x1000);
    /// The move ascends in Z.
    pub const PLUNGE_POS: Self = Self(0x2000);

    /// Cutting while any of these is set deserves a warning: material
    /// removal with the spindle stopped or during a rapid.
    pub const ADVISORY: Self =
        Self(Self::SPINDLE_OFF.0 | Self::SPINDLE_BRAKE.0 | Self::TRAVERSE.0);

    /// True if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if any bit of `other` is set in `self`.
    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// The bits of `self` that are also in `other`.
    pub fn intersection(&self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Raw bit representation.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for MotionFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MotionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<SpindleStatus> for MotionFlags {
    fn from(s: SpindleStatus) -> Self {
        match s {
            SpindleStatus::Off => MotionFlags::SPINDLE_OFF,
            SpindleStatus::Cw => MotionFlags::SPINDLE_CW,
            SpindleStatus::Ccw => MotionFlags::SPINDLE_CCW,
            SpindleStatus::Brake => MotionFlags::SPINDLE_BRAKE,
        }
    }
}

/// The machine's state after execution of one canonical command.
///
/// `start_pose`/`end_pose` are program coordinates; the user origin is
/// added when motions are evaluated.
#[derive(Debug, Clone)]
pub struct MachineStatus {
    /// Pose at the start of the current command.
    pub start_pose: Pose,
    /// Pose at the end of the current command.
    pub end_pose: Pose,
    /// Active feed rate.
    pub feed: f64,
    /// Spindle speed in RPM.
    pub spindle_speed: f64,
    /// Spindle rotation state.
    pub spindle: SpindleStatus,
    /// Coolant switches.
    pub coolant: Coolant,
    /// Arc plane.
    pub plane: Plane,
    /// User origin offset applied to all motions.
    pub origin: Pose,
    /// Selected tool slot.
    pub tool: usize,
}

impl MachineStatus {
    /// Initial status at a given pose with a user origin.
    pub fn new(initial: Pose, origin: Pose) -> Self {
        Self {
            start_pose: initial,
            end_pose: initial,
            feed: 0.0,
            spindle_speed: 0.0,
            spindle: SpindleStatus::Off,
            coolant: Coolant::default(),
            plane: Plane::Xy,
            origin,
            tool: 0,
        }
    }

    /// Status for the next command: the end pose becomes the start pose.
    pub fn advance(&self) -> Self {
        let mut next = self.clone();
        next.start_pose = self.end_pose;
        next
    }
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self::new(Pose::default(), Pose::default())
    }
}
