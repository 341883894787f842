//! Joint enumeration and the per-joint geometry record.
//!
//! Defines [`JointKind`] for identifying each joint (coxa, femur, tibia) and
//! [`Joint`], which carries the fixed length, calibration and travel
//! protection together with the angle solved on every control tick.
use core::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Coxa = 0,
    Femur = 1,
    Tibia = 2,
}

impl JointKind {
    pub const ALL: [JointKind; 3] = [JointKind::Coxa, JointKind::Femur, JointKind::Tibia];
}

impl Display for JointKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JointKind::Coxa => f.write_str("coxa"),
            JointKind::Femur => f.write_str("femur"),
            JointKind::Tibia => f.write_str("tibia"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    /// Link length in mm.
    pub length: f32,
    /// Mounting rotation in degrees.
    pub zero_rotate: f32,
    /// Last solved angle in degrees, already clamped.
    pub angle: f32,
    pub min_angle: f32,
    pub max_angle: f32,
}

impl Joint {
    pub const fn new(length: f32, zero_rotate: f32, min_angle: f32, max_angle: f32) -> Self {
        Self {
            length,
            zero_rotate,
            angle: 0.0,
            min_angle,
            max_angle,
        }
    }

    /// Limits `angle` to the joint travel protection.
    pub fn clamp(&self, angle: f32) -> f32 {
        angle.clamp(self.min_angle, self.max_angle)
    }
}
