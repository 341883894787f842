//! Error types shared across the control pipeline.
//!
//! Clamps (joint protection, body height, step height) are not errors and have
//! no variant here.
use thiserror::Error;

use crate::robot::joint::JointKind;
use crate::robot::leg::LegId;

/// Numeric failure detected while solving a pose.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MathError {
    #[error("{leg} leg cannot reach target: distance {distance} mm, reach {reach} mm")]
    Unreachable {
        leg: LegId,
        distance: f32,
        reach: f32,
    },
    #[error("{leg} leg target too close to the femur pivot: distance {distance} mm, minimum {minimum} mm")]
    TooClose {
        leg: LegId,
        distance: f32,
        minimum: f32,
    },
    #[error("surface normal is parallel to the leg plane")]
    DegenerateSurface,
    #[error("gait trajectory has zero radius")]
    DegenerateTrajectory,
    #[error("{count} legs given, at most {max} can be solved")]
    TooManyLegs { count: usize, max: usize },
}

/// Servo conversion failure, always treated as a math fault by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ServoError {
    #[error("servo channel {0} does not exist")]
    InvalidChannel(usize),
    #[error("servo {channel} physic angle {angle} out of range")]
    PhysicAngleOutOfRange { channel: usize, angle: f32 },
    #[error("servo {channel} pulse width {width} us out of range")]
    PulseWidthOutOfRange { channel: usize, width: f32 },
}

/// Byte-level failure reported by a configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("address {address:#06x}..+{len} outside the store")]
    OutOfBounds { address: u16, len: usize },
    #[error("store device not responding")]
    Device,
}

/// Start-up calibration failure. The core stays disabled.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("page {page} checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { page: usize, stored: u32, computed: u32 },
    #[error("{leg} {joint} length {length} mm is invalid")]
    InvalidLength {
        leg: LegId,
        joint: JointKind,
        length: u16,
    },
    #[error("{leg} {joint} protection [{min}, {max}] is empty")]
    InvalidProtection {
        leg: LegId,
        joint: JointKind,
        min: i16,
        max: i16,
    },
    #[error("{leg} {joint} zero rotate {value} outside [-360, 360]")]
    InvalidZeroRotate {
        leg: LegId,
        joint: JointKind,
        value: i16,
    },
}

/// One or more PWM periods elapsed without a control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missed {missed} pwm period(s)")]
pub struct SyncError {
    pub missed: u32,
}

/// Unrecoverable state; the caller must stop motion and enter the emergency loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("fatal system error, status word {status:#06x}")]
pub struct FatalError {
    pub status: u16,
}
