//! Compile-time constants for the hexapod: factory geometry, motion limits,
//! PWM timing and the servo model.
//!
//! Runtime calibration (lengths, zero rotations, trims) is loaded from the
//! configuration store, see [`crate::storage`]. The values here are the factory
//! defaults written into a fresh store image.

// ROBOT SIZE
pub const LEGS_COUNT: usize = 6;
pub const JOINTS_PER_LEG: usize = 3;
pub const SERVO_CHANNELS: usize = LEGS_COUNT * JOINTS_PER_LEG;

pub const COXA_LENGTH: u16 = 53;
pub const FEMUR_LENGTH: u16 = 76;
pub const TIBIA_LENGTH: u16 = 137;

pub const COXA_ZERO_ROTATE: [i16; LEGS_COUNT] = [135, 180, 225, 45, 0, 315];
pub const FEMUR_ZERO_ROTATE: i16 = 35;
pub const TIBIA_ZERO_ROTATE: i16 = 135;

/// Travel protection as `(min, max)` degrees.
pub const COXA_PROTECTION: (i16, i16) = (-45, 45);
pub const FEMUR_PROTECTION: (i16, i16) = (-90, 65);
pub const TIBIA_PROTECTION: (i16, i16) = (-85, 65);

/// Neutral foot placement per leg, leg-local frame (mm).
pub const BASE_POSITIONS: [[f32; 3]; LEGS_COUNT] = [
    [-115.0, 0.0, 70.0],
    [-135.0, 0.0, 0.0],
    [-115.0, 0.0, -70.0],
    [115.0, 0.0, 70.0],
    [135.0, 0.0, 0.0],
    [115.0, 0.0, -70.0],
];

///CONST FOR MOVEMENT
pub const SURFACE_MAX_STEP: f32 = 1.5;
pub const LIMB_MAX_STEP: f32 = 1.5;

pub const STEP_HEIGHT_MIN: f32 = 15.0;
pub const STEP_HEIGHT_MAX: f32 = 60.0;
pub const STEP_HEIGHT_DEFAULT: f32 = 30.0;

/// Body resting on the ground.
pub const SURFACE_DOWN_HEIGHT: f32 = -15.0;
/// Fully extended legs.
pub const SURFACE_MAX_HEIGHT: f32 = -150.0;
/// The body counts as raised once the surface is at or below this height.
pub const SURFACE_UP_THRESHOLD: f32 = -85.0;
/// Largest surface tilt about X or Z, degrees. Rotation about Y is free.
pub const SURFACE_MAX_TILT: f32 = 6.4;

pub const MOTION_TIME_MIN: u32 = 0;
pub const MOTION_TIME_MID: u32 = 500;
pub const MOTION_TIME_MAX: u32 = 1000;
pub const MOTION_TIME_STEP: u32 = 20;

/// Idle time in `MotionExec` with a zero distance before the legs are lowered.
pub const LIMBS_DOWN_TIMEOUT_MS: u32 = 100;

// PWM
pub const PWM_START_FREQUENCY_HZ: u32 = 200;
pub const PWM_MIN_FREQUENCY_HZ: u32 = 60;
pub const PWM_MAX_FREQUENCY_HZ: u32 = 200;
/// Timer ticks per second, 1 tick = 1 us.
pub const PWM_TICK_RATE_HZ: u32 = 1_000_000;
/// Subtracted from every width to compensate the interrupt edge latency.
pub const PWM_PULSE_TRIM: u16 = 3;

// SERVO MODEL (DS3218MG)
pub const SERVO_MIN_PULSE_US: f32 = 500.0;
pub const SERVO_MAX_PULSE_US: f32 = 2500.0;
pub const SERVO_MAX_PHYSIC_ANGLE: f32 = 270.0;
pub const SERVO_LOGIC_ZERO: f32 = 135.0;

/// Factory servo calibration: `(reversed, zero_trim)` per channel.
pub const SERVO_CALIBRATION: [(bool, i16); SERVO_CHANNELS] = [
    (true, -3),
    (false, 0),
    (false, -2),
    (true, 1),
    (false, 1),
    (false, -2),
    (true, 2),
    (true, -1),
    (true, 0),
    (true, 3),
    (true, 0),
    (true, 2),
    (true, -1),
    (true, 2),
    (true, 0),
    (true, 1),
    (false, 0),
    (false, 10),
];
