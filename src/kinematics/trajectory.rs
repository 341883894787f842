//! Curved tripod gait trajectory.
//!
//! Every leg sweeps an arc around a common turn center. The curvature input
//! picks the center: near zero the center is far away and the robot walks
//! straight, at the extremes it sits under the body and the robot turns in
//! place.
use core::f32::consts::PI;

use crate::config::{LEGS_COUNT, MOTION_TIME_MAX};
use crate::error::MathError;
use crate::kinematics::vector::V3d;
use crate::robot::leg::Leg;

/// Curvature input limits, in thousandths.
pub const CURVATURE_MAX: i16 = 1999;
pub const CURVATURE_MIN: i16 = -1999;

/// Gait step parameters latched by the motion core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCfg {
    /// 0..=100, mapped onto the PWM frequency range.
    pub speed: u8,
    /// Signed turn sharpness, 0 walks straight.
    pub curvature: i16,
    /// Stride length in mm per half cycle, signed for direction.
    pub distance: i16,
    pub step_height: f32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            speed: 0,
            curvature: 0,
            distance: 0,
            step_height: crate::config::STEP_HEIGHT_DEFAULT,
        }
    }
}

/// Signed turn radius for `curvature` and `distance`.
///
/// A negative distance puts the center on the other side, so walking
/// backward keeps the turn direction.
pub fn turn_radius(curvature: i16, distance: i16) -> f32 {
    let k = if curvature == 0 {
        0.001
    } else {
        (curvature.clamp(CURVATURE_MIN, CURVATURE_MAX) as f32) / 1000.0
    };
    libm::tanf((2.0 - k) * PI / 4.0) * distance as f32
}

/// Legs lifted during the current half cycle.
pub fn is_airborne(leg_index: usize, loop_parity: u32) -> bool {
    (leg_index & 1) == (loop_parity & 1) as usize
}

/// Places every leg on its gait arc for `phase_time` (0..=1000).
pub fn advanced_trajectory(
    legs: &mut [Leg],
    base_positions: &[V3d; LEGS_COUNT],
    phase_time: u32,
    loop_parity: u32,
    cfg: &MotionCfg,
) -> Result<(), MathError> {
    let radius = turn_radius(cfg.curvature, cfg.distance);

    let mut arc_radius = [0.0f32; LEGS_COUNT];
    let mut start_angle = [0.0f32; LEGS_COUNT];
    let mut max_arc_radius = 0.0f32;
    for (i, base) in base_positions.iter().enumerate() {
        let dx = radius - base.x;
        arc_radius[i] = libm::sqrtf(dx * dx + base.z * base.z);
        start_angle[i] = libm::atan2f(base.z, -dx);
        max_arc_radius = max_arc_radius.max(arc_radius[i]);
    }
    if max_arc_radius == 0.0 {
        return Err(MathError::DegenerateTrajectory);
    }

    // The outermost leg covers exactly `distance` along its arc.
    let max_arc = libm::copysignf(1.0, radius) * cfg.distance as f32 / max_arc_radius;
    let phase = phase_time.min(MOTION_TIME_MAX) as f32 / MOTION_TIME_MAX as f32;

    for (i, leg) in legs.iter_mut().enumerate().take(LEGS_COUNT) {
        let base = base_positions[i];
        let airborne = is_airborne(i, loop_parity);
        let t = if airborne { phase } else { 1.0 - phase };

        let arc = (t - 0.5) * max_arc + start_angle[i];
        leg.position.x = radius + arc_radius[i] * libm::cosf(arc);
        leg.position.z = arc_radius[i] * libm::sinf(arc);
        leg.position.y = if airborne {
            base.y + cfg.step_height * libm::sinf(t * PI)
        } else {
            base.y
        };
    }
    Ok(())
}
