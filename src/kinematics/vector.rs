//! 3D vector type and the step-limited "move toward target" primitive.
use core::ops::{Add, Sub};

/// Deltas below this are treated as arrived.
pub const STEP_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct V3d {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl V3d {
    pub const ZERO: V3d = V3d::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Add for V3d {
    type Output = V3d;

    fn add(self, rhs: V3d) -> V3d {
        V3d::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for V3d {
    type Output = V3d;

    fn sub(self, rhs: V3d) -> V3d {
        V3d::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Bounded motion toward a target, one call per control tick.
pub trait StepToward: Sized {
    /// Advances `self` toward `target` by at most `max_step` and returns `true`
    /// while the target is still not reached after this call.
    ///
    /// A remaining distance within `max_step` lands exactly on the target.
    fn step_toward(&mut self, target: Self, max_step: f32) -> bool;
}

impl StepToward for f32 {
    fn step_toward(&mut self, target: f32, max_step: f32) -> bool {
        let delta = target - *self;
        let distance = libm::fabsf(delta);
        if distance < STEP_EPSILON {
            return false;
        }
        if distance <= max_step {
            *self = target;
            return false;
        }
        *self += libm::copysignf(max_step, delta);
        true
    }
}

impl StepToward for V3d {
    fn step_toward(&mut self, target: V3d, max_step: f32) -> bool {
        let delta = target - *self;
        let max_delta = libm::fabsf(delta.x)
            .max(libm::fabsf(delta.y))
            .max(libm::fabsf(delta.z));
        if max_delta < STEP_EPSILON {
            return false;
        }
        if max_delta <= max_step {
            *self = target;
            return false;
        }

        // Scale every axis so all of them arrive on the same call.
        let scale = max_step / max_delta;
        self.x += delta.x * scale;
        self.y += delta.y * scale;
        self.z += delta.z * scale;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls_to_converge<T: StepToward + Copy + PartialEq>(mut value: T, target: T) -> usize {
        let mut calls = 0;
        while value != target {
            value.step_toward(target, 1.5);
            calls += 1;
            assert!(calls < 10_000);
        }
        calls
    }

    #[test]
    fn scalar_converges_in_ceil_calls_without_overshoot() {
        for (start, target) in [(0.0f32, 10.0f32), (-15.0, -100.0), (3.0, 0.0), (0.0, 1.5), (7.0, 7.2)] {
            let expected = libm::ceilf(libm::fabsf(target - start) / 1.5) as usize;
            assert_eq!(calls_to_converge(start, target), expected, "{start} -> {target}");

            let mut value = start;
            let ascending = target > start;
            for _ in 0..expected {
                value.step_toward(target, 1.5);
                if ascending {
                    assert!(value <= target);
                } else {
                    assert!(value >= target);
                }
            }
        }
    }

    #[test]
    fn scalar_reports_moving_until_last_step() {
        let mut value = 0.0f32;
        assert!(value.step_toward(4.0, 1.5));
        assert!(value.step_toward(4.0, 1.5));
        assert!(!value.step_toward(4.0, 1.5));
        assert_eq!(value, 4.0);
    }

    #[test]
    fn vector_axes_arrive_together() {
        let mut value = V3d::new(0.0, 0.0, 0.0);
        let target = V3d::new(6.0, -3.0, 1.5);
        let mut calls = 0;
        while value.step_toward(target, 1.5) {
            calls += 1;
            // Proportional progress on every axis.
            assert!((value.y / value.x - -0.5).abs() < 1e-5);
            assert!((value.z / value.x - 0.25).abs() < 1e-5);
        }
        assert_eq!(calls + 1, 4);
        assert_eq!(value, target);
    }

    #[test]
    fn vector_never_overshoots_dominant_axis() {
        let mut value = V3d::new(10.0, -20.0, 5.0);
        let target = V3d::new(-7.3, 11.1, 0.0);
        let expected = libm::ceilf(31.1 / 1.5) as usize;
        assert_eq!(calls_to_converge(value, target), expected);
        for _ in 0..expected {
            value.step_toward(target, 1.5);
            assert!(value.y <= target.y);
            assert!(value.x >= target.x);
        }
    }

    #[test]
    fn arrived_target_is_left_untouched() {
        let target = V3d::new(1.0, 2.0, 3.0);
        let mut value = target;
        assert!(!value.step_toward(target, 1.5));
        assert_eq!(value, target);

        let mut scalar = -85.0f32;
        assert!(!scalar.step_toward(-85.00001, 1.5));
        assert_eq!(scalar, -85.0);
    }
}
