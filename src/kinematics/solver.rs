//! Closed-form leg inverse kinematics and the surface leveling model.
//!
//! The body is leveled against a virtual ground plane given by an anchor
//! point and a rotation. Tilting or raising that plane becomes a per-leg
//! height offset, and the offset target of every leg is solved into
//! coxa/femur/tibia angles.
use core::f32::consts::PI;

use crate::config::LEGS_COUNT;
use crate::error::MathError;
use crate::kinematics::vector::V3d;
use crate::robot::leg::Leg;

/// Smallest usable `|normal.y|` of the surface plane.
const NORMAL_EPSILON: f32 = 1e-6;
/// Minimum femur-to-target distance before the triangle degenerates.
const DISTANCE_EPSILON: f32 = 1e-3;

pub fn deg_to_rad(deg: f32) -> f32 {
    deg * PI / 180.0
}

pub fn rad_to_deg(rad: f32) -> f32 {
    rad * 180.0 / PI
}

/// Unclamped joint solution for one leg, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles {
    pub coxa: f32,
    pub femur: f32,
    pub tibia: f32,
}

/// Unit normal of the surface plane: `(0, 1, 0)` rotated about X, then Z, then Y.
pub fn surface_normal(rotation: V3d) -> V3d {
    let (sx, cx) = libm::sincosf(deg_to_rad(rotation.x));
    let (sz, cz) = libm::sincosf(deg_to_rad(rotation.z));
    let (sy, cy) = libm::sincosf(deg_to_rad(rotation.y));

    // About X
    let n = V3d::new(0.0, cx, sx);
    // About Z
    let n = V3d::new(-n.y * sz, n.y * cz, n.z);
    // About Y
    V3d::new(n.x * cy + n.z * sy, n.y, -n.x * sy + n.z * cy)
}

/// Fills `surface_offset` of every leg from the plane through `point` with
/// orientation `rotation`.
pub fn compute_surface_offsets(legs: &mut [Leg], point: V3d, rotation: V3d) -> Result<(), MathError> {
    let n = surface_normal(rotation);
    if libm::fabsf(n.y) < NORMAL_EPSILON {
        return Err(MathError::DegenerateSurface);
    }

    for leg in legs.iter_mut() {
        let x = leg.position.x;
        let z = leg.position.z;
        let y = point.y - (n.x * (x - point.x) + n.z * (z - point.z)) / n.y;
        leg.surface_offset = V3d::new(0.0, y, 0.0);
    }
    Ok(())
}

/// Solves one leg for `target` without applying the travel protection.
pub fn solve_leg(leg: &Leg, target: V3d) -> Result<JointAngles, MathError> {
    // Into the leg azimuth frame
    let (s, c) = libm::sincosf(deg_to_rad(leg.coxa.zero_rotate));
    let x1 = target.x * c + target.z * s;
    let z1 = -target.x * s + target.z * c;
    let y = target.y;

    let coxa = libm::atan2f(z1, x1);

    // Into the femur plane, relative to the femur pivot
    let x2 = x1 * libm::cosf(coxa) + z1 * libm::sinf(coxa) - leg.coxa.length;
    let fi = libm::atan2f(y, x2);
    let d = libm::sqrtf(x2 * x2 + y * y);

    let a = leg.tibia.length;
    let b = leg.femur.length;
    let reach = a + b;
    if d > reach {
        return Err(MathError::Unreachable {
            leg: leg.id,
            distance: d,
            reach,
        });
    }
    let minimum = libm::fabsf(a - b).max(DISTANCE_EPSILON);
    if d < minimum {
        return Err(MathError::TooClose {
            leg: leg.id,
            distance: d,
            minimum,
        });
    }

    let alpha = libm::acosf(((b * b + d * d - a * a) / (2.0 * b * d)).clamp(-1.0, 1.0));
    let gamma = libm::acosf(((a * a + b * b - d * d) / (2.0 * a * b)).clamp(-1.0, 1.0));

    Ok(JointAngles {
        coxa: rad_to_deg(coxa),
        femur: leg.femur.zero_rotate - rad_to_deg(alpha) - rad_to_deg(fi),
        tibia: rad_to_deg(gamma) - leg.tibia.zero_rotate,
    })
}

/// Foot position reached by `angles`, inverse of [`solve_leg`].
pub fn foot_position(leg: &Leg, angles: JointAngles) -> V3d {
    let femur_dir = deg_to_rad(leg.femur.zero_rotate - angles.femur);
    let tibia_dir = femur_dir + PI + deg_to_rad(angles.tibia + leg.tibia.zero_rotate);

    let x2 = leg.femur.length * libm::cosf(femur_dir) + leg.tibia.length * libm::cosf(tibia_dir);
    let y = leg.femur.length * libm::sinf(femur_dir) + leg.tibia.length * libm::sinf(tibia_dir);

    let radial = x2 + leg.coxa.length;
    let (sc, cc) = libm::sincosf(deg_to_rad(angles.coxa));
    let x1 = radial * cc;
    let z1 = radial * sc;

    let (s, c) = libm::sincosf(deg_to_rad(leg.coxa.zero_rotate));
    V3d::new(x1 * c - z1 * s, y, x1 * s + z1 * c)
}

/// Solves every leg and stores the clamped angles.
///
/// All legs are solved before any angle is written, so a failure leaves the
/// previous angles in place. More than [`LEGS_COUNT`] legs is an error.
pub fn compute_joint_angles(legs: &mut [Leg]) -> Result<(), MathError> {
    if legs.len() > LEGS_COUNT {
        return Err(MathError::TooManyLegs {
            count: legs.len(),
            max: LEGS_COUNT,
        });
    }
    let mut solved = [JointAngles { coxa: 0.0, femur: 0.0, tibia: 0.0 }; LEGS_COUNT];
    for (slot, leg) in solved.iter_mut().zip(legs.iter()) {
        *slot = solve_leg(leg, leg.target())?;
    }

    for (leg, angles) in legs.iter_mut().zip(solved.iter()) {
        leg.coxa.angle = leg.coxa.clamp(angles.coxa);
        leg.femur.angle = leg.femur.clamp(angles.femur);
        leg.tibia.angle = leg.tibia.clamp(angles.tibia);
    }
    Ok(())
}
