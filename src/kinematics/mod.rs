//! Kinematics and motion planning for the hexapod.
//!
//! - [`vector`]: 3D vector type and bounded stepping toward a target.
//! - [`solver`]: surface plane offsets and per-leg inverse kinematics.
//! - [`trajectory`]: curved tripod gait arcs.
//! - [`scripts`]: preset body gestures.
//! - [`motion_core`]: the state machine tying them together every PWM period.
pub mod motion_core;
pub mod scripts;
pub mod solver;
pub mod trajectory;
pub mod vector;
