//! Library root for the hexapod firmware.
//!
//! Re-exports all main modules: [`kinematics`], [`pwm`], [`robot`], [`storage`]
//! and [`tasks`]. Everything outside the `esp32` feature is hardware
//! independent and runs in host tests.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod kinematics;
pub mod pwm;
pub mod robot;
pub mod storage;
pub mod tasks;

pub const COMMAND_CHANNEL_SIZE: usize = 8;
pub const TELEMETRY_LINE_SIZE: usize = 256;
