//! Runtime of the hexapod firmware.
//!
//! - [`control_loop`]: one control tick per PWM period, hardware independent.
//! - [`pwm_isr`]: ESP32 timer interrupt driving the PWM scheduler.
//! - [`motion_task`]: Embassy task running the control loop on the ESP32.
//!
//! `main.rs` starts the interrupt and spawns the task; the two share only
//! the [`pwm_isr::PWM`] buffer and the period signal.
pub mod control_loop;
#[cfg(feature = "esp32")]
pub mod motion_task;
#[cfg(feature = "esp32")]
pub mod pwm_isr;
