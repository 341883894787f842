//! Software PWM for the 18 servo outputs.
//!
//! - [`shared`]: lock-free shadow buffer written by the control loop.
//! - [`scheduler`]: sorted-edge renderer run from the timer interrupt.
pub mod scheduler;
pub mod shared;

pub use scheduler::{CompareTimer, PwmScheduler, TimerEvents};
pub use shared::{PwmShared, ShadowLock};

/// Timer ticks, 1 tick = 1 us.
pub type Ticks = u16;
