//! Main-loop side of the software PWM.
//!
//! [`PwmShared`] is the only state crossing the interrupt boundary. Every field
//! is an atomic: the control loop writes shadow widths, the hold flag, the
//! pending frequency and the enable request; the interrupt reads them at the
//! period boundary and bumps the period counter.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use fugit::{HertzU32, MicrosDurationU32};
use log::warn;

use super::Ticks;
use crate::config::{
    PWM_MAX_FREQUENCY_HZ, PWM_MIN_FREQUENCY_HZ, PWM_PULSE_TRIM, PWM_START_FREQUENCY_HZ, PWM_TICK_RATE_HZ,
    SERVO_CHANNELS,
};

/// Atomic encoding of a disabled channel. Never leaves this module.
const NO_PULSE: u32 = u32::MAX;

pub struct PwmShared {
    widths: [AtomicU32; SERVO_CHANNELS],
    hold: AtomicBool,
    frequency_hz: AtomicU32,
    enabled: AtomicBool,
    period_counter: AtomicU32,
    min_hz: u32,
    max_hz: u32,
}

impl PwmShared {
    pub const fn new() -> Self {
        Self::with_limits(PWM_MIN_FREQUENCY_HZ, PWM_MAX_FREQUENCY_HZ, PWM_START_FREQUENCY_HZ)
    }

    pub const fn with_limits(min_hz: u32, max_hz: u32, start_hz: u32) -> Self {
        Self {
            widths: [const { AtomicU32::new(NO_PULSE) }; SERVO_CHANNELS],
            hold: AtomicBool::new(false),
            frequency_hz: AtomicU32::new(start_hz),
            enabled: AtomicBool::new(false),
            period_counter: AtomicU32::new(0),
            min_hz,
            max_hz,
        }
    }

    /// Requests a pulse width for `channel`, `None` holds the output low.
    ///
    /// Only the shadow buffer changes; the interrupt picks it up at the next
    /// period boundary unless the shadow is held.
    pub fn set_width(&self, channel: usize, width: Option<Ticks>) {
        let Some(cell) = self.widths.get(channel) else {
            warn!("[PWM] channel {channel} does not exist");
            return;
        };
        let raw = match width {
            Some(ticks) => ticks.saturating_sub(PWM_PULSE_TRIM) as u32,
            None => NO_PULSE,
        };
        cell.store(raw, Ordering::Relaxed);
    }

    /// Shadow width of `channel`, trim already applied.
    pub fn width(&self, channel: usize) -> Option<Ticks> {
        let raw = self.widths.get(channel)?.load(Ordering::Relaxed);
        if raw == NO_PULSE {
            None
        } else {
            Some(raw as Ticks)
        }
    }

    pub fn lock_shadow(&self, hold: bool) {
        self.hold.store(hold, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.hold.load(Ordering::Acquire)
    }

    /// Holds the shadow until the returned guard is dropped.
    pub fn hold(&self) -> ShadowLock<'_> {
        self.lock_shadow(true);
        ShadowLock { shared: self }
    }

    /// Applied at the next period boundary, clamped to the configured range.
    pub fn set_frequency(&self, frequency: HertzU32) {
        let hz = frequency.raw().clamp(self.min_hz, self.max_hz);
        self.frequency_hz.store(hz, Ordering::Relaxed);
    }

    pub fn frequency(&self) -> HertzU32 {
        HertzU32::from_raw(self.frequency_hz.load(Ordering::Relaxed))
    }

    pub fn frequency_limits(&self) -> (HertzU32, HertzU32) {
        (HertzU32::from_raw(self.min_hz), HertzU32::from_raw(self.max_hz))
    }

    /// Length of one period at the pending frequency.
    pub fn period(&self) -> MicrosDurationU32 {
        MicrosDurationU32::from_ticks(PWM_TICK_RATE_HZ / self.frequency().raw().max(1))
    }

    pub fn period_ticks(&self) -> Ticks {
        self.period().ticks().min(Ticks::MAX as u32) as Ticks
    }

    /// Outputs start pulsing at the next period boundary.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Outputs go low at the next period boundary, never mid-pulse.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Wrapping count of completed periods.
    pub fn period_counter(&self) -> u32 {
        self.period_counter.load(Ordering::Acquire)
    }

    pub(crate) fn advance_period(&self) -> u32 {
        self.period_counter.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

impl Default for PwmShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the shadow buffer held; released on drop.
pub struct ShadowLock<'a> {
    shared: &'a PwmShared,
}

impl ShadowLock<'_> {
    pub fn set_width(&self, channel: usize, width: Option<Ticks>) {
        self.shared.set_width(channel, width);
    }
}

impl Drop for ShadowLock<'_> {
    fn drop(&mut self) {
        self.shared.lock_shadow(false);
    }
}
