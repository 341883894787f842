//! Interrupt side of the software PWM.
//!
//! All channels rise together at the period boundary. The working copy is
//! sorted by width and a single compare register walks that order, dropping
//! every channel whose width has elapsed and re-arming at the next distinct
//! width.
use bitflags::bitflags;
use embedded_hal::digital::OutputPin;

use super::shared::PwmShared;
use super::Ticks;
use crate::config::SERVO_CHANNELS;

bitflags! {
    /// Pending timer interrupt sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerEvents: u8 {
        /// Compare register matched.
        const COMPARE  = 0x01;
        /// Period elapsed, counter restarted from zero.
        const ROLLOVER = 0x02;
    }
}

/// One hardware timer counting ticks from the start of each period.
pub trait CompareTimer {
    /// Returns and clears the pending events.
    fn take_events(&mut self) -> TimerEvents;
    /// Arms the compare match `ticks` after the period start.
    fn set_compare(&mut self, ticks: Ticks);
    fn clear_compare(&mut self);
    /// Period length used from the next rollover on.
    fn set_period(&mut self, ticks: Ticks);
    fn start(&mut self);
}

pub struct PwmScheduler<'a, P, T> {
    shared: &'a PwmShared,
    pins: [P; SERVO_CHANNELS],
    timer: T,
    active: [Option<Ticks>; SERVO_CHANNELS],
    /// Channel indices ordered by ascending width, disabled channels last.
    order: [u8; SERVO_CHANNELS],
    cursor: usize,
    armed: Option<Ticks>,
    period: Ticks,
}

impl<'a, P, T> PwmScheduler<'a, P, T>
where
    P: OutputPin,
    T: CompareTimer,
{
    pub fn new(shared: &'a PwmShared, pins: [P; SERVO_CHANNELS], timer: T) -> Self {
        Self {
            shared,
            pins,
            timer,
            active: [None; SERVO_CHANNELS],
            order: core::array::from_fn(|i| i as u8),
            cursor: 0,
            armed: None,
            period: 0,
        }
    }

    /// Drives every output low and starts the period timer.
    pub fn start(&mut self) {
        for pin in self.pins.iter_mut() {
            let _ = pin.set_low();
        }
        self.period = self.shared.period_ticks();
        self.timer.set_period(self.period);
        self.timer.start();
    }

    /// Timer interrupt entry point.
    pub fn on_interrupt(&mut self) {
        let events = self.timer.take_events();
        if events.contains(TimerEvents::COMPARE) {
            self.on_compare();
        }
        if events.contains(TimerEvents::ROLLOVER) {
            self.on_rollover();
        }
    }

    /// Drops every channel whose width is at or before the armed compare value.
    pub fn on_compare(&mut self) {
        let Some(now) = self.armed else {
            return;
        };
        while let Some(&channel) = self.order.get(self.cursor) {
            match self.active[channel as usize] {
                Some(width) if width <= now => {
                    let _ = self.pins[channel as usize].set_low();
                    self.cursor += 1;
                }
                _ => break,
            }
        }
        self.arm_next();
    }

    pub fn on_rollover(&mut self) {
        if !self.shared.is_held() {
            for (channel, slot) in self.active.iter_mut().enumerate() {
                *slot = self.shared.width(channel);
            }
        }
        self.sort();

        let period = self.shared.period_ticks();
        if period != self.period {
            self.period = period;
            self.timer.set_period(period);
        }
        self.shared.advance_period();
        self.cursor = 0;

        if !self.shared.is_enabled() {
            for pin in self.pins.iter_mut() {
                let _ = pin.set_low();
            }
            self.armed = None;
            self.timer.clear_compare();
            return;
        }

        for (pin, width) in self.pins.iter_mut().zip(self.active.iter()) {
            let _ = match width {
                Some(ticks) if *ticks > 0 => pin.set_high(),
                _ => pin.set_low(),
            };
        }
        self.arm_next();
    }

    /// Widths in render order.
    pub fn sorted_widths(&self) -> impl Iterator<Item = Option<Ticks>> + '_ {
        self.order.iter().map(|&channel| self.active[channel as usize])
    }

    fn arm_next(&mut self) {
        // Zero widths never rise, nothing to drop.
        while let Some(&channel) = self.order.get(self.cursor) {
            if self.active[channel as usize] == Some(0) {
                self.cursor += 1;
            } else {
                break;
            }
        }

        let next = self
            .order
            .get(self.cursor)
            .and_then(|&channel| self.active[channel as usize]);
        self.armed = next;
        match next {
            Some(ticks) => self.timer.set_compare(ticks),
            None => self.timer.clear_compare(),
        }
    }

    fn sort(&mut self) {
        let key = |active: &[Option<Ticks>; SERVO_CHANNELS], channel: u8| {
            active[channel as usize].map_or(u32::MAX, u32::from)
        };
        for i in 1..self.order.len() {
            let current = self.order[i];
            let mut j = i;
            while j > 0 && key(&self.active, self.order[j - 1]) > key(&self.active, current) {
                self.order[j] = self.order[j - 1];
                j -= 1;
            }
            self.order[j] = current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Levels = Rc<RefCell<[bool; SERVO_CHANNELS]>>;

    struct MockPin {
        index: usize,
        levels: Levels,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.borrow_mut()[self.index] = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.borrow_mut()[self.index] = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockTimer {
        compare: Option<Ticks>,
        period: Ticks,
        pending: Option<TimerEvents>,
        running: bool,
    }

    impl CompareTimer for MockTimer {
        fn take_events(&mut self) -> TimerEvents {
            self.pending.take().unwrap_or(TimerEvents::empty())
        }

        fn set_compare(&mut self, ticks: Ticks) {
            self.compare = Some(ticks);
        }

        fn clear_compare(&mut self) {
            self.compare = None;
        }

        fn set_period(&mut self, ticks: Ticks) {
            self.period = ticks;
        }

        fn start(&mut self) {
            self.running = true;
        }
    }

    fn scheduler(shared: &PwmShared) -> (PwmScheduler<'_, MockPin, MockTimer>, Levels) {
        let levels: Levels = Rc::new(RefCell::new([false; SERVO_CHANNELS]));
        let pins = core::array::from_fn(|index| MockPin {
            index,
            levels: levels.clone(),
        });
        let mut scheduler = PwmScheduler::new(shared, pins, MockTimer::default());
        scheduler.start();
        (scheduler, levels)
    }

    fn high_channels(levels: &Levels) -> Vec<usize> {
        levels
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(i, high)| high.then_some(i))
            .collect()
    }

    #[test]
    fn edges_follow_sorted_widths() {
        let shared = PwmShared::new();
        shared.enable();
        for channel in 0..SERVO_CHANNELS {
            shared.set_width(channel, Some(2000));
        }
        shared.set_width(0, Some(1000));
        shared.set_width(1, Some(500));
        shared.set_width(2, None);
        shared.set_width(3, Some(500));

        let (mut scheduler, levels) = scheduler(&shared);
        scheduler.on_rollover();
        assert_eq!(high_channels(&levels).len(), SERVO_CHANNELS - 1);
        assert!(!levels.borrow()[2]);
        assert_eq!(scheduler.timer.compare, Some(497));

        scheduler.on_compare();
        assert!(!levels.borrow()[1] && !levels.borrow()[3]);
        assert!(levels.borrow()[0]);
        assert_eq!(scheduler.timer.compare, Some(997));

        scheduler.on_compare();
        assert!(!levels.borrow()[0]);
        assert_eq!(scheduler.timer.compare, Some(1997));

        scheduler.on_compare();
        assert!(high_channels(&levels).is_empty());
        assert_eq!(scheduler.timer.compare, None);
        assert_eq!(shared.period_counter(), 1);
    }

    #[test]
    fn interrupt_dispatches_compare_before_rollover() {
        let shared = PwmShared::new();
        shared.enable();
        shared.set_width(5, Some(1500));
        let (mut scheduler, levels) = scheduler(&shared);
        scheduler.on_rollover();
        assert!(levels.borrow()[5]);

        scheduler.timer.pending = Some(TimerEvents::COMPARE | TimerEvents::ROLLOVER);
        scheduler.on_interrupt();
        // Dropped by the compare, raised again by the new period.
        assert!(levels.borrow()[5]);
        assert_eq!(shared.period_counter(), 2);
    }

    #[test]
    fn held_shadow_keeps_previous_frame() {
        let shared = PwmShared::new();
        shared.enable();
        shared.set_width(0, Some(1200));
        let (mut scheduler, _levels) = scheduler(&shared);
        scheduler.on_rollover();

        shared.lock_shadow(true);
        shared.set_width(0, Some(1800));
        scheduler.on_rollover();
        assert_eq!(scheduler.active[0], Some(1197));

        shared.lock_shadow(false);
        scheduler.on_rollover();
        assert_eq!(scheduler.active[0], Some(1797));
    }

    #[test]
    fn disable_takes_effect_at_period_boundary() {
        let shared = PwmShared::new();
        shared.enable();
        shared.set_width(4, Some(1500));
        let (mut scheduler, levels) = scheduler(&shared);
        scheduler.on_rollover();

        shared.disable();
        // Mid-period: the running pulse is not cut.
        assert!(levels.borrow()[4]);
        scheduler.on_compare();
        scheduler.on_rollover();
        assert!(high_channels(&levels).is_empty());
        assert_eq!(scheduler.timer.compare, None);
        // The counter keeps pacing the control loop.
        assert_eq!(shared.period_counter(), 2);
    }

    #[test]
    fn disabled_outputs_stay_low_across_rollovers() {
        let shared = PwmShared::new();
        shared.set_width(0, Some(1500));
        let (mut scheduler, levels) = scheduler(&shared);

        for width in [800, 1200, 2000] {
            shared.set_width(0, Some(width));
            scheduler.on_rollover();
            assert!(high_channels(&levels).is_empty());
            assert_eq!(scheduler.timer.compare, None);
        }
        assert!(scheduler.timer.running);
        assert_eq!(shared.period_counter(), 3);

        shared.enable();
        scheduler.on_rollover();
        assert_eq!(high_channels(&levels), vec![0]);
        assert_eq!(scheduler.timer.compare, Some(1997));
    }

    #[test]
    fn frequency_change_reloads_period_at_boundary() {
        let shared = PwmShared::new();
        let (mut scheduler, _levels) = scheduler(&shared);
        assert!(scheduler.timer.running);
        assert_eq!(scheduler.timer.period, 5000);

        shared.set_frequency(fugit::HertzU32::from_raw(100));
        assert_eq!(scheduler.timer.period, 5000);
        scheduler.on_rollover();
        assert_eq!(scheduler.timer.period, 10_000);
    }

    #[test]
    fn active_order_stays_sorted() {
        let shared = PwmShared::new();
        shared.enable();
        let (mut scheduler, _levels) = scheduler(&shared);

        let mut seed = 0x2545_f491u32;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };

        for _ in 0..500 {
            let r = next();
            match r % 8 {
                0 => shared.lock_shadow(!shared.is_held()),
                1 => shared.set_width((r >> 8) as usize % SERVO_CHANNELS, None),
                2 | 3 => scheduler.on_rollover(),
                4 => scheduler.on_compare(),
                _ => {
                    let width = 500 + ((r >> 12) % 2000) as Ticks;
                    shared.set_width((r >> 8) as usize % SERVO_CHANNELS, Some(width));
                }
            }

            let widths: Vec<_> = scheduler.sorted_widths().collect();
            for pair in widths.windows(2) {
                match (pair[0], pair[1]) {
                    (Some(a), Some(b)) => assert!(a <= b, "{widths:?}"),
                    (None, Some(_)) => panic!("disabled before enabled: {widths:?}"),
                    _ => {}
                }
            }
        }
    }
}
