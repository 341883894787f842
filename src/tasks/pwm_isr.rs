//! ESP32 timer interrupt driving the software PWM.
//!
//! Two TIMG timers back one [`CompareTimer`]: timer 0 auto-reloads every
//! period, timer 1 is re-armed as a one-shot for each compare match. Both
//! share the same interrupt handler.
use core::cell::RefCell;

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use esp_hal::gpio::Output;
use esp_hal::handler;
use esp_hal::time::{Duration, Instant};
use esp_hal::timer::timg::Timer as TimgTimer;
use esp_hal::timer::Timer;
use log::{info, warn};

use crate::config::SERVO_CHANNELS;
use crate::pwm::{CompareTimer, PwmScheduler, PwmShared, Ticks, TimerEvents};

/// Shadow buffer shared with the control loop.
pub static PWM: PwmShared = PwmShared::new();

/// Raised once per completed PWM period.
pub static PERIOD_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

type EspScheduler = PwmScheduler<'static, Output<'static>, EspCompareTimer>;

static SCHEDULER: Mutex<RefCell<Option<EspScheduler>>> = Mutex::new(RefCell::new(None));

pub struct EspCompareTimer {
    period: TimgTimer<'static>,
    compare: TimgTimer<'static>,
    period_start: Instant,
}

impl EspCompareTimer {
    pub fn new(period: TimgTimer<'static>, compare: TimgTimer<'static>) -> Self {
        period.set_interrupt_handler(pwm_timer_isr);
        compare.set_interrupt_handler(pwm_timer_isr);
        Self {
            period,
            compare,
            period_start: Instant::now(),
        }
    }
}

impl CompareTimer for EspCompareTimer {
    fn take_events(&mut self) -> TimerEvents {
        let mut events = TimerEvents::empty();
        if self.compare.is_interrupt_set() {
            self.compare.clear_interrupt();
            events |= TimerEvents::COMPARE;
        }
        if self.period.is_interrupt_set() {
            self.period.clear_interrupt();
            self.period_start = Instant::now();
            events |= TimerEvents::ROLLOVER;
        }
        events
    }

    fn set_compare(&mut self, ticks: Ticks) {
        // One-shot delay relative to now, at least one tick.
        let elapsed = self.period_start.elapsed().as_micros();
        let delay = u64::from(ticks).saturating_sub(elapsed).max(1);
        self.compare.stop();
        if self.compare.load_value(Duration::from_micros(delay)).is_err() {
            warn!("[PWM] compare {ticks} out of timer range");
            return;
        }
        self.compare.start();
    }

    fn clear_compare(&mut self) {
        self.compare.stop();
    }

    fn set_period(&mut self, ticks: Ticks) {
        if self.period.load_value(Duration::from_micros(u64::from(ticks))).is_err() {
            warn!("[PWM] period {ticks} out of timer range");
        }
    }

    fn start(&mut self) {
        self.compare.enable_auto_reload(false);
        self.compare.enable_interrupt(true);
        self.period.enable_auto_reload(true);
        self.period.enable_interrupt(true);
        self.period_start = Instant::now();
        self.period.start();
    }
}

#[handler]
fn pwm_timer_isr() {
    let before = PWM.period_counter();
    critical_section::with(|cs| {
        if let Some(scheduler) = SCHEDULER.borrow_ref_mut(cs).as_mut() {
            scheduler.on_interrupt();
        }
    });
    if PWM.period_counter() != before {
        PERIOD_SIGNAL.signal(());
    }
}

/// Hands the pins and timer to the interrupt and starts the first period.
pub fn start_pwm(pins: [Output<'static>; SERVO_CHANNELS], timer: EspCompareTimer) {
    let mut scheduler = PwmScheduler::new(&PWM, pins, timer);
    critical_section::with(|cs| {
        scheduler.start();
        SCHEDULER.borrow_ref_mut(cs).replace(scheduler);
    });
    info!("[PWM] started at {}", PWM.frequency());
}
