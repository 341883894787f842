//! Control task for the hexapod.
//!
//! Wakes on every PWM period signalled by the timer interrupt and runs one
//! control loop tick. A fatal status ends the loop: servo power is cut and the
//! task parks in the emergency loop.
use embassy_time::{Duration, Timer};
use esp_hal::gpio::Output;
use log::{error, info};

use super::control_loop::ControlLoop;
use super::pwm_isr::{PERIOD_SIGNAL, PWM};
use crate::robot::commands::CommandReceiver;
use crate::robot::sensor::{Level, LogTelemetry};

pub type EspControlLoop = ControlLoop<Output<'static>, Level, LogTelemetry>;

#[embassy_executor::task]
pub async fn motion_task(mut control: EspControlLoop, commands: CommandReceiver<'static>) {
    control.start(&PWM);
    info!("[MOTION_TASK] running at {}", PWM.frequency());

    loop {
        PERIOD_SIGNAL.wait().await;
        if let Err(e) = control.run_once(&PWM, &commands) {
            error!("[MOTION_TASK] {e}");
            break;
        }
    }

    control.emergency_stop(&PWM);
    emergency_loop(control.health().status_word()).await
}

/// Never returns. Keeps reporting the status word that stopped the robot.
pub async fn emergency_loop(status: u16) -> ! {
    loop {
        error!("[EMERGENCY] motion halted, status {status:#06x}");
        Timer::after(Duration::from_secs(5)).await;
    }
}
