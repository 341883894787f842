#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level as PinLevel, Output, OutputConfig};
use esp_hal::timer::timg::TimerGroup;
use hexapod_robot::config::SERVO_CHANNELS;
use hexapod_robot::kinematics::scripts::ScriptId;
use hexapod_robot::robot::commands::{Command, CommandChannel};
use hexapod_robot::robot::health::SystemMonitor;
use hexapod_robot::robot::sensor::{Level, LogTelemetry};
use hexapod_robot::storage::{HexapodConfig, RamConfigStore};
use hexapod_robot::tasks::control_loop::ControlLoop;
use hexapod_robot::tasks::motion_task::{emergency_loop, motion_task};
use hexapod_robot::tasks::pwm_isr::{start_pwm, EspCompareTimer};
use log::{error, info};

esp_bootloader_esp_idf::esp_app_desc!();

//LEGS: [coxa, femur, tibia]
//LEFT_FRONT:   [32, 33, 25]
//LEFT_MIDDLE:  [26, 27, 14]
//LEFT_REAR:    [12, 13, 15]
//RIGHT_FRONT:  [2, 4, 16]
//RIGHT_MIDDLE: [17, 5, 18]
//RIGHT_REAR:   [19, 21, 22]
//SERVO POWER:  23

macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.init_with(|| $val)
    }};
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);

    let low = OutputConfig::default();
    let servo_pins: [Output<'static>; SERVO_CHANNELS] = [
        Output::new(p.GPIO32, PinLevel::Low, low),
        Output::new(p.GPIO33, PinLevel::Low, low),
        Output::new(p.GPIO25, PinLevel::Low, low),
        Output::new(p.GPIO26, PinLevel::Low, low),
        Output::new(p.GPIO27, PinLevel::Low, low),
        Output::new(p.GPIO14, PinLevel::Low, low),
        Output::new(p.GPIO12, PinLevel::Low, low),
        Output::new(p.GPIO13, PinLevel::Low, low),
        Output::new(p.GPIO15, PinLevel::Low, low),
        Output::new(p.GPIO2, PinLevel::Low, low),
        Output::new(p.GPIO4, PinLevel::Low, low),
        Output::new(p.GPIO16, PinLevel::Low, low),
        Output::new(p.GPIO17, PinLevel::Low, low),
        Output::new(p.GPIO5, PinLevel::Low, low),
        Output::new(p.GPIO18, PinLevel::Low, low),
        Output::new(p.GPIO19, PinLevel::Low, low),
        Output::new(p.GPIO21, PinLevel::Low, low),
        Output::new(p.GPIO22, PinLevel::Low, low),
    ];
    let mut servo_power = Output::new(p.GPIO23, PinLevel::Low, low);

    // Calibration comes from the factory image until an external store is fitted.
    let mut boot_health = SystemMonitor::new();
    let hexapod_config = RamConfigStore::with_config(&HexapodConfig::default())
        .and_then(|mut store| HexapodConfig::load_monitored(&mut store, &mut boot_health));
    let hexapod_config = match hexapod_config {
        Ok(config) => config,
        Err(e) => {
            error!("[CONFIG] {e}");
            servo_power.set_low();
            emergency_loop(boot_health.status_word()).await
        }
    };

    let pwm_timers = TimerGroup::new(p.TIMG0);
    start_pwm(servo_pins, EspCompareTimer::new(pwm_timers.timer0, pwm_timers.timer1));

    let commands = mk_static!(CommandChannel, CommandChannel::new());
    let control = ControlLoop::new(&hexapod_config, servo_power, Level, LogTelemetry);

    info!("Starting hexapod robot...");
    spawner
        .spawn(motion_task(control, commands.receiver()))
        .expect("Fail spawning motion task");

    // Stand up once the control loop is running.
    commands.send(Command::SelectScript(Some(ScriptId::Up))).await;

    loop {
        core::future::pending::<()>().await;
    }
}
