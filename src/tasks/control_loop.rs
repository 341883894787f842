//! Run-to-completion control loop.
//!
//! One [`ControlLoop::run_once`] call per PWM period: check the period
//! counter, drain pending commands, run the motion core, render the servo
//! frame, emit telemetry and publish the status snapshot.
use core::fmt::Write;

use embedded_hal::digital::OutputPin;
use fugit::MicrosDurationU32;
use heapless::String;
use log::{error, info, warn};

use crate::error::{FatalError, SyncError};
use crate::kinematics::motion_core::MotionCore;
use crate::pwm::PwmShared;
use crate::robot::commands::{Command, CommandReceiver};
use crate::robot::health::{ErrorFlags, HealthMonitor, SystemMonitor};
use crate::robot::sensor::{OrientationSensor, TelemetrySink};
use crate::robot::servo::ServoDriver;
use crate::robot::state::{MotionStatus, MOTION_STATUS};
use crate::storage::HexapodConfig;
use crate::TELEMETRY_LINE_SIZE;

pub struct ControlLoop<P, S, T> {
    motion: MotionCore,
    servos: ServoDriver<P>,
    health: SystemMonitor,
    sensor: S,
    telemetry: T,
    last_period: u32,
    status: MotionStatus,
}

impl<P, S, T> ControlLoop<P, S, T>
where
    P: OutputPin,
    S: OrientationSensor,
    T: TelemetrySink,
{
    pub fn new(config: &HexapodConfig, power: P, sensor: S, telemetry: T) -> Self {
        Self {
            motion: MotionCore::new(config),
            servos: ServoDriver::new(config.servos, power),
            health: SystemMonitor::new(),
            sensor,
            telemetry,
            last_period: 0,
            status: MotionStatus::initial(),
        }
    }

    /// Powers the servos and syncs with the current period count.
    pub fn start(&mut self, pwm: &PwmShared) {
        self.last_period = pwm.period_counter();
        self.servos.power_on(pwm);
        info!("[CONTROL] started at period {}", self.last_period);
    }

    /// Runs one tick if at least one PWM period ended since the last call.
    ///
    /// Returns `Ok(false)` when there was nothing to do.
    pub fn run_once(&mut self, pwm: &PwmShared, commands: &CommandReceiver<'_>) -> Result<bool, FatalError> {
        let now = pwm.period_counter();
        let advanced = now.wrapping_sub(self.last_period);
        if advanced == 0 {
            return Ok(false);
        }
        self.last_period = now;

        match check_sync(advanced) {
            Ok(()) => self.health.clear_error(ErrorFlags::SYNC),
            Err(e) => {
                warn!("[CONTROL] {e}");
                self.health.report_error(ErrorFlags::SYNC);
            }
        }

        while let Ok(command) = commands.try_receive() {
            self.apply(command);
        }

        let elapsed = MicrosDurationU32::from_ticks(pwm.period().ticks().saturating_mul(advanced));
        self.motion
            .process(elapsed, &mut self.servos, pwm, &mut self.health, &mut self.sensor);
        self.servos.tick(pwm, &mut self.health);

        self.status = MotionStatus {
            errors: self.health.status_word(),
            disabled: self.health.disabled_modules().bits(),
            period_counter: now,
            ..self.motion.status()
        };
        self.emit_telemetry();
        MOTION_STATUS.lock(|status| status.set(self.status));

        if self.health.errors().is_fatal() {
            let status = self.health.status_word();
            error!("[CONTROL] fatal status {status:#06x}");
            self.servos.power_off(pwm);
            return Err(FatalError { status });
        }
        Ok(true)
    }

    /// Cuts servo power. Called on the way into the emergency loop.
    pub fn emergency_stop(&mut self, pwm: &PwmShared) {
        self.servos.power_off(pwm);
    }

    pub fn motion(&self) -> &MotionCore {
        &self.motion
    }

    pub fn servos(&self) -> &ServoDriver<P> {
        &self.servos
    }

    pub fn health(&self) -> &SystemMonitor {
        &self.health
    }

    pub fn health_mut(&mut self) -> &mut SystemMonitor {
        &mut self.health
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// Snapshot published by the last tick.
    pub fn status(&self) -> MotionStatus {
        self.status
    }

    fn apply(&mut self, command: Command) {
        let result = match command {
            Command::SetTargetPose(pose) => {
                self.motion.set_target_pose(pose);
                Ok(())
            }
            Command::SelectScript(id) => {
                self.motion.select_script(id);
                Ok(())
            }
            Command::SetOverride { channel, mode } => self.servos.set_override(channel, mode),
            Command::ClearOverride(channel) => self.servos.clear_override(channel),
            Command::ClearAllOverrides => {
                self.servos.clear_all_overrides();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("[CONTROL] command rejected: {e}");
        }
    }

    fn emit_telemetry(&mut self) {
        let mut line: String<TELEMETRY_LINE_SIZE> = String::new();
        if self.format_telemetry(&mut line).is_ok() {
            self.telemetry.log(&line);
        }
    }

    /// Status, surface rotation and every foot position in whole mm.
    fn format_telemetry(&self, line: &mut String<TELEMETRY_LINE_SIZE>) -> core::fmt::Result {
        let s = &self.status;
        let rotation = self.motion.surface_rotation();
        write!(
            line,
            "{} t={} parity={} y={:.1} rot={:.1},{:.1},{:.1} err={:#06x} mods={:#04x} period={} feet=",
            s.state,
            s.motion_time,
            s.loop_parity,
            s.surface_height,
            rotation.x,
            rotation.y,
            rotation.z,
            s.errors,
            s.disabled,
            s.period_counter
        )?;
        for (i, leg) in self.motion.legs().iter().enumerate() {
            let p = leg.position;
            let separator = if i == 0 { "" } else { ";" };
            write!(line, "{separator}{},{},{}", p.x as i32, p.y as i32, p.z as i32)?;
        }
        Ok(())
    }
}

fn check_sync(advanced: u32) -> Result<(), SyncError> {
    if advanced > 1 {
        return Err(SyncError { missed: advanced - 1 });
    }
    Ok(())
}
