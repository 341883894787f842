use embedded_hal::digital::OutputPin;
use fugit::HertzU32;
use log::{error, info};

use crate::config::{
    SERVO_CALIBRATION, SERVO_CHANNELS, SERVO_LOGIC_ZERO, SERVO_MAX_PHYSIC_ANGLE, SERVO_MAX_PULSE_US,
    SERVO_MIN_PULSE_US,
};
use crate::error::ServoError;
use crate::pwm::{PwmShared, Ticks};
use crate::robot::health::{ErrorFlags, HealthMonitor, Modules};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoCalibration {
    pub reversed: bool,
    /// Mounting offset in degrees, added to the logic angle.
    pub zero_trim: f32,
}

impl ServoCalibration {
    pub fn factory() -> [ServoCalibration; SERVO_CHANNELS] {
        SERVO_CALIBRATION.map(|(reversed, zero_trim)| ServoCalibration {
            reversed,
            zero_trim: zero_trim as f32,
        })
    }
}

/// Diagnostic bypass of one stage of the angle to pulse pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Override {
    LogicAngle(f32),
    PhysicAngle(f32),
    PulseWidth(Ticks),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoChannel {
    pub calibration: ServoCalibration,
    pub override_mode: Option<Override>,
    /// Angle requested by the motion core.
    pub target_angle: f32,
    pub logic_angle: f32,
    pub physic_angle: f32,
    pub pulse_width: Ticks,
}

impl ServoChannel {
    fn new(calibration: ServoCalibration) -> Self {
        Self {
            calibration,
            override_mode: None,
            target_angle: 0.0,
            logic_angle: 0.0,
            physic_angle: SERVO_LOGIC_ZERO,
            pulse_width: 0,
        }
    }

    /// Runs the logic -> physic -> pulse pipeline and stores every stage.
    fn update(&mut self, channel: usize) -> Result<Ticks, ServoError> {
        self.logic_angle = match self.override_mode {
            Some(Override::LogicAngle(angle)) => angle,
            _ => self.target_angle,
        };

        self.physic_angle = match self.override_mode {
            Some(Override::PhysicAngle(angle)) => angle,
            _ => {
                let trimmed = self.logic_angle + self.calibration.zero_trim;
                let angle = if self.calibration.reversed {
                    SERVO_LOGIC_ZERO - trimmed
                } else {
                    SERVO_LOGIC_ZERO + trimmed
                };
                if !(0.0..=SERVO_MAX_PHYSIC_ANGLE).contains(&angle) {
                    return Err(ServoError::PhysicAngleOutOfRange { channel, angle });
                }
                angle
            }
        };

        self.pulse_width = match self.override_mode {
            Some(Override::PulseWidth(width)) => width,
            _ => {
                let width = SERVO_MIN_PULSE_US
                    + self.physic_angle * (SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US) / SERVO_MAX_PHYSIC_ANGLE;
                if !(SERVO_MIN_PULSE_US..=SERVO_MAX_PULSE_US).contains(&width) {
                    return Err(ServoError::PulseWidthOutOfRange { channel, width });
                }
                width as Ticks
            }
        };
        Ok(self.pulse_width)
    }
}

/// The 18 servo channels plus the switch of their shared supply.
pub struct ServoDriver<P> {
    channels: [ServoChannel; SERVO_CHANNELS],
    power: P,
    powered: bool,
}

impl<P> ServoDriver<P>
where
    P: OutputPin,
{
    pub fn new(calibration: [ServoCalibration; SERVO_CHANNELS], power: P) -> Self {
        Self {
            channels: calibration.map(ServoChannel::new),
            power,
            powered: false,
        }
    }

    pub fn channel(&self, channel: usize) -> Option<&ServoChannel> {
        self.channels.get(channel)
    }

    fn channel_mut(&mut self, channel: usize) -> Result<&mut ServoChannel, ServoError> {
        self.channels
            .get_mut(channel)
            .ok_or(ServoError::InvalidChannel(channel))
    }

    /// Sets the logic angle rendered on the next tick.
    pub fn move_to(&mut self, channel: usize, logic_angle: f32) -> Result<(), ServoError> {
        self.channel_mut(channel)?.target_angle = logic_angle;
        Ok(())
    }

    pub fn set_override(&mut self, channel: usize, mode: Override) -> Result<(), ServoError> {
        info!("[SERVO] channel {channel} override {mode:?}");
        self.channel_mut(channel)?.override_mode = Some(mode);
        Ok(())
    }

    pub fn clear_override(&mut self, channel: usize) -> Result<(), ServoError> {
        self.channel_mut(channel)?.override_mode = None;
        Ok(())
    }

    pub fn clear_all_overrides(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.override_mode = None;
        }
    }

    /// Maps `speed` (0..=100) onto the PWM frequency range.
    pub fn set_speed(&self, pwm: &PwmShared, speed: u8) {
        let (min, max) = pwm.frequency_limits();
        let span = max.raw() - min.raw();
        let hz = min.raw() + span * u32::from(speed.min(100)) / 100;
        pwm.set_frequency(HertzU32::from_raw(hz));
    }

    pub fn power_on(&mut self, pwm: &PwmShared) {
        if self.powered {
            return;
        }
        info!("[SERVO] power on");
        pwm.enable();
        if self.power.set_high().is_err() {
            error!("[SERVO] cannot switch servo supply on");
        }
        self.powered = true;
    }

    pub fn power_off(&mut self, pwm: &PwmShared) {
        pwm.disable();
        if self.power.set_low().is_err() {
            error!("[SERVO] cannot switch servo supply off");
        }
        if self.powered {
            info!("[SERVO] power off");
        }
        self.powered = false;
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Recomputes all pulse widths and publishes them as one frame.
    ///
    /// A conversion failure reports a math error, disables the motion and
    /// servo modules and cuts the supply. Nothing of the failed frame reaches the scheduler.
    pub fn tick<H: HealthMonitor>(&mut self, pwm: &PwmShared, health: &mut H) {
        if health.is_disabled(Modules::SERVO_DRIVER) {
            if self.powered {
                self.power_off(pwm);
            }
            return;
        }

        let mut widths = [0 as Ticks; SERVO_CHANNELS];
        for (i, (slot, channel)) in widths.iter_mut().zip(self.channels.iter_mut()).enumerate() {
            match channel.update(i) {
                Ok(width) => *slot = width,
                Err(e) => {
                    error!("[SERVO] {e}");
                    health.report_error(ErrorFlags::MATH);
                    health.disable(Modules::MOTION_CORE | Modules::SERVO_DRIVER);
                    self.power_off(pwm);
                    return;
                }
            }
        }

        let frame = pwm.hold();
        for (channel, width) in widths.iter().enumerate() {
            frame.set_width(channel, Some(*width));
        }
    }
}
