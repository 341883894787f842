//! System health: error status word and per-module enable switches.
//!
//! The control pipeline only talks to the [`HealthMonitor`] trait. The
//! [`SystemMonitor`] implementation keeps both words as bitflags so the
//! command layer can read them back as raw integers.
use bitflags::bitflags;
use log::{error, info, warn};

bitflags! {
    /// System status error flags.
    ///
    /// FATAL forces the emergency loop.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorFlags: u16 {
        /// Unrecoverable, motion stops.
        const FATAL       = 0x0001;
        /// Configuration store unreadable or corrupt.
        const MEMORY      = 0x0004;
        /// PWM period missed by the control loop.
        const SYNC        = 0x0008;
        /// Unreachable pose or out-of-range servo conversion.
        const MATH        = 0x0010;
        /// Calibration values rejected.
        const CALIBRATION = 0x0040;
    }
}

impl ErrorFlags {
    pub fn is_fatal(&self) -> bool {
        self.contains(ErrorFlags::FATAL)
    }
}

bitflags! {
    /// Firmware modules that can be switched off on failure.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modules: u8 {
        const MOTION_CORE  = 0x01;
        const SERVO_DRIVER = 0x02;
        const CONFIGURATOR = 0x04;
    }
}

pub trait HealthMonitor {
    fn report_error(&mut self, error: ErrorFlags);
    fn clear_error(&mut self, error: ErrorFlags);
    fn disable(&mut self, module: Modules);
    fn enable(&mut self, module: Modules);
    fn is_disabled(&self, module: Modules) -> bool;
    fn errors(&self) -> ErrorFlags;
}

#[derive(Debug, Default)]
pub struct SystemMonitor {
    errors: ErrorFlags,
    disabled: Modules,
}

impl SystemMonitor {
    pub const fn new() -> Self {
        Self {
            errors: ErrorFlags::empty(),
            disabled: Modules::empty(),
        }
    }

    pub fn status_word(&self) -> u16 {
        self.errors.bits()
    }

    pub fn disabled_modules(&self) -> Modules {
        self.disabled
    }
}

impl HealthMonitor for SystemMonitor {
    fn report_error(&mut self, error: ErrorFlags) {
        let new = error.difference(self.errors);
        if new.is_empty() {
            return;
        }
        self.errors |= error;
        if error.is_fatal() {
            error!("[SYSMON] fatal error {new:?}");
        } else {
            warn!("[SYSMON] error {new:?}");
        }
    }

    fn clear_error(&mut self, error: ErrorFlags) {
        self.errors.remove(error);
    }

    fn disable(&mut self, module: Modules) {
        if !self.disabled.contains(module) {
            warn!("[SYSMON] disable {module:?}");
            self.disabled |= module;
        }
    }

    fn enable(&mut self, module: Modules) {
        if self.disabled.intersects(module) {
            info!("[SYSMON] enable {module:?}");
            self.disabled.remove(module);
        }
    }

    fn is_disabled(&self, module: Modules) -> bool {
        self.disabled.intersects(module)
    }

    fn errors(&self) -> ErrorFlags {
        self.errors
    }
}
