//! Interfaces to the orientation sensor and the telemetry output.
use log::debug;

/// Body tilt source used for lean compensation.
pub trait OrientationSensor {
    /// Tilt around the X and Z axes in degrees.
    fn tilt(&mut self) -> (f32, f32);
}

/// No sensor fitted: the body is always reported level.
#[derive(Debug, Default, Clone, Copy)]
pub struct Level;

impl OrientationSensor for Level {
    fn tilt(&mut self) -> (f32, f32) {
        (0.0, 0.0)
    }
}

/// Receives one status line per control tick. Never read back.
pub trait TelemetrySink {
    fn log(&mut self, line: &str);
}

/// Forwards telemetry to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn log(&mut self, line: &str) {
        debug!("[TELEMETRY] {line}");
    }
}
