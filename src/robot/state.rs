use core::cell::Cell;
use core::fmt::{self, Display, Formatter};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::kinematics::scripts::ScriptId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexapodState {
    Down,
    Ready,
    MotionInit,
    MotionExec,
    MotionDeinit,
}

impl Display for HexapodState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HexapodState::Down => f.write_str("down"),
            HexapodState::Ready => f.write_str("ready"),
            HexapodState::MotionInit => f.write_str("motion-init"),
            HexapodState::MotionExec => f.write_str("motion-exec"),
            HexapodState::MotionDeinit => f.write_str("motion-deinit"),
        }
    }
}

/// Snapshot published once per tick for the command layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStatus {
    pub state: HexapodState,
    pub motion_time: u32,
    pub loop_parity: u32,
    pub script: Option<ScriptId>,
    pub surface_height: f32,
    /// Raw health status word.
    pub errors: u16,
    /// Raw switched-off module mask.
    pub disabled: u8,
    pub period_counter: u32,
}

impl MotionStatus {
    pub const fn initial() -> Self {
        Self {
            state: HexapodState::Down,
            motion_time: 0,
            loop_parity: 0,
            script: None,
            surface_height: 0.0,
            errors: 0,
            disabled: 0,
            period_counter: 0,
        }
    }
}

pub static MOTION_STATUS: Mutex<CriticalSectionRawMutex, Cell<MotionStatus>> =
    Mutex::new(Cell::new(MotionStatus::initial()));

/// Latest published status.
pub fn motion_status() -> MotionStatus {
    MOTION_STATUS.lock(|status| status.get())
}
