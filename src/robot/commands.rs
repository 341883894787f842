//! Command types accepted by the control loop.
//!
//! The protocol layer turns console lines or wire frames into [`Command`]s and
//! pushes them into a [`CommandChannel`]. The control loop drains the channel
//! at the start of every tick, so a command never lands mid-computation.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

use crate::kinematics::scripts::ScriptId;
use crate::kinematics::trajectory::MotionCfg;
use crate::kinematics::vector::V3d;
use crate::robot::servo::Override;
use crate::COMMAND_CHANNEL_SIZE;

/// Requested body placement and gait.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyPose {
    /// Anchor of the virtual ground plane, body frame (mm).
    pub surface_point: V3d,
    /// Ground plane rotation (deg).
    pub surface_rotation: V3d,
    pub motion_cfg: MotionCfg,
    /// Subtract the measured body tilt from the surface rotation.
    pub stabilization: bool,
}

impl BodyPose {
    /// Standing pose at `height` with no gait.
    pub fn standing(height: f32) -> Self {
        Self {
            surface_point: V3d::new(0.0, height, 0.0),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetTargetPose(BodyPose),
    /// `None` cancels the running script.
    SelectScript(Option<ScriptId>),
    SetOverride { channel: usize, mode: Override },
    ClearOverride(usize),
    ClearAllOverrides,
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, Command, COMMAND_CHANNEL_SIZE>;
pub type CommandSender<'a> = Sender<'a, CriticalSectionRawMutex, Command, COMMAND_CHANNEL_SIZE>;
pub type CommandReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, Command, COMMAND_CHANNEL_SIZE>;
