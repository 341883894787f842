//! Preset body gestures.
//!
//! A script rewrites the target pose: once when it starts (`init`) and then
//! every time the body has settled on the previous target (`exec`). Looping
//! scripts alternate between two or four waypoints until cancelled; one-shot
//! scripts end after their single waypoint is reached.
use core::fmt::Display;

use crate::config::{SURFACE_DOWN_HEIGHT, SURFACE_UP_THRESHOLD};
use crate::kinematics::vector::V3d;
use crate::robot::commands::BodyPose;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptId {
    Up,
    Down,
    RotateX,
    RotateZ,
    RotateXy,
    UpDown,
    PushPull,
    SwayX,
    Square,
}

impl Display for ScriptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ScriptId::Up => f.write_str("up"),
            ScriptId::Down => f.write_str("down"),
            ScriptId::RotateX => f.write_str("x-rotate"),
            ScriptId::RotateZ => f.write_str("z-rotate"),
            ScriptId::RotateXy => f.write_str("xy-rotate"),
            ScriptId::UpDown => f.write_str("up-down"),
            ScriptId::PushPull => f.write_str("z-push-pull"),
            ScriptId::SwayX => f.write_str("x-sway"),
            ScriptId::Square => f.write_str("square"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Up,
    Down,
    RotateX { flipped: bool },
    RotateZ { flipped: bool },
    RotateXy { flipped: bool },
    UpDown { flipped: bool },
    PushPull { flipped: bool },
    SwayX { flipped: bool },
    Square { corner: u8 },
}

/// Raised, level and still.
fn common_init(pose: &mut BodyPose) {
    pose.surface_rotation = V3d::ZERO;
    pose.surface_point = V3d::new(0.0, SURFACE_UP_THRESHOLD, 0.0);
    pose.motion_cfg.speed = 0;
}

impl Script {
    pub fn new(id: ScriptId) -> Self {
        match id {
            ScriptId::Up => Script::Up,
            ScriptId::Down => Script::Down,
            ScriptId::RotateX => Script::RotateX { flipped: false },
            ScriptId::RotateZ => Script::RotateZ { flipped: false },
            ScriptId::RotateXy => Script::RotateXy { flipped: false },
            ScriptId::UpDown => Script::UpDown { flipped: false },
            ScriptId::PushPull => Script::PushPull { flipped: false },
            ScriptId::SwayX => Script::SwayX { flipped: false },
            ScriptId::Square => Script::Square { corner: 0 },
        }
    }

    pub fn id(&self) -> ScriptId {
        match self {
            Script::Up => ScriptId::Up,
            Script::Down => ScriptId::Down,
            Script::RotateX { .. } => ScriptId::RotateX,
            Script::RotateZ { .. } => ScriptId::RotateZ,
            Script::RotateXy { .. } => ScriptId::RotateXy,
            Script::UpDown { .. } => ScriptId::UpDown,
            Script::PushPull { .. } => ScriptId::PushPull,
            Script::SwayX { .. } => ScriptId::SwayX,
            Script::Square { .. } => ScriptId::Square,
        }
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self, Script::Up | Script::Down)
    }

    pub fn init(&self, pose: &mut BodyPose) {
        match self {
            Script::Up | Script::Down => {}
            Script::RotateXy { .. } => {
                common_init(pose);
                pose.surface_rotation.x = 15.0;
            }
            _ => common_init(pose),
        }
    }

    pub fn exec(&mut self, pose: &mut BodyPose) {
        match self {
            Script::Up => {
                common_init(pose);
                pose.motion_cfg.speed = 60;
            }
            Script::Down => {
                common_init(pose);
                pose.surface_point.y = SURFACE_DOWN_HEIGHT;
            }
            Script::RotateX { flipped } => {
                *flipped = !*flipped;
                pose.surface_rotation.x = if *flipped { -15.0 } else { 15.0 };
                pose.motion_cfg.speed = 0;
            }
            Script::RotateZ { flipped } => {
                *flipped = !*flipped;
                pose.surface_rotation.z = if *flipped { -15.0 } else { 15.0 };
                pose.motion_cfg.speed = 0;
            }
            Script::RotateXy { flipped } => {
                // Full turn of the tilted plane, then back.
                *flipped = !*flipped;
                pose.surface_rotation.y = if *flipped { 360.0 } else { 0.0 };
                pose.motion_cfg.speed = 60;
            }
            Script::UpDown { flipped } => {
                *flipped = !*flipped;
                pose.surface_point.y = if *flipped { -115.0 } else { SURFACE_UP_THRESHOLD };
                pose.motion_cfg.speed = 0;
            }
            Script::PushPull { flipped } => {
                *flipped = !*flipped;
                pose.surface_point.z = if *flipped { -50.0 } else { 50.0 };
            }
            Script::SwayX { flipped } => {
                *flipped = !*flipped;
                if *flipped {
                    pose.surface_rotation.x = -20.0;
                    pose.surface_point.z = 50.0;
                } else {
                    pose.surface_rotation.x = 20.0;
                    pose.surface_point.z = -50.0;
                }
                pose.motion_cfg.speed = 0;
            }
            Script::Square { corner } => {
                let (x, z) = match *corner {
                    0 => (10.0, 10.0),
                    1 => (-10.0, -10.0),
                    2 => (-10.0, 10.0),
                    _ => (10.0, -10.0),
                };
                pose.surface_rotation.x = x;
                pose.surface_rotation.z = z;
                *corner = (*corner + 1) % 4;
            }
        }
    }
}
