//! Hexapod motion state machine.
//!
//! [`MotionCore`] owns the legs and both copies of the body pose. Once per PWM
//! period it advances the gait, blends the body surface toward its target,
//! solves every leg and hands the joint angles to the servo layer.
use embedded_hal::digital::OutputPin;
use fugit::MicrosDurationU32;
use log::{error, info, warn};

use crate::config::{
    BASE_POSITIONS, LEGS_COUNT, LIMBS_DOWN_TIMEOUT_MS, LIMB_MAX_STEP, MOTION_TIME_MAX, MOTION_TIME_MID,
    MOTION_TIME_MIN, MOTION_TIME_STEP, STEP_HEIGHT_MAX, STEP_HEIGHT_MIN, SURFACE_DOWN_HEIGHT, SURFACE_MAX_HEIGHT,
    SURFACE_MAX_STEP, SURFACE_MAX_TILT, SURFACE_UP_THRESHOLD,
};
use crate::error::MathError;
use crate::kinematics::scripts::{Script, ScriptId};
use crate::kinematics::solver::{compute_joint_angles, compute_surface_offsets};
use crate::kinematics::trajectory::{advanced_trajectory, is_airborne, MotionCfg};
use crate::kinematics::vector::{StepToward, V3d};
use crate::pwm::PwmShared;
use crate::robot::commands::BodyPose;
use crate::robot::health::{ErrorFlags, HealthMonitor, Modules};
use crate::robot::joint::JointKind;
use crate::robot::leg::Leg;
use crate::robot::sensor::OrientationSensor;
use crate::robot::servo::ServoDriver;
use crate::robot::state::{HexapodState, MotionStatus};
use crate::storage::HexapodConfig;

const LIMBS_DOWN_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::millis(LIMBS_DOWN_TIMEOUT_MS);

#[derive(Debug, Clone, Copy)]
struct ActiveScript {
    script: Script,
    started: bool,
    executed: bool,
}

pub struct MotionCore {
    legs: [Leg; LEGS_COUNT],
    base_positions: [V3d; LEGS_COUNT],
    state: HexapodState,
    motion_time: u32,
    loop_parity: u32,
    /// Pose requested by the command layer or the running script.
    target: BodyPose,
    /// Gait parameters latched at the half-cycle reload point.
    cfg: MotionCfg,
    surface_point: V3d,
    surface_rotation: V3d,
    surface_settled: bool,
    idle: MicrosDurationU32,
    script: Option<ActiveScript>,
}

impl MotionCore {
    pub fn new(config: &HexapodConfig) -> Self {
        let mut target = BodyPose::default();
        neutralize(&mut target);
        Self {
            legs: config.build_legs(),
            base_positions: BASE_POSITIONS.map(V3d::from_array),
            state: HexapodState::Down,
            motion_time: MOTION_TIME_MIN,
            loop_parity: 0,
            target,
            cfg: target.motion_cfg,
            surface_point: V3d::new(0.0, SURFACE_DOWN_HEIGHT, 0.0),
            surface_rotation: V3d::ZERO,
            surface_settled: true,
            idle: MicrosDurationU32::from_ticks(0),
            script: None,
        }
    }

    pub fn state(&self) -> HexapodState {
        self.state
    }

    pub fn legs(&self) -> &[Leg; LEGS_COUNT] {
        &self.legs
    }

    pub fn target(&self) -> &BodyPose {
        &self.target
    }

    pub fn surface_point(&self) -> V3d {
        self.surface_point
    }

    pub fn surface_rotation(&self) -> V3d {
        self.surface_rotation
    }

    pub fn active_script(&self) -> Option<ScriptId> {
        self.script.map(|active| active.script.id())
    }

    pub fn status(&self) -> MotionStatus {
        MotionStatus {
            state: self.state,
            motion_time: self.motion_time,
            loop_parity: self.loop_parity,
            script: self.active_script(),
            surface_height: self.surface_point.y,
            ..MotionStatus::initial()
        }
    }

    /// Replaces the target pose. While lying down only raising the body is
    /// accepted, everything else is reset to neutral.
    pub fn set_target_pose(&mut self, pose: BodyPose) {
        self.target = pose;
        if self.state == HexapodState::Down {
            neutralize(&mut self.target);
        }
    }

    /// Starts a script, or cancels the running one with `None`.
    ///
    /// Returns `false` when another script is still running.
    pub fn select_script(&mut self, id: Option<ScriptId>) -> bool {
        match id {
            None => {
                if let Some(active) = self.script.take() {
                    info!("[MOTION_CORE] script {} cancelled", active.script.id());
                }
                true
            }
            Some(id) => {
                if let Some(active) = &self.script {
                    warn!("[MOTION_CORE] script {id} rejected, {} running", active.script.id());
                    return false;
                }
                info!("[MOTION_CORE] script {id} selected");
                self.script = Some(ActiveScript {
                    script: Script::new(id),
                    started: false,
                    executed: false,
                });
                true
            }
        }
    }

    /// One control tick. `elapsed` is the PWM period that just ended.
    pub fn process<P, H, S>(
        &mut self,
        elapsed: MicrosDurationU32,
        servos: &mut ServoDriver<P>,
        pwm: &PwmShared,
        health: &mut H,
        sensor: &mut S,
    ) where
        P: OutputPin,
        H: HealthMonitor,
        S: OrientationSensor,
    {
        if health.is_disabled(Modules::MOTION_CORE) {
            return;
        }

        self.run_script();
        self.target.motion_cfg.step_height = self
            .target
            .motion_cfg
            .step_height
            .clamp(STEP_HEIGHT_MIN, STEP_HEIGHT_MAX);
        servos.set_speed(pwm, self.target.motion_cfg.speed);

        if let Err(e) = self.advance_gait(elapsed) {
            self.fail(e, servos, pwm, health);
            return;
        }

        let (point, rotation) = self.surface_destination(sensor);
        let point_moving = self.surface_point.step_toward(point, SURFACE_MAX_STEP);
        let rotation_moving = self.surface_rotation.step_toward(rotation, SURFACE_MAX_STEP);
        self.surface_settled = !point_moving && !rotation_moving;
        self.update_body_state();

        let solved = compute_surface_offsets(&mut self.legs, self.surface_point, self.surface_rotation)
            .and_then(|()| compute_joint_angles(&mut self.legs));
        if let Err(e) = solved {
            self.fail(e, servos, pwm, health);
            return;
        }

        for leg in self.legs.iter() {
            for kind in JointKind::ALL {
                if let Err(e) = servos.move_to(leg.channel(kind), leg.joint(kind).angle) {
                    error!("[MOTION_CORE] {e}");
                }
            }
        }
    }

    fn fail<P: OutputPin, H: HealthMonitor>(
        &mut self,
        e: MathError,
        servos: &mut ServoDriver<P>,
        pwm: &PwmShared,
        health: &mut H,
    ) {
        error!("[MOTION_CORE] {e}");
        health.report_error(ErrorFlags::MATH);
        health.disable(Modules::MOTION_CORE | Modules::SERVO_DRIVER);
        servos.power_off(pwm);
    }

    fn run_script(&mut self) {
        let Some(active) = self.script.as_mut() else {
            return;
        };

        if !active.started {
            active.script.init(&mut self.target);
            active.started = true;
            self.surface_settled = false;
        } else if self.surface_settled {
            if active.script.is_one_shot() && active.executed {
                info!("[MOTION_CORE] script {} completed", active.script.id());
                self.script = None;
                return;
            }
            active.script.exec(&mut self.target);
            active.executed = true;
            self.surface_settled = false;
        }

        if self.state == HexapodState::Down {
            neutralize(&mut self.target);
        }
    }

    fn advance_gait(&mut self, elapsed: MicrosDurationU32) -> Result<(), MathError> {
        match self.state {
            HexapodState::Down => {}
            HexapodState::Ready => {
                if self.target.motion_cfg.distance != 0 {
                    self.cfg = self.target.motion_cfg;
                    self.state = HexapodState::MotionInit;
                    info!("[MOTION_CORE] gait start, {:?}", self.cfg);
                }
            }
            HexapodState::MotionInit => {
                let mut moving = false;
                for (i, leg) in self.legs.iter_mut().enumerate() {
                    if is_airborne(i, self.loop_parity) {
                        let lifted = self.base_positions[i].y + self.cfg.step_height;
                        moving |= leg.position.y.step_toward(lifted, LIMB_MAX_STEP);
                    }
                }
                if !moving {
                    self.motion_time = MOTION_TIME_MID;
                    self.idle = MicrosDurationU32::from_ticks(0);
                    self.state = HexapodState::MotionExec;
                }
            }
            HexapodState::MotionExec => {
                if self.target.motion_cfg.distance == 0 {
                    self.idle = MicrosDurationU32::from_ticks(self.idle.ticks().saturating_add(elapsed.ticks()));
                    if self.idle >= LIMBS_DOWN_TIMEOUT {
                        info!("[MOTION_CORE] gait stop");
                        self.state = HexapodState::MotionDeinit;
                    }
                    return Ok(());
                }

                self.idle = MicrosDurationU32::from_ticks(0);
                if self.motion_time == MOTION_TIME_MID {
                    self.cfg = self.target.motion_cfg;
                }
                advanced_trajectory(
                    &mut self.legs,
                    &self.base_positions,
                    self.motion_time,
                    self.loop_parity,
                    &self.cfg,
                )?;
                self.motion_time += MOTION_TIME_STEP;
                if self.motion_time > MOTION_TIME_MAX {
                    self.motion_time = MOTION_TIME_MIN;
                    self.loop_parity = self.loop_parity.wrapping_add(1);
                }
            }
            HexapodState::MotionDeinit => {
                if self.target.motion_cfg.distance != 0 {
                    self.cfg = self.target.motion_cfg;
                    self.state = HexapodState::MotionInit;
                    return Ok(());
                }

                let mut moving = false;
                for (leg, base) in self.legs.iter_mut().zip(self.base_positions.iter()) {
                    moving |= leg.position.step_toward(*base, LIMB_MAX_STEP);
                }
                if !moving {
                    self.motion_time = MOTION_TIME_MIN;
                    self.loop_parity = 0;
                    if self.target.surface_point.y > SURFACE_UP_THRESHOLD {
                        self.enter_down();
                    } else {
                        self.state = HexapodState::Ready;
                    }
                }
            }
        }
        Ok(())
    }

    /// Target surface after lean compensation and height limits.
    fn surface_destination<S: OrientationSensor>(&self, sensor: &mut S) -> (V3d, V3d) {
        let mut point = self.target.surface_point;
        let mut rotation = self.target.surface_rotation;

        if self.target.stabilization && self.state != HexapodState::Down {
            let (tilt_x, tilt_z) = sensor.tilt();
            rotation.x -= tilt_x;
            rotation.z -= tilt_z;
        }
        rotation.x = rotation.x.clamp(-SURFACE_MAX_TILT, SURFACE_MAX_TILT);
        rotation.z = rotation.z.clamp(-SURFACE_MAX_TILT, SURFACE_MAX_TILT);

        // No lowering below the walking height while stepping.
        let up_limit = if self.state == HexapodState::MotionExec {
            SURFACE_UP_THRESHOLD
        } else {
            SURFACE_DOWN_HEIGHT
        };
        point.y = point.y.clamp(SURFACE_MAX_HEIGHT, up_limit);
        (point, rotation)
    }

    fn update_body_state(&mut self) {
        let raised = self.surface_point.y <= SURFACE_UP_THRESHOLD;
        match self.state {
            HexapodState::Down if raised && self.surface_settled => {
                info!("[MOTION_CORE] body raised");
                self.state = HexapodState::Ready;
            }
            HexapodState::Ready if !raised => self.enter_down(),
            _ => {}
        }
    }

    fn enter_down(&mut self) {
        info!("[MOTION_CORE] body down");
        self.state = HexapodState::Down;
        neutralize(&mut self.target);
    }
}

/// Only a body height at or beyond the up threshold survives.
fn neutralize(pose: &mut BodyPose) {
    let height = pose.surface_point.y;
    *pose = BodyPose::default();
    if height <= SURFACE_UP_THRESHOLD {
        pose.surface_point.y = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::health::SystemMonitor;
    use crate::robot::sensor::Level;
    use crate::robot::servo::ServoCalibration;
    use core::convert::Infallible;

    struct NoPin;

    impl embedded_hal::digital::ErrorType for NoPin {
        type Error = Infallible;
    }

    impl OutputPin for NoPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct Rig {
        core: MotionCore,
        servos: ServoDriver<NoPin>,
        pwm: PwmShared,
        health: SystemMonitor,
    }

    impl Rig {
        fn new() -> Self {
            Self::with_config(&HexapodConfig::default())
        }

        fn with_config(config: &HexapodConfig) -> Self {
            Self {
                core: MotionCore::new(config),
                servos: ServoDriver::new(ServoCalibration::factory(), NoPin),
                pwm: PwmShared::new(),
                health: SystemMonitor::new(),
            }
        }

        fn tick(&mut self) {
            self.tick_with(&mut Level);
        }

        fn tick_with<S: OrientationSensor>(&mut self, sensor: &mut S) {
            self.core.process(
                MicrosDurationU32::from_ticks(5000),
                &mut self.servos,
                &self.pwm,
                &mut self.health,
                sensor,
            );
        }

        fn tick_until(&mut self, state: HexapodState, limit: usize) {
            for _ in 0..limit {
                if self.core.state() == state {
                    return;
                }
                self.tick();
            }
            assert_eq!(self.core.state(), state);
        }

        fn stand(&mut self) {
            self.core.set_target_pose(BodyPose::standing(-100.0));
            self.tick_until(HexapodState::Ready, 200);
        }
    }

    struct Tilted(f32, f32);

    impl OrientationSensor for Tilted {
        fn tilt(&mut self) -> (f32, f32) {
            (self.0, self.1)
        }
    }

    fn walking(distance: i16) -> BodyPose {
        let mut pose = BodyPose::standing(-100.0);
        pose.motion_cfg.distance = distance;
        pose
    }

    #[test]
    fn raising_the_body_leaves_down_state() {
        let mut rig = Rig::new();
        rig.tick();
        assert_eq!(rig.core.state(), HexapodState::Down);
        for leg in rig.core.legs() {
            assert_eq!(leg.surface_offset.y, -15.0);
        }
        rig.stand();
        assert_eq!(rig.core.surface_point().y, -100.0);
    }

    #[test]
    fn down_state_neutralizes_requested_gait() {
        let mut rig = Rig::new();
        let mut pose = walking(50);
        pose.surface_rotation = V3d::new(10.0, 0.0, 0.0);
        pose.surface_point.y = -50.0;
        rig.core.set_target_pose(pose);
        assert_eq!(rig.core.target().motion_cfg.distance, 0);
        assert_eq!(rig.core.target().surface_rotation, V3d::ZERO);
        assert_eq!(rig.core.target().surface_point.y, 0.0);
    }

    #[test]
    fn gait_runs_through_all_states() {
        let mut rig = Rig::new();
        rig.stand();

        rig.core.set_target_pose(walking(50));
        rig.tick();
        assert_eq!(rig.core.state(), HexapodState::MotionInit);
        rig.tick_until(HexapodState::MotionExec, 100);
        assert!((rig.core.legs()[0].position.y - 30.0).abs() < 1e-4);
        assert_eq!(rig.core.legs()[1].position.y, 0.0);

        // 26 ticks finish the first half cycle, 51 more the next one.
        for _ in 0..80 {
            rig.tick();
        }
        assert_eq!(rig.core.status().loop_parity, 2);

        rig.core.set_target_pose(walking(0));
        rig.tick_until(HexapodState::MotionDeinit, 30);
        rig.tick_until(HexapodState::Ready, 200);
        for (leg, base) in rig.core.legs().iter().zip(BASE_POSITIONS.iter()) {
            assert_eq!(leg.position, V3d::from_array(*base));
        }
    }

    #[test]
    fn zero_distance_freezes_legs_on_the_same_tick() {
        let mut rig = Rig::new();
        rig.stand();
        rig.core.set_target_pose(walking(50));
        rig.tick_until(HexapodState::MotionExec, 100);
        for _ in 0..7 {
            rig.tick();
        }

        let before = *rig.core.legs();
        rig.core.set_target_pose(walking(0));
        rig.tick();
        assert_eq!(rig.core.state(), HexapodState::MotionExec);
        for (after, before) in rig.core.legs().iter().zip(before.iter()) {
            assert_eq!(after.position, before.position);
            assert_eq!(after.coxa.angle, before.coxa.angle);
            assert_eq!(after.femur.angle, before.femur.angle);
            assert_eq!(after.tibia.angle, before.tibia.angle);
        }
    }

    #[test]
    fn lowering_target_returns_to_down() {
        let mut rig = Rig::new();
        rig.stand();
        rig.core.set_target_pose(BodyPose::standing(-40.0));
        rig.tick_until(HexapodState::Down, 100);
        for _ in 0..100 {
            rig.tick();
        }
        assert_eq!(rig.core.surface_point().y, SURFACE_DOWN_HEIGHT);
    }

    #[test]
    fn second_script_is_rejected_until_cancel() {
        let mut rig = Rig::new();
        assert!(rig.core.select_script(Some(ScriptId::RotateX)));
        for _ in 0..10 {
            rig.tick();
        }
        assert!(!rig.core.select_script(Some(ScriptId::UpDown)));
        assert_eq!(rig.core.active_script(), Some(ScriptId::RotateX));

        assert!(rig.core.select_script(None));
        assert_eq!(rig.core.active_script(), None);
        assert!(rig.core.select_script(Some(ScriptId::UpDown)));
        assert_eq!(rig.core.active_script(), Some(ScriptId::UpDown));
    }

    #[test]
    fn one_shot_script_completes_and_frees_the_slot() {
        let mut rig = Rig::new();
        assert!(rig.core.select_script(Some(ScriptId::Up)));
        for _ in 0..200 {
            rig.tick();
            if rig.core.active_script().is_none() {
                break;
            }
        }
        assert_eq!(rig.core.active_script(), None);
        assert_eq!(rig.core.state(), HexapodState::Ready);
        assert_eq!(rig.core.surface_point().y, SURFACE_UP_THRESHOLD);
        assert!(rig.core.select_script(Some(ScriptId::Down)));
    }

    #[test]
    fn surface_tilt_is_limited_after_compensation() {
        let mut rig = Rig::new();
        rig.stand();
        let mut pose = BodyPose::standing(-100.0);
        pose.surface_rotation = V3d::new(15.0, 40.0, -4.0);
        pose.stabilization = true;
        rig.core.set_target_pose(pose);
        let mut sensor = Tilted(0.0, 10.0);
        for _ in 0..40 {
            rig.tick_with(&mut sensor);
        }
        assert_eq!(rig.core.surface_rotation(), V3d::new(SURFACE_MAX_TILT, 40.0, -SURFACE_MAX_TILT));
        assert!(rig.health.errors().is_empty());
        assert_eq!(rig.core.state(), HexapodState::Ready);
    }

    #[test]
    fn unreachable_pose_disables_motion_and_servos() {
        // Tibias too short to reach the standing height.
        let mut config = HexapodConfig::default();
        for leg in config.legs.iter_mut() {
            leg.tibia.length = 30;
        }
        let mut rig = Rig::with_config(&config);
        rig.servos.power_on(&rig.pwm);
        rig.core.set_target_pose(BodyPose::standing(-100.0));
        for _ in 0..200 {
            rig.tick();
        }
        assert!(rig.health.errors().contains(ErrorFlags::MATH));
        assert!(rig.health.is_disabled(Modules::MOTION_CORE));
        assert!(rig.health.is_disabled(Modules::SERVO_DRIVER));
        assert!(!rig.servos.is_powered());
        assert!(!rig.pwm.is_enabled());
    }
}
