use core::fmt::Display;
use core::ops::{Index, IndexMut};

use super::joint::{Joint, JointKind};
use crate::config::LEGS_COUNT;
use crate::kinematics::vector::V3d;

/// Leg identity, numbered in servo channel order (left side first, front to rear).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegId {
    LeftFront = 0,
    LeftMiddle = 1,
    LeftRear = 2,
    RightFront = 3,
    RightMiddle = 4,
    RightRear = 5,
}

impl LegId {
    pub const ALL: [LegId; LEGS_COUNT] = [
        LegId::LeftFront,
        LegId::LeftMiddle,
        LegId::LeftRear,
        LegId::RightFront,
        LegId::RightMiddle,
        LegId::RightRear,
    ];
}

impl Display for LegId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LegId::LeftFront => f.write_str("Left front"),
            LegId::LeftMiddle => f.write_str("Left middle"),
            LegId::LeftRear => f.write_str("Left rear"),
            LegId::RightFront => f.write_str("Right front"),
            LegId::RightMiddle => f.write_str("Right middle"),
            LegId::RightRear => f.write_str("Right rear"),
        }
    }
}

impl From<usize> for LegId {
    fn from(value: usize) -> Self {
        LegId::ALL[value % LEGS_COUNT]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub id: LegId,
    /// Foot position on flat ground, leg-local frame (mm).
    pub position: V3d,
    /// Height correction from the surface plane, recomputed every tick.
    pub surface_offset: V3d,
    pub coxa: Joint,
    pub femur: Joint,
    pub tibia: Joint,
}

impl Leg {
    pub fn new(id: LegId, position: V3d, coxa: Joint, femur: Joint, tibia: Joint) -> Self {
        Self {
            id,
            position,
            surface_offset: V3d::ZERO,
            coxa,
            femur,
            tibia,
        }
    }

    /// The point the foot is driven to: position plus surface offset.
    pub fn target(&self) -> V3d {
        self.position + self.surface_offset
    }

    pub fn joint(&self, kind: JointKind) -> &Joint {
        match kind {
            JointKind::Coxa => &self.coxa,
            JointKind::Femur => &self.femur,
            JointKind::Tibia => &self.tibia,
        }
    }

    pub fn joint_mut(&mut self, kind: JointKind) -> &mut Joint {
        match kind {
            JointKind::Coxa => &mut self.coxa,
            JointKind::Femur => &mut self.femur,
            JointKind::Tibia => &mut self.tibia,
        }
    }

    /// Servo channel driving `kind` on this leg.
    pub fn channel(&self, kind: JointKind) -> usize {
        self.id as usize * 3 + kind as usize
    }
}

impl Index<LegId> for [Leg; LEGS_COUNT] {
    type Output = Leg;

    fn index(&self, leg: LegId) -> &Self::Output {
        &self[leg as usize]
    }
}

impl IndexMut<LegId> for [Leg; LEGS_COUNT] {
    fn index_mut(&mut self, leg: LegId) -> &mut Self::Output {
        &mut self[leg as usize]
    }
}

impl Index<LegId> for [V3d; LEGS_COUNT] {
    type Output = V3d;

    fn index(&self, leg: LegId) -> &Self::Output {
        &self[leg as usize]
    }
}
