use log::{error, info};

use super::memory_map::*;
use super::{seal_page, verify_integrity, ConfigStore};
use crate::config::{
    BASE_POSITIONS, COXA_LENGTH as DEFAULT_COXA_LENGTH, COXA_PROTECTION, COXA_ZERO_ROTATE as DEFAULT_COXA_ZERO,
    FEMUR_LENGTH as DEFAULT_FEMUR_LENGTH, FEMUR_PROTECTION, FEMUR_ZERO_ROTATE as DEFAULT_FEMUR_ZERO,
    LEGS_COUNT, SERVO_CHANNELS, TIBIA_LENGTH as DEFAULT_TIBIA_LENGTH, TIBIA_PROTECTION,
    TIBIA_ZERO_ROTATE as DEFAULT_TIBIA_ZERO,
};
use crate::error::{ConfigError, IoError};
use crate::kinematics::vector::V3d;
use crate::robot::health::{ErrorFlags, HealthMonitor, Modules};
use crate::robot::joint::{Joint, JointKind};
use crate::robot::leg::{Leg, LegId};
use crate::robot::servo::ServoCalibration;

/// Raw joint calibration as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointConfig {
    pub length: u16,
    pub zero_rotate: i16,
    pub min_angle: i16,
    pub max_angle: i16,
}

impl JointConfig {
    fn joint(&self) -> Joint {
        Joint::new(
            self.length as f32,
            self.zero_rotate as f32,
            self.min_angle as f32,
            self.max_angle as f32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegConfig {
    pub coxa: JointConfig,
    pub femur: JointConfig,
    pub tibia: JointConfig,
}

impl LegConfig {
    fn joint(&self, kind: JointKind) -> &JointConfig {
        match kind {
            JointKind::Coxa => &self.coxa,
            JointKind::Femur => &self.femur,
            JointKind::Tibia => &self.tibia,
        }
    }
}

/// Leg geometry and servo calibration loaded at start-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexapodConfig {
    pub legs: [LegConfig; LEGS_COUNT],
    pub servos: [ServoCalibration; SERVO_CHANNELS],
}

impl Default for HexapodConfig {
    fn default() -> Self {
        let joint = |length, zero_rotate, (min_angle, max_angle): (i16, i16)| JointConfig {
            length,
            zero_rotate,
            min_angle,
            max_angle,
        };
        Self {
            legs: core::array::from_fn(|i| LegConfig {
                coxa: joint(DEFAULT_COXA_LENGTH, DEFAULT_COXA_ZERO[i], COXA_PROTECTION),
                femur: joint(DEFAULT_FEMUR_LENGTH, DEFAULT_FEMUR_ZERO, FEMUR_PROTECTION),
                tibia: joint(DEFAULT_TIBIA_LENGTH, DEFAULT_TIBIA_ZERO, TIBIA_PROTECTION),
            }),
            servos: ServoCalibration::factory(),
        }
    }
}

fn read_u8<S: ConfigStore>(store: &mut S, address: u16) -> Result<u8, IoError> {
    let mut raw = [0u8; 1];
    store.read_bytes(address, &mut raw)?;
    Ok(raw[0])
}

fn read_u16<S: ConfigStore>(store: &mut S, address: u16) -> Result<u16, IoError> {
    let mut raw = [0u8; 2];
    store.read_bytes(address, &mut raw)?;
    Ok(u16::from_le_bytes(raw))
}

fn read_i16<S: ConfigStore>(store: &mut S, address: u16) -> Result<i16, IoError> {
    read_u16(store, address).map(|v| v as i16)
}

fn write_i16<S: ConfigStore>(store: &mut S, address: u16, value: i16) -> Result<(), IoError> {
    store.write_bytes(address, &value.to_le_bytes())
}

impl HexapodConfig {
    /// Verifies the store checksums, reads the calibration and validates it.
    pub fn load<S: ConfigStore>(store: &mut S) -> Result<Self, ConfigError> {
        verify_integrity(store)?;

        let coxa_length = read_u16(store, LIMBS_BASE + COXA_LENGTH)?;
        let femur_length = read_u16(store, LIMBS_BASE + FEMUR_LENGTH)?;
        let tibia_length = read_u16(store, LIMBS_BASE + TIBIA_LENGTH)?;
        let femur_zero = read_i16(store, LIMBS_BASE + FEMUR_ZERO_ROTATE)?;
        let tibia_zero = read_i16(store, LIMBS_BASE + TIBIA_ZERO_ROTATE)?;
        let coxa_protection = (
            read_i16(store, LIMBS_BASE + COXA_PROTECTION_MIN)?,
            read_i16(store, LIMBS_BASE + COXA_PROTECTION_MAX)?,
        );
        let femur_protection = (
            read_i16(store, LIMBS_BASE + FEMUR_PROTECTION_MIN)?,
            read_i16(store, LIMBS_BASE + FEMUR_PROTECTION_MAX)?,
        );
        let tibia_protection = (
            read_i16(store, LIMBS_BASE + TIBIA_PROTECTION_MIN)?,
            read_i16(store, LIMBS_BASE + TIBIA_PROTECTION_MAX)?,
        );

        let mut legs = [LegConfig {
            coxa: JointConfig {
                length: coxa_length,
                zero_rotate: 0,
                min_angle: coxa_protection.0,
                max_angle: coxa_protection.1,
            },
            femur: JointConfig {
                length: femur_length,
                zero_rotate: femur_zero,
                min_angle: femur_protection.0,
                max_angle: femur_protection.1,
            },
            tibia: JointConfig {
                length: tibia_length,
                zero_rotate: tibia_zero,
                min_angle: tibia_protection.0,
                max_angle: tibia_protection.1,
            },
        }; LEGS_COUNT];
        for (i, leg) in legs.iter_mut().enumerate() {
            leg.coxa.zero_rotate = read_i16(store, coxa_zero_rotate(i))?;
        }

        let mut servos = [ServoCalibration {
            reversed: false,
            zero_trim: 0.0,
        }; SERVO_CHANNELS];
        for (channel, servo) in servos.iter_mut().enumerate() {
            let config = read_u8(store, servo_field(channel, SERVO_CONFIG))?;
            servo.reversed = config & SERVO_REVERSE_MASK != 0;
            servo.zero_trim = read_i16(store, servo_field(channel, SERVO_ZERO_TRIM))? as f32;
        }

        let config = Self { legs, servos };
        if let Err(e) = config.validate() {
            error!("[CONFIG] {e}");
            return Err(e);
        }
        info!("[CONFIG] calibration loaded");
        Ok(config)
    }

    /// Loads like [`load`](Self::load) and reports a failure to `health`.
    ///
    /// An unreadable or corrupt store raises MEMORY, rejected values raise
    /// CALIBRATION. Both are fatal and switch the configurator off.
    pub fn load_monitored<S: ConfigStore, H: HealthMonitor>(
        store: &mut S,
        health: &mut H,
    ) -> Result<Self, ConfigError> {
        Self::load(store).inspect_err(|e| {
            let cause = match e {
                ConfigError::Io(_) | ConfigError::Checksum { .. } => ErrorFlags::MEMORY,
                _ => ErrorFlags::CALIBRATION,
            };
            health.report_error(ErrorFlags::FATAL | cause);
            health.disable(Modules::CONFIGURATOR);
        })
    }

    /// Writes the calibration image and seals the touched pages.
    ///
    /// The image stores one set of lengths, femur/tibia zero rotations and
    /// protection limits shared by all legs; leg 0 provides them.
    pub fn store<S: ConfigStore>(&self, store: &mut S) -> Result<(), ConfigError> {
        self.validate()?;
        let leg = &self.legs[0];
        store.write_bytes(LIMBS_BASE + COXA_LENGTH, &leg.coxa.length.to_le_bytes())?;
        store.write_bytes(LIMBS_BASE + FEMUR_LENGTH, &leg.femur.length.to_le_bytes())?;
        store.write_bytes(LIMBS_BASE + TIBIA_LENGTH, &leg.tibia.length.to_le_bytes())?;
        write_i16(store, LIMBS_BASE + FEMUR_ZERO_ROTATE, leg.femur.zero_rotate)?;
        write_i16(store, LIMBS_BASE + TIBIA_ZERO_ROTATE, leg.tibia.zero_rotate)?;
        write_i16(store, LIMBS_BASE + COXA_PROTECTION_MIN, leg.coxa.min_angle)?;
        write_i16(store, LIMBS_BASE + COXA_PROTECTION_MAX, leg.coxa.max_angle)?;
        write_i16(store, LIMBS_BASE + FEMUR_PROTECTION_MIN, leg.femur.min_angle)?;
        write_i16(store, LIMBS_BASE + FEMUR_PROTECTION_MAX, leg.femur.max_angle)?;
        write_i16(store, LIMBS_BASE + TIBIA_PROTECTION_MIN, leg.tibia.min_angle)?;
        write_i16(store, LIMBS_BASE + TIBIA_PROTECTION_MAX, leg.tibia.max_angle)?;
        for (i, leg) in self.legs.iter().enumerate() {
            write_i16(store, coxa_zero_rotate(i), leg.coxa.zero_rotate)?;
        }

        for (channel, servo) in self.servos.iter().enumerate() {
            let config = if servo.reversed { SERVO_REVERSE_MASK } else { 0 };
            store.write_bytes(servo_field(channel, SERVO_CONFIG), &[config])?;
            write_i16(store, servo_field(channel, SERVO_ZERO_TRIM), libm::roundf(servo.zero_trim) as i16)?;
        }

        for page in 0..PAGE_COUNT {
            seal_page(store, page)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, leg) in self.legs.iter().enumerate() {
            let id = LegId::from(i);
            for kind in JointKind::ALL {
                let joint = leg.joint(kind);
                if joint.length == 0 {
                    return Err(ConfigError::InvalidLength {
                        leg: id,
                        joint: kind,
                        length: joint.length,
                    });
                }
                if joint.min_angle >= joint.max_angle {
                    return Err(ConfigError::InvalidProtection {
                        leg: id,
                        joint: kind,
                        min: joint.min_angle,
                        max: joint.max_angle,
                    });
                }
                if !(-360..=360).contains(&joint.zero_rotate) {
                    return Err(ConfigError::InvalidZeroRotate {
                        leg: id,
                        joint: kind,
                        value: joint.zero_rotate,
                    });
                }
            }
        }
        Ok(())
    }

    /// Legs standing on their neutral positions.
    pub fn build_legs(&self) -> [Leg; LEGS_COUNT] {
        core::array::from_fn(|i| {
            let leg = &self.legs[i];
            Leg::new(
                LegId::from(i),
                V3d::from_array(BASE_POSITIONS[i]),
                leg.coxa.joint(),
                leg.femur.joint(),
                leg.tibia.joint(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::health::SystemMonitor;
    use crate::storage::RamConfigStore;

    #[test]
    fn stored_image_loads_back() {
        let factory = HexapodConfig::default();
        let mut store = RamConfigStore::with_config(&factory).unwrap();
        let loaded = HexapodConfig::load(&mut store).unwrap();
        assert_eq!(loaded, factory);
    }

    #[test]
    fn corrupted_image_is_rejected() {
        let mut store = RamConfigStore::with_config(&HexapodConfig::default()).unwrap();
        store.write_bytes(servo_field(3, SERVO_ZERO_TRIM), &[0x40]).unwrap();
        assert!(matches!(
            HexapodConfig::load(&mut store),
            Err(ConfigError::Checksum { page: 2, .. })
        ));
    }

    #[test]
    fn empty_protection_range_is_fatal() {
        let mut store = RamConfigStore::with_config(&HexapodConfig::default()).unwrap();
        write_i16(&mut store, LIMBS_BASE + FEMUR_PROTECTION_MIN, 70).unwrap();
        seal_page(&mut store, 1).unwrap();
        let err = HexapodConfig::load(&mut store).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidProtection {
                leg: LegId::LeftFront,
                joint: JointKind::Femur,
                min: 70,
                max: 65,
            }
        );
    }

    #[test]
    fn monitored_load_flags_rejected_calibration() {
        let mut store = RamConfigStore::with_config(&HexapodConfig::default()).unwrap();
        write_i16(&mut store, LIMBS_BASE + FEMUR_PROTECTION_MIN, 70).unwrap();
        seal_page(&mut store, 1).unwrap();
        let mut health = SystemMonitor::new();
        assert!(HexapodConfig::load_monitored(&mut store, &mut health).is_err());
        assert_eq!(health.errors(), ErrorFlags::FATAL | ErrorFlags::CALIBRATION);
        assert_eq!(health.disabled_modules(), Modules::CONFIGURATOR);
    }

    #[test]
    fn monitored_load_flags_corrupt_store() {
        let mut store = RamConfigStore::erased();
        let mut health = SystemMonitor::new();
        assert!(HexapodConfig::load_monitored(&mut store, &mut health).is_err());
        assert_eq!(health.errors(), ErrorFlags::FATAL | ErrorFlags::MEMORY);
        assert!(health.is_disabled(Modules::CONFIGURATOR));

        let mut store = RamConfigStore::with_config(&HexapodConfig::default()).unwrap();
        let mut health = SystemMonitor::new();
        assert!(HexapodConfig::load_monitored(&mut store, &mut health).is_ok());
        assert!(health.errors().is_empty());
        assert!(health.disabled_modules().is_empty());
    }

    #[test]
    fn zero_rotate_accepts_a_full_turn_either_way() {
        let mut config = HexapodConfig::default();
        config.legs[0].coxa.zero_rotate = -45;
        config.legs[5].coxa.zero_rotate = -360;
        assert_eq!(config.validate(), Ok(()));

        config.legs[1].coxa.zero_rotate = -361;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidZeroRotate {
                leg: LegId::LeftMiddle,
                joint: JointKind::Coxa,
                value: -361,
            })
        );
    }

    #[test]
    fn zero_length_is_rejected_before_writing() {
        let mut config = HexapodConfig::default();
        config.legs[2].tibia.length = 0;
        let mut store = RamConfigStore::erased();
        assert!(matches!(
            config.store(&mut store),
            Err(ConfigError::InvalidLength { leg: LegId::LeftRear, joint: JointKind::Tibia, .. })
        ));
    }

    #[test]
    fn legs_start_on_base_positions() {
        let legs = HexapodConfig::default().build_legs();
        assert_eq!(legs[4].position, V3d::new(135.0, 0.0, 0.0));
        assert_eq!(legs[3].coxa.zero_rotate, 45.0);
        assert_eq!(legs[3].channel(JointKind::Tibia), 11);
    }
}
