//! Layout of the configuration store.
//!
//! Page 0 is reserved for the system block, page 1 holds the leg geometry and
//! page 2 the servo calibration. Multi-byte values are little-endian.

pub const PAGE_SIZE: usize = 256;
pub const PAGE_COUNT: usize = 3;
pub const STORE_SIZE: usize = PAGE_SIZE * PAGE_COUNT;
/// u32 byte sum of the preceding bytes of the page.
pub const CHECKSUM_OFFSET: usize = PAGE_SIZE - 4;

// LEG GEOMETRY (page 1)
pub const LIMBS_BASE: u16 = 0x0100;
pub const COXA_LENGTH: u16 = 0x00; // u16
pub const FEMUR_LENGTH: u16 = 0x02; // u16
pub const TIBIA_LENGTH: u16 = 0x04; // u16
pub const COXA_ZERO_ROTATE: u16 = 0x10; // i16 per leg
pub const FEMUR_ZERO_ROTATE: u16 = 0x1C; // i16
pub const TIBIA_ZERO_ROTATE: u16 = 0x1E; // i16
pub const COXA_PROTECTION_MIN: u16 = 0x50; // i16
pub const COXA_PROTECTION_MAX: u16 = 0x52; // i16
pub const FEMUR_PROTECTION_MIN: u16 = 0x54; // i16
pub const FEMUR_PROTECTION_MAX: u16 = 0x56; // i16
pub const TIBIA_PROTECTION_MIN: u16 = 0x58; // i16
pub const TIBIA_PROTECTION_MAX: u16 = 0x5A; // i16

// SERVO CALIBRATION (page 2)
pub const SERVO_BASE: u16 = 0x0200;
pub const SERVO_BLOCK_SIZE: u16 = 8;
pub const SERVO_CONFIG: u16 = 0x00; // u8
pub const SERVO_ZERO_TRIM: u16 = 0x02; // i16
pub const SERVO_REVERSE_MASK: u8 = 0x01;

pub const fn coxa_zero_rotate(leg: usize) -> u16 {
    LIMBS_BASE + COXA_ZERO_ROTATE + 2 * leg as u16
}

pub const fn servo_field(channel: usize, field: u16) -> u16 {
    SERVO_BASE + SERVO_BLOCK_SIZE * channel as u16 + field
}
