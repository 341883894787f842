//! Configuration store access.
//!
//! The store is a small byte-addressed memory split into 256-byte pages. Each
//! page ends with a checksum; every page must verify before the calibration
//! in it is trusted.
//!
//! - [`memory_map`]: addresses of the calibration fields.
//! - [`loader`]: [`HexapodConfig`] loading, validation and image writing.
pub mod loader;
pub mod memory_map;

pub use loader::{HexapodConfig, JointConfig, LegConfig};

use crate::error::{ConfigError, IoError};
use memory_map::{CHECKSUM_OFFSET, PAGE_COUNT, PAGE_SIZE, STORE_SIZE};

/// Byte-level access to the persistent calibration.
pub trait ConfigStore {
    fn read_bytes(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), IoError>;
    fn write_bytes(&mut self, address: u16, data: &[u8]) -> Result<(), IoError>;
}

/// Store held in RAM, erased to 0xFF.
pub struct RamConfigStore {
    bytes: [u8; STORE_SIZE],
}

impl RamConfigStore {
    pub const fn erased() -> Self {
        Self {
            bytes: [0xFF; STORE_SIZE],
        }
    }

    /// Store pre-loaded with the image of `config`.
    pub fn with_config(config: &HexapodConfig) -> Result<Self, ConfigError> {
        let mut store = Self::erased();
        config.store(&mut store)?;
        Ok(store)
    }

    fn range(&self, address: u16, len: usize) -> Result<core::ops::Range<usize>, IoError> {
        let start = address as usize;
        let end = start + len;
        if end > self.bytes.len() {
            return Err(IoError::OutOfBounds { address, len });
        }
        Ok(start..end)
    }
}

impl ConfigStore for RamConfigStore {
    fn read_bytes(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), IoError> {
        let range = self.range(address, buffer.len())?;
        buffer.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_bytes(&mut self, address: u16, data: &[u8]) -> Result<(), IoError> {
        let range = self.range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

/// Byte sum of everything in `page` before its checksum field.
pub fn page_checksum<S: ConfigStore>(store: &mut S, page: usize) -> Result<u32, IoError> {
    let mut buffer = [0u8; CHECKSUM_OFFSET];
    store.read_bytes(page_address(page), &mut buffer)?;
    Ok(buffer.iter().map(|&b| u32::from(b)).fold(0u32, u32::wrapping_add))
}

pub fn page_address(page: usize) -> u16 {
    (page * PAGE_SIZE) as u16
}

/// Recomputes and stores the checksum of `page`.
pub fn seal_page<S: ConfigStore>(store: &mut S, page: usize) -> Result<(), IoError> {
    let checksum = page_checksum(store, page)?;
    store.write_bytes(page_address(page) + CHECKSUM_OFFSET as u16, &checksum.to_le_bytes())
}

/// Integrity gate: every page must carry a matching checksum.
pub fn verify_integrity<S: ConfigStore>(store: &mut S) -> Result<(), ConfigError> {
    for page in 0..PAGE_COUNT {
        let computed = page_checksum(store, page)?;
        let mut raw = [0u8; 4];
        store.read_bytes(page_address(page) + CHECKSUM_OFFSET as u16, &mut raw)?;
        let stored = u32::from_le_bytes(raw);
        if stored != computed {
            return Err(ConfigError::Checksum { page, stored, computed });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_store_fails_integrity_gate() {
        let mut store = RamConfigStore::erased();
        let err = verify_integrity(&mut store).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Checksum {
                page: 0,
                stored: 0xFFFF_FFFF,
                computed: 0xFF * CHECKSUM_OFFSET as u32,
            }
        );
    }

    #[test]
    fn sealed_pages_verify_until_modified() {
        let mut store = RamConfigStore::erased();
        for page in 0..PAGE_COUNT {
            seal_page(&mut store, page).unwrap();
        }
        verify_integrity(&mut store).unwrap();

        store.write_bytes(0x0105, &[0x12]).unwrap();
        assert!(matches!(
            verify_integrity(&mut store),
            Err(ConfigError::Checksum { page: 1, .. })
        ));
    }

    #[test]
    fn out_of_bounds_access_is_an_io_error() {
        let mut store = RamConfigStore::erased();
        let mut buffer = [0u8; 8];
        assert_eq!(
            store.read_bytes((STORE_SIZE - 4) as u16, &mut buffer),
            Err(IoError::OutOfBounds {
                address: (STORE_SIZE - 4) as u16,
                len: 8,
            })
        );
    }
}
