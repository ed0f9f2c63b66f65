use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The managed memory region as seen on the system bus.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: usize,
    pub size: usize,
}

impl MemoryRegion {
    pub fn end(&self) -> usize {
        self.base + self.size
    }
}

/// DRAM module geometry.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DramGeometry {
    pub bankbits: u32,
    pub rowbits: u32,
    pub colbits: u32,
    /// Bytes transferred per column address.
    pub bytes_per_col: usize,
    pub region: MemoryRegion,
}

impl DramGeometry {
    pub fn get_bank_count(&self) -> usize {
        1 << self.bankbits
    }
    pub fn get_row_count(&self) -> usize {
        1 << self.rowbits
    }
    pub fn get_col_count(&self) -> usize {
        1 << self.colbits
    }
    /// Bytes spanned by one row across all banks.
    pub fn row_stride(&self) -> usize {
        (1 << (self.bankbits + self.colbits)) * self.bytes_per_col
    }

    /// Reject geometries that cannot address a single burst.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bytes_per_col == 0 {
            return Err(ConfigError::InvalidValue(
                "bytes_per_col must be greater than 0".into(),
            ));
        }
        let bits = self.bankbits + self.rowbits + self.colbits;
        if bits >= usize::BITS {
            return Err(ConfigError::InvalidValue(format!(
                "{} address bits do not fit a bus address",
                bits
            )));
        }
        Ok(())
    }
}

impl Default for DramGeometry {
    fn default() -> Self {
        // 8 banks, 8k rows, 1024 columns, 16 bytes per column: exactly 1 GiB
        DramGeometry {
            bankbits: 3,
            rowbits: 13,
            colbits: 10,
            bytes_per_col: 16,
            region: MemoryRegion {
                base: 0x4000_0000,
                size: 1 << 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_is_valid() {
        let g = DramGeometry::default();
        assert!(g.validate().is_ok());
        assert_eq!(g.get_row_count() * g.row_stride(), g.region.size);
    }

    #[test]
    fn zero_bytes_per_col_is_rejected() {
        let g: DramGeometry = serde_json::from_str(
            r#"{
                "bankbits": 3,
                "rowbits": 13,
                "colbits": 10,
                "bytes_per_col": 0,
                "region": { "base": 0, "size": 1024 }
            }"#,
        )
        .unwrap();
        let err = g.validate().unwrap_err();
        assert!(err.to_string().contains("bytes_per_col"));
    }

    #[test]
    fn oversized_address_is_rejected() {
        let g = DramGeometry {
            rowbits: 60,
            ..Default::default()
        };
        assert!(matches!(g.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
