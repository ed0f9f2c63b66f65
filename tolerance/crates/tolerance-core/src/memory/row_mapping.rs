//! # Row mappings
//!
//! DRAM modules remap the row addresses they receive internally, so rows that are
//! adjacent on the bus are not necessarily adjacent in the cell array. A
//! [`RowMapping`] translates a logical row index (the campaign's view, where
//! `r`, `r + 1`, `r + 2` are physically adjacent) into the row address that has
//! to be put on the bus.
//!
//! Mappings must be total, deterministic and injective over the rows a campaign
//! touches. Three common layouts are built in and selectable by name; anything
//! else can be plugged in by implementing the trait.

use crate::error::ConfigError;

pub trait RowMapping {
    fn logical_to_physical(&self, logical_row: usize) -> usize;
    fn physical_to_logical(&self, physical_row: usize) -> usize;
    fn name(&self) -> &'static str;
}

/// Identity mapping.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrivialRowMapping;

impl RowMapping for TrivialRowMapping {
    fn logical_to_physical(&self, logical_row: usize) -> usize {
        logical_row
    }
    fn physical_to_logical(&self, physical_row: usize) -> usize {
        physical_row
    }
    fn name(&self) -> &'static str {
        "TrivialRowMapping"
    }
}

/// Row address bit 3 is XORed into bits 1 and 2. The mapping is its own inverse.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeARowMapping;

impl TypeARowMapping {
    fn scramble(row: usize) -> usize {
        let bit3 = (row >> 3) & 1;
        row ^ (bit3 << 1) ^ (bit3 << 2)
    }
}

impl RowMapping for TypeARowMapping {
    fn logical_to_physical(&self, logical_row: usize) -> usize {
        Self::scramble(logical_row)
    }
    fn physical_to_logical(&self, physical_row: usize) -> usize {
        Self::scramble(physical_row)
    }
    fn name(&self) -> &'static str {
        "TypeARowMapping"
    }
}

/// Only every second row address is populated.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeBRowMapping;

impl RowMapping for TypeBRowMapping {
    fn logical_to_physical(&self, logical_row: usize) -> usize {
        logical_row * 2
    }
    fn physical_to_logical(&self, physical_row: usize) -> usize {
        physical_row / 2
    }
    fn name(&self) -> &'static str {
        "TypeBRowMapping"
    }
}

/// Look up a builtin mapping by the name used in campaign configurations.
pub fn row_mapping_by_name(name: &str) -> Result<Box<dyn RowMapping>, ConfigError> {
    match name {
        "TrivialRowMapping" | "trivial" => Ok(Box::new(TrivialRowMapping)),
        "TypeARowMapping" | "type_a" => Ok(Box::new(TypeARowMapping)),
        "TypeBRowMapping" | "type_b" => Ok(Box::new(TypeBRowMapping)),
        _ => Err(ConfigError::UnknownRowMapping(name.to_string())),
    }
}
