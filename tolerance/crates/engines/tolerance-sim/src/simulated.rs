use std::collections::BTreeMap;

use log::{debug, trace};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tolerance_core::memory::{AddressEncoder, ByteRange, DramGeometry, RowBankColEncoder};
use tolerance_core::util::{BURST_BITS, BURST_BYTES};
use tolerance_core::{
    ConfigError, ErrorRecord, ExecutionEngine, InvariantViolation, PayloadPlan, RowErrors,
};

fn default_seed() -> u64 {
    0x5eed
}
fn default_weak_cells_per_row() -> usize {
    4
}
fn default_min_threshold() -> u64 {
    20_000
}
fn default_max_threshold() -> u64 {
    200_000
}
fn default_fill_byte() -> u8 {
    0xff
}

/// Parameters of the simulated module. Every key is optional.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Seed of the weak cell layout.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Weak cells in every row.
    #[serde(default = "default_weak_cells_per_row")]
    pub weak_cells_per_row: usize,
    /// Lowest disturbance (reads from adjacent rows) at which a weak cell flips.
    #[serde(default = "default_min_threshold")]
    pub min_threshold: u64,
    /// Highest disturbance threshold.
    #[serde(default = "default_max_threshold")]
    pub max_threshold: u64,
    /// Byte written by every fill.
    #[serde(default = "default_fill_byte")]
    pub fill_byte: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: default_seed(),
            weak_cells_per_row: default_weak_cells_per_row(),
            min_threshold: default_min_threshold(),
            max_threshold: default_max_threshold(),
            fill_byte: default_fill_byte(),
        }
    }
}

/// A cell that flips once its row has been disturbed often enough.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeakCell {
    /// Bank of the cell.
    pub bank: usize,
    /// First column of the burst holding the cell.
    pub col: usize,
    /// Bit within the burst.
    pub bit: usize,
    /// Disturbance needed to flip the cell.
    pub threshold: u64,
}

/// Errors of the simulated engine.
#[derive(Debug, Error)]
pub enum SimError {
    /// Reading memory that was never filled would report garbage.
    #[error("Test range {test} is not inside the filled range {fill}")]
    #[allow(missing_docs)]
    UnfilledTestRange { fill: ByteRange, test: ByteRange },
    /// The geometry or the thresholds cannot be simulated.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A read-back could not be turned into an error record.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Deterministic DRAM model. Every row has a fixed set of weak cells derived
/// from the seed and the row number; a cell flips when the read count of the
/// physically adjacent aggressors reaches its threshold. Rows two apart
/// contribute half their reads.
pub struct SimulatedDram {
    encoder: RowBankColEncoder,
    config: SimulationConfig,
    fill: [u8; BURST_BYTES],
    passes: u64,
}

impl SimulatedDram {
    /// Model a module of the given geometry.
    pub fn new(geometry: DramGeometry, config: SimulationConfig) -> Result<Self, SimError> {
        geometry.validate()?;
        if config.min_threshold > config.max_threshold {
            return Err(ConfigError::InvalidValue(format!(
                "min_threshold {} > max_threshold {}",
                config.min_threshold, config.max_threshold
            ))
            .into());
        }
        Ok(SimulatedDram {
            encoder: RowBankColEncoder::new(geometry),
            fill: [config.fill_byte; BURST_BYTES],
            config,
            passes: 0,
        })
    }

    /// Passes executed so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// The weak cells of `row`. Always the same for the same seed.
    pub fn weak_cells(&self, row: usize) -> Vec<WeakCell> {
        let g = self.encoder.geometry();
        let cols_per_burst = (BURST_BYTES / g.bytes_per_col.max(1)).max(1);
        let bursts_per_bank = (g.get_col_count() / cols_per_burst).max(1);
        let mut rng = StdRng::seed_from_u64(
            self.config.seed ^ (row as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15),
        );
        (0..self.config.weak_cells_per_row)
            .map(|_| WeakCell {
                bank: rng.gen_range(0..g.get_bank_count()),
                col: rng.gen_range(0..bursts_per_bank) * cols_per_burst,
                bit: rng.gen_range(0..BURST_BITS),
                threshold: rng
                    .gen_range(self.config.min_threshold..=self.config.max_threshold),
            })
            .collect()
    }

    fn disturbance(plan: &PayloadPlan, row: usize) -> u64 {
        plan.hammer_rows
            .iter()
            .map(|aggressor| match aggressor.abs_diff(row) {
                1 => plan.read_count,
                2 => plan.read_count / 2,
                _ => 0,
            })
            .sum()
    }
}

impl ExecutionEngine for SimulatedDram {
    type Error = SimError;

    fn execute(
        &mut self,
        plan: &PayloadPlan,
        fill: ByteRange,
        test: ByteRange,
    ) -> Result<RowErrors, SimError> {
        if test.offset < fill.offset || test.end() > fill.end() {
            return Err(SimError::UnfilledTestRange { fill, test });
        }
        self.passes += 1;
        let region = self.encoder.region();
        let stride = self.encoder.geometry().row_stride();
        let first_row = test.offset / stride;
        let last_row = test.end().div_ceil(stride);

        let mut row_errors = RowErrors::new();
        for row in first_row..last_row {
            if plan.hammer_rows.contains(&row) {
                continue;
            }
            let disturbance = Self::disturbance(plan, row);
            if disturbance == 0 {
                continue;
            }
            // read-back contents of every corrupted burst, little-endian
            let mut readback: BTreeMap<usize, [u8; BURST_BYTES]> = BTreeMap::new();
            for cell in self.weak_cells(row) {
                if cell.threshold > disturbance {
                    continue;
                }
                let addr = self.encoder.encode_bus(cell.bank, row, cell.col) - region.base;
                if !test.contains(addr) {
                    continue;
                }
                let bytes = readback.entry(addr).or_insert(self.fill);
                let mask = 1u8 << (cell.bit % 8);
                if bytes[cell.bit / 8] & mask == self.fill[cell.bit / 8] & mask {
                    bytes[cell.bit / 8] ^= mask;
                }
                trace!("Row {} bit {} flipped at 0x{:x}", row, cell.bit, addr);
            }
            if !readback.is_empty() {
                let records = readback
                    .into_iter()
                    .map(|(addr, bytes)| ErrorRecord::from_le_bytes(addr, &bytes, &self.fill))
                    .collect::<Result<Vec<_>, _>>()?;
                debug!("Row {}: {} corrupted bursts", row, records.len());
                row_errors.insert(row, records);
            }
        }
        Ok(row_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tolerance_core::memory::Burst;

    fn plan(hammer_rows: [usize; 2], read_count: u64) -> PayloadPlan {
        PayloadPlan {
            hammer_rows,
            read_count,
            refresh: false,
        }
    }

    fn row_range(row: usize) -> ByteRange {
        let stride = DramGeometry::default().row_stride();
        ByteRange {
            offset: row * stride,
            len: stride,
        }
    }

    fn default_dram() -> SimulatedDram {
        SimulatedDram::new(DramGeometry::default(), SimulationConfig::default()).unwrap()
    }

    fn whole_region() -> ByteRange {
        ByteRange {
            offset: 0,
            len: DramGeometry::default().region.size,
        }
    }

    #[test]
    fn weak_cells_are_deterministic() {
        let a = default_dram();
        let b = default_dram();
        assert_eq!(a.weak_cells(17), b.weak_cells(17));
        assert_ne!(a.weak_cells(17), a.weak_cells(18));
    }

    #[test]
    fn no_flips_below_threshold() {
        let mut dram = default_dram();
        let errors = dram
            .execute(&plan([4, 6], 1_000), whole_region(), row_range(5))
            .unwrap();
        assert!(errors.is_empty());
        assert_eq!(dram.passes(), 1);
    }

    #[test]
    fn every_cell_flips_above_max_threshold() {
        let config = SimulationConfig {
            weak_cells_per_row: 3,
            ..Default::default()
        };
        let mut dram = SimulatedDram::new(DramGeometry::default(), config).unwrap();
        let errors = dram
            .execute(&plan([4, 6], 200_000), whole_region(), row_range(5))
            .unwrap();
        let flips: u32 = errors[&5].iter().map(|r| r.flips().count_ones()).sum();
        let distinct = {
            let mut cells = dram
                .weak_cells(5)
                .into_iter()
                .map(|c| (c.bank, c.col, c.bit))
                .collect::<Vec<_>>();
            cells.sort();
            cells.dedup();
            cells.len() as u32
        };
        assert_eq!(flips, distinct);
        assert!(errors.keys().all(|row| *row == 5));
        assert!(errors[&5].iter().all(|r| r.expected == Burst::ONES));
        assert!(errors[&5].iter().all(|r| r.flips().count_ones() > 0));
    }

    #[test]
    fn test_range_must_be_filled() {
        let mut dram = default_dram();
        let err = dram
            .execute(&plan([4, 6], 1_000), row_range(4), row_range(9))
            .unwrap_err();
        assert!(matches!(err, SimError::UnfilledTestRange { .. }));
        assert_eq!(dram.passes(), 0);
    }

    #[test]
    fn unusable_module_is_rejected() {
        let geometry = DramGeometry {
            bytes_per_col: 0,
            ..Default::default()
        };
        assert!(matches!(
            SimulatedDram::new(geometry, SimulationConfig::default()),
            Err(SimError::Config(ConfigError::InvalidValue(_)))
        ));
        let config = SimulationConfig {
            min_threshold: 10,
            max_threshold: 5,
            ..Default::default()
        };
        assert!(matches!(
            SimulatedDram::new(DramGeometry::default(), config),
            Err(SimError::Config(_))
        ));
    }
}
