use serde::Serialize;

use super::{DramGeometry, MemoryRegion, RowMapping};

/// A byte range relative to the base of the managed memory region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "0x{:x}..0x{:x} [{} KB]",
            self.offset,
            self.end(),
            self.len / 1024
        )
    }
}

/// Encodes a DRAM (bank, row, column) triple into an absolute bus address.
pub trait AddressEncoder {
    fn encode_bus(&self, bank: usize, row: usize, col: usize) -> usize;
    fn region(&self) -> MemoryRegion;
    fn row_bits(&self) -> u32;
}

/// Row-bank-column interleaving: the row occupies the most significant
/// address bits, the column the least significant ones.
#[derive(Clone, Copy, Debug)]
pub struct RowBankColEncoder {
    geometry: DramGeometry,
}

impl RowBankColEncoder {
    pub fn new(geometry: DramGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &DramGeometry {
        &self.geometry
    }
}

impl AddressEncoder for RowBankColEncoder {
    fn encode_bus(&self, bank: usize, row: usize, col: usize) -> usize {
        let g = &self.geometry;
        let word = (row << (g.bankbits + g.colbits)) | (bank << g.colbits) | col;
        g.region.base + word * g.bytes_per_col
    }
    fn region(&self) -> MemoryRegion {
        self.geometry.region
    }
    fn row_bits(&self) -> u32 {
        self.geometry.rowbits
    }
}

/// Logical row to physical row to byte range.
pub struct RowAddressTranslator {
    mapping: Box<dyn RowMapping>,
    encoder: Box<dyn AddressEncoder>,
}

impl RowAddressTranslator {
    pub fn new(mapping: Box<dyn RowMapping>, encoder: Box<dyn AddressEncoder>) -> Self {
        Self { mapping, encoder }
    }

    pub fn logical_to_physical(&self, logical_row: usize) -> usize {
        self.mapping.logical_to_physical(logical_row)
    }

    pub fn physical_to_logical(&self, physical_row: usize) -> usize {
        self.mapping.physical_to_logical(physical_row)
    }

    pub fn mapping_name(&self) -> &'static str {
        self.mapping.name()
    }

    /// Number of addressable rows.
    pub fn row_count(&self) -> usize {
        1 << self.encoder.row_bits()
    }

    /// The whole managed region.
    pub fn full_range(&self) -> ByteRange {
        ByteRange {
            offset: 0,
            len: self.encoder.region().size,
        }
    }

    /// Smallest range covering bank 0, column 0 of `min(rows)` up to the start
    /// of `max(rows) + 1`. Rows that are not addressable map to the end of the
    /// region, so the range never wraps and never leaves the region.
    pub fn byte_range_for_rows(&self, rows: &[usize]) -> ByteRange {
        assert!(!rows.is_empty(), "cannot compute the range of zero rows");
        let region = self.encoder.region();
        let row_start = |row: usize| {
            if row < self.row_count() {
                self.encoder.encode_bus(0, row, 0).min(region.end())
            } else {
                region.end()
            }
        };
        let min_row = rows.iter().copied().min().unwrap_or_default();
        let max_row = rows.iter().copied().max().unwrap_or_default();
        let start = row_start(min_row);
        let end = row_start(max_row.saturating_add(1));
        ByteRange {
            offset: start - region.base,
            len: end - start,
        }
    }
}
