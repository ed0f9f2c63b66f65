mod burst;
mod geometry;
mod row_mapping;
mod translator;

pub use burst::Burst;
pub use geometry::{DramGeometry, MemoryRegion};
pub use row_mapping::{
    RowMapping, TrivialRowMapping, TypeARowMapping, TypeBRowMapping, row_mapping_by_name,
};
pub use translator::{AddressEncoder, ByteRange, RowAddressTranslator, RowBankColEncoder};
