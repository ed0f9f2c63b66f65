/// Number of beats in one burst transfer.
pub const BEATS: usize = 8;

/// Width of a single beat, i.e. the data bus width.
pub const BEAT_BITS: usize = 64;

pub const BURST_BITS: usize = BEATS * BEAT_BITS;
pub const BURST_BYTES: usize = BURST_BITS / 8;

/// Number of row positions in a double-sided hammer triple.
pub const ROW_POSITIONS: usize = 3;
pub const VICTIM_POSITION: usize = 1;
