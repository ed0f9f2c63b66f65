use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid campaign config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unknown row mapping {0}")]
    UnknownRowMapping(String),
    #[error("Invalid config: {0}")]
    InvalidValue(String),
}

/// Data handed back by the execution engine that cannot be classified without
/// skewing the histograms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("All {width} bits of beat {beat} flipped in record at 0x{addr:x}")]
    FullBeatFlip { addr: usize, beat: usize, width: u32 },
    #[error("Burst value has {len} bytes, expected {expected}")]
    MalformedBurst { len: usize, expected: usize },
    #[error("{nr_chips} chips cannot evenly share a 64-bit beat")]
    LaneMismatch { nr_chips: usize },
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}
