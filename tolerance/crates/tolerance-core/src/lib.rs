pub mod campaign;
pub mod classifier;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod memory;
pub mod stats;
pub mod util;

pub use campaign::{Campaign, CampaignReport, PassOutcome, RowPosition};
pub use classifier::{ErrorClassifier, ErrorRecord, FlipDecomposition};
pub use config::CampaignConfig;
pub use driver::{DriveError, DriveOptions, StopReason, drive};
pub use engine::{ExecutionEngine, PayloadPlan, RowErrors};
pub use error::{CampaignError, ConfigError, InvariantViolation};
pub use stats::{ErrorStats, Step};
