mod constants;
mod named_progress;

pub use constants::*;
pub use named_progress::NamedProgress;
