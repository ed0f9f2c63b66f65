pub use tolerance_core::*;

pub mod engines {
    pub use tolerance_core::engine::*;
    #[cfg(feature = "sim")]
    pub use tolerance_sim::*;
}
