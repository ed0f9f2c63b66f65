//! Simulated execution engine.
//!
//! This crate provides a DRAM model that flips bits in rows adjacent to the
//! hammered ones without touching any hardware. It makes the whole campaign
//! pipeline runnable and testable on any machine.
//!
//! Implements the [`tolerance_core::ExecutionEngine`] trait.
//!
//! # Use Cases
//!
//! - Integration testing of campaign control and error classification
//! - Dry runs of a campaign configuration before going to the board

#![warn(missing_docs)]

mod simulated;

pub use simulated::{SimError, SimulatedDram, SimulationConfig, WeakCell};
