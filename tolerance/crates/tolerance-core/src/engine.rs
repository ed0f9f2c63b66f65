//! # Execution engine
//! The campaign never touches memory itself. Every pass is carried out by an
//! execution engine, which fills memory, runs the hammer payload and reads back
//! the tested range.
//!
//! # Traits
//!
//! - `ExecutionEngine`: implemented by anything that can run a [`PayloadPlan`]
//!   against real or simulated DRAM and report the discrepancies it found.
//!
//! # Types
//!
//! - `PayloadPlan`: what to hammer and how hard.
//! - `RowErrors`: discrepancies of one pass, grouped by physical row.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classifier::ErrorRecord;
use crate::memory::ByteRange;

/// Discrepancies found in one pass, keyed by physical row.
pub type RowErrors = BTreeMap<usize, Vec<ErrorRecord>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayloadPlan {
    /// Physical aggressor rows, hammered alternately.
    pub hammer_rows: [usize; 2],
    /// Reads issued to each aggressor row.
    pub read_count: u64,
    /// Whether refresh commands are interleaved with the hammering.
    pub refresh: bool,
}

pub trait ExecutionEngine {
    type Error: std::error::Error;

    /// Fill `fill`, run `plan`, and report every discrepancy inside `test`.
    /// Offsets are relative to the managed region.
    fn execute(
        &mut self,
        plan: &PayloadPlan,
        fill: ByteRange,
        test: ByteRange,
    ) -> Result<RowErrors, Self::Error>;
}
