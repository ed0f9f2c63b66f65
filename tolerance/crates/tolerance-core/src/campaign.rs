use log::{Level, debug, info, log, warn};
use serde::Serialize;

use crate::classifier::{ErrorClassifier, FlipDecomposition};
use crate::config::CampaignConfig;
use crate::engine::{PayloadPlan, RowErrors};
use crate::error::{CampaignError, ConfigError, InvariantViolation};
use crate::memory::{
    AddressEncoder, ByteRange, RowAddressTranslator, RowMapping, row_mapping_by_name,
};
use crate::stats::{ErrorStats, PerStep, Step};
use crate::util::{ROW_POSITIONS, VICTIM_POSITION};

/// A row of the current triple, before and after mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RowPosition {
    pub logical: usize,
    pub physical: usize,
}

/// What a single call to [`Campaign::record_pass`] observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PassOutcome {
    pub iteration: u64,
    pub step: Step,
    pub victim: RowPosition,
    pub records: usize,
    pub flips: u64,
}

/// Double-sided hammer tolerance campaign.
///
/// Iteration `i` hammers the rows at positions 0 and 2 of the triple selected by
/// `i / iters_per_row` with `((i % iters_per_row) + 1) * read_count_step` reads
/// each and inspects the victim row at position 1. All derived state is a pure
/// function of the iteration counter, which only [`Campaign::record_pass`]
/// advances.
pub struct Campaign {
    config: CampaignConfig,
    translator: RowAddressTranslator,
    classifier: ErrorClassifier,
    stats: ErrorStats,
    passes: PerStep<u64>,
    iteration: u64,
}

impl Campaign {
    /// Set up a campaign using the builtin row mapping named in `config`.
    pub fn new(
        config: CampaignConfig,
        encoder: Box<dyn AddressEncoder>,
    ) -> Result<Self, CampaignError> {
        let mapping = row_mapping_by_name(&config.row_mapping)?;
        Self::with_mapping(config, mapping, encoder)
    }

    pub fn with_mapping(
        config: CampaignConfig,
        mapping: Box<dyn RowMapping>,
        encoder: Box<dyn AddressEncoder>,
    ) -> Result<Self, CampaignError> {
        config.validate()?;
        let classifier = ErrorClassifier::new(config.nr_chips)?;
        let translator = RowAddressTranslator::new(mapping, encoder);
        // every logical row must land on an addressable physical row
        let row_count = translator.row_count();
        if let Some(logical) = (0..config.nr_rows)
            .find(|logical| translator.logical_to_physical(*logical) >= row_count)
        {
            return Err(ConfigError::InvalidValue(format!(
                "{} maps logical row {} to physical row {}, the module has {} rows",
                translator.mapping_name(),
                logical,
                translator.logical_to_physical(logical),
                row_count
            ))
            .into());
        }
        info!(
            "Campaign over {} rows using {}, {} iterations, {} reads per step, {} chips",
            config.nr_rows,
            translator.mapping_name(),
            config.max_iteration,
            config.read_count_step,
            config.nr_chips
        );
        Ok(Campaign {
            config,
            translator,
            classifier,
            stats: ErrorStats::new(),
            passes: PerStep::default(),
            iteration: 0,
        })
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Logical and physical row at `position` of the current triple.
    ///
    /// The modulus shrinks with the position, so the three rows wrap around at
    /// slightly different points near the end of the span.
    pub fn row_for_position(&self, position: usize) -> RowPosition {
        assert!(position < ROW_POSITIONS, "row position {} >= 3", position);
        let base = (self.iteration / self.config.iters_per_row) as usize;
        let logical = (base + position) % (self.config.nr_rows - position);
        RowPosition {
            logical,
            physical: self.translator.logical_to_physical(logical),
        }
    }

    pub fn victim(&self) -> RowPosition {
        self.row_for_position(VICTIM_POSITION)
    }

    pub fn current_step(&self) -> Step {
        ((self.iteration % self.config.iters_per_row) + 1) * self.config.read_count_step
    }

    pub fn payload_plan(&self) -> PayloadPlan {
        let plan = PayloadPlan {
            hammer_rows: [
                self.row_for_position(0).physical,
                self.row_for_position(2).physical,
            ],
            read_count: self.current_step(),
            refresh: false,
        };
        let level = if self.config.verbose {
            Level::Info
        } else {
            Level::Debug
        };
        log!(
            level,
            "Iteration {}: hammering rows {:?} with {} reads, victim {:?}",
            self.iteration,
            plan.hammer_rows,
            plan.read_count,
            self.victim()
        );
        plan
    }

    /// Range to initialize before the pass. Unless `fill_local` is set this is
    /// the whole region; otherwise the span of the three rows in play.
    pub fn fill_range(&self) -> ByteRange {
        if !self.config.fill_local {
            return self.translator.full_range();
        }
        let rows = (0..ROW_POSITIONS)
            .map(|p| self.row_for_position(p).physical)
            .collect::<Vec<_>>();
        self.translator.byte_range_for_rows(&rows)
    }

    /// Only the victim row is inspected. The aggressors are never tested.
    pub fn test_range(&self) -> ByteRange {
        self.translator.byte_range_for_rows(&[self.victim().physical])
    }

    /// Classify the victim row's discrepancies for the current step, then move
    /// on to the next iteration.
    ///
    /// A missing victim row entry is a clean pass. If any record violates an
    /// invariant, nothing is recorded and the iteration does not advance.
    pub fn record_pass(
        &mut self,
        row_errors: &RowErrors,
    ) -> Result<PassOutcome, InvariantViolation> {
        let step = self.current_step();
        let victim = self.victim();
        let records = row_errors
            .get(&victim.physical)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for row in row_errors.keys().filter(|row| **row != victim.physical) {
            debug!(
                "Ignoring discrepancies in row {} (logical {}), not the victim",
                row,
                self.translator.physical_to_logical(*row)
            );
        }
        let decompositions = records
            .iter()
            .map(|r| self.classifier.classify(r))
            .collect::<Result<Vec<FlipDecomposition>, _>>()?;

        let mut flips = 0u64;
        for (record, d) in records.iter().zip(decompositions.iter()) {
            if d.total == 0 {
                warn!(
                    "Ignoring record at 0x{:x} in row {}: observed equals expected",
                    record.addr, victim.physical
                );
                continue;
            }
            self.stats.record(step, d);
            flips += u64::from(d.total);
        }
        if flips > 0 {
            self.stats.record_row_error(step);
            info!(
                "Iteration {}: {} bit flips in victim row {} at {} hammers",
                self.iteration, flips, victim.physical, step
            );
        } else {
            debug!(
                "Iteration {}: victim row {} clean",
                self.iteration, victim.physical
            );
        }
        *self.passes.at_mut(step) += 1;

        let outcome = PassOutcome {
            iteration: self.iteration,
            step,
            victim,
            records: records.len(),
            flips,
        };
        self.iteration += 1;
        Ok(outcome)
    }

    pub fn is_done(&self) -> bool {
        self.iteration >= self.config.max_iteration
    }

    pub fn stats(&self) -> &ErrorStats {
        &self.stats
    }

    /// Passes recorded at `step`, with or without corruption.
    pub fn passes_at(&self, step: Step) -> u64 {
        self.passes.at(step).copied().unwrap_or(0)
    }

    pub fn render_summary(&self) -> String {
        self.stats.render_summary()
    }

    pub fn into_report(self) -> CampaignReport {
        CampaignReport {
            date: chrono::Local::now().to_rfc3339(),
            row_mapping: self.translator.mapping_name(),
            iterations: self.iteration,
            config: self.config,
            stats: self.stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CampaignReport {
    pub date: String,
    pub config: CampaignConfig,
    pub row_mapping: &'static str,
    pub iterations: u64,
    pub stats: ErrorStats,
}
