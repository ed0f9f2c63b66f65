//! # Error statistics
//!
//! Histograms of victim-row corruption, keyed by hammer intensity ("step").
//! Every level is an ordered map that yields a zero/empty value on first
//! access, so recording never has to check for presence and rendering always
//! walks keys in ascending order.
//!
//! Accumulation ([`ErrorStats::record`]) and rendering (the [`Display`] impl)
//! are separate: tests assert on the structures, the harness prints them.
//!
//! [`Display`]: std::fmt::Display

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::classifier::FlipDecomposition;

/// Hammer intensity: the read count applied to each aggressor row.
pub type Step = u64;

/// `value -> occurrences`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Histogram(BTreeMap<u32, u64>);

impl Histogram {
    pub fn record(&mut self, value: u32) {
        *self.0.entry(value).or_insert(0) += 1;
    }
    pub fn get(&self, value: u32) -> u64 {
        self.0.get(&value).copied().unwrap_or(0)
    }
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `chip -> flip count histogram`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChipHistograms(BTreeMap<usize, Histogram>);

impl ChipHistograms {
    pub fn chip_mut(&mut self, chip: usize) -> &mut Histogram {
        self.0.entry(chip).or_default()
    }
    pub fn chip(&self, chip: usize) -> Option<&Histogram> {
        self.0.get(&chip)
    }
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Histogram)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

/// `step -> T`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PerStep<T>(BTreeMap<Step, T>);

impl<T: Default> PerStep<T> {
    pub fn at_mut(&mut self, step: Step) -> &mut T {
        self.0.entry(step).or_default()
    }
}

impl<T> PerStep<T> {
    pub fn at(&self, step: Step) -> Option<&T> {
        self.0.get(&step)
    }
    pub fn iter(&self) -> impl Iterator<Item = (Step, &T)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

impl<T> Default for PerStep<T> {
    fn default() -> Self {
        PerStep(BTreeMap::new())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ErrorStats {
    /// Passes that produced any victim-row corruption.
    pub row_errors: PerStep<u64>,
    /// Individual flipped bits.
    pub bit_errors: PerStep<u64>,
    /// Flips per beat.
    pub beat_errors: PerStep<Histogram>,
    /// Flips per chip over the 8 beats of one read.
    pub chip_errors_per_read: PerStep<ChipHistograms>,
    /// Flips per chip within one beat.
    pub chip_errors_per_beat: PerStep<ChipHistograms>,
    /// Number of chips with at least one flip in a beat.
    pub chips_with_errors_per_beat: PerStep<Histogram>,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record's decomposition into the histograms for `step`.
    pub fn record(&mut self, step: Step, d: &FlipDecomposition) {
        for (beat, flips) in d.per_beat.iter().enumerate() {
            if *flips == 0 {
                continue;
            }
            self.beat_errors.at_mut(step).record(*flips);
            let mut chips_touched = 0;
            for (chip, lanes) in d.per_chip_per_beat.iter().enumerate() {
                let chip_flips = lanes[beat];
                if chip_flips != 0 {
                    self.chip_errors_per_beat
                        .at_mut(step)
                        .chip_mut(chip)
                        .record(chip_flips);
                    chips_touched += 1;
                }
            }
            if chips_touched > 0 {
                self.chips_with_errors_per_beat
                    .at_mut(step)
                    .record(chips_touched);
            }
        }
        for (chip, flips) in d.per_chip_per_read.iter().enumerate() {
            if *flips != 0 {
                self.chip_errors_per_read
                    .at_mut(step)
                    .chip_mut(chip)
                    .record(*flips);
            }
        }
        *self.bit_errors.at_mut(step) += u64::from(d.total);
    }

    /// Count one corrupted pass at `step`.
    pub fn record_row_error(&mut self, step: Step) {
        *self.row_errors.at_mut(step) += 1;
    }

    pub fn row_errors_at(&self, step: Step) -> u64 {
        self.row_errors.at(step).copied().unwrap_or(0)
    }

    pub fn bit_errors_at(&self, step: Step) -> u64 {
        self.bit_errors.at(step).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_errors.0.is_empty() && self.bit_errors.0.is_empty()
    }

    pub fn render_summary(&self) -> String {
        self.to_string()
    }
}

fn fmt_chips(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    per_step: &PerStep<ChipHistograms>,
) -> fmt::Result {
    for (step, chips) in per_step.iter() {
        writeln!(f, "\n{} for {} hammers:", title, step)?;
        for (chip, hist) in chips.iter() {
            writeln!(f, "\tChip {}:", chip)?;
            for (count, n) in hist.iter() {
                writeln!(f, "\t\t{} : {}", count, n)?;
            }
        }
    }
    Ok(())
}

impl fmt::Display for ErrorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Row error summary:\n")?;
        for (step, n) in self.row_errors.iter() {
            writeln!(f, "{} : {}", step, n)?;
        }
        writeln!(f, "\nBit error summary:\n")?;
        for (step, n) in self.bit_errors.iter() {
            writeln!(f, "{} : {}", step, n)?;
        }
        writeln!(f, "\nBeat error summary:\n")?;
        for (step, hist) in self.beat_errors.iter() {
            writeln!(f, "Bit errors/beat histogram for {} hammers:", step)?;
            for (bits, n) in hist.iter() {
                writeln!(f, "\t{} : {}", bits, n)?;
            }
        }
        fmt_chips(
            f,
            "Per-chip bit errors / read command histograms",
            &self.chip_errors_per_read,
        )?;
        fmt_chips(
            f,
            "Per-chip bit errors / beat histograms",
            &self.chip_errors_per_beat,
        )?;
        for (step, hist) in self.chips_with_errors_per_beat.iter() {
            writeln!(f, "Chips w/ errors/beat histogram for {} hammers:", step)?;
            for (chips, n) in hist.iter() {
                writeln!(f, "\t{} : {}", chips, n)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_defaults_to_zero() {
        let mut h = Histogram::default();
        assert_eq!(h.get(3), 0);
        h.record(3);
        h.record(3);
        h.record(1);
        assert_eq!(h.get(3), 2);
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![(1, 1), (3, 2)]);
    }

    #[test]
    fn per_step_creates_on_first_access() {
        let mut s: PerStep<ChipHistograms> = PerStep::default();
        assert!(s.at(100).is_none());
        s.at_mut(100).chip_mut(4).record(2);
        assert_eq!(s.at(100).and_then(|c| c.chip(4)).map(|h| h.get(2)), Some(1));
    }

    #[test]
    fn summary_walks_steps_in_ascending_order() {
        let mut stats = ErrorStats::new();
        stats.record_row_error(300);
        stats.record_row_error(100);
        stats.record_row_error(200);
        let summary = stats.render_summary();
        let p100 = summary.find("100 : 1").unwrap();
        let p200 = summary.find("200 : 1").unwrap();
        let p300 = summary.find("300 : 1").unwrap();
        assert!(p100 < p200 && p200 < p300);
        assert!(summary.starts_with("Row error summary:"));
    }

    #[test]
    fn chips_section_follows_without_blank_line() {
        let classifier = crate::classifier::ErrorClassifier::new(8).unwrap();
        let record = crate::classifier::ErrorRecord::new(
            0,
            crate::memory::Burst::ZERO
                .with_bit_flipped(0)
                .with_bit_flipped(65),
            crate::memory::Burst::ZERO,
        );
        let mut stats = ErrorStats::new();
        stats.record(10, &classifier.classify(&record).unwrap());
        stats.record_row_error(10);
        let summary = stats.render_summary();
        assert!(summary.ends_with(
            "Per-chip bit errors / beat histograms for 10 hammers:\n\tChip 0:\n\t\t1 : 2\n\
             Chips w/ errors/beat histogram for 10 hammers:\n\t1 : 2\n"
        ));
    }

    #[test]
    fn empty_stats_render_headers_only() {
        let stats = ErrorStats::new();
        assert!(stats.is_empty());
        assert_eq!(
            stats.render_summary(),
            "Row error summary:\n\n\nBit error summary:\n\n\nBeat error summary:\n\n"
        );
    }
}
