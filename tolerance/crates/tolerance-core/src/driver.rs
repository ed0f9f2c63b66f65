use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::campaign::Campaign;
use crate::engine::ExecutionEngine;
use crate::error::InvariantViolation;
use crate::util::NamedProgress;

#[derive(Default)]
pub struct DriveOptions {
    /// Stop at the next iteration boundary once this much wall-clock time passed.
    pub timeout: Option<Duration>,
    pub progress: Option<MultiProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Done,
    Timeout,
}

#[derive(Debug, Error)]
pub enum DriveError<EE: std::error::Error> {
    #[error(transparent)]
    EngineFailed(EE),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Run `campaign` to completion against `engine`.
///
/// Each iteration asks the campaign for its plan and ranges, lets the engine
/// carry out the pass and feeds the discrepancies back. An engine error stops
/// the loop before the failed iteration is recorded; the statistics gathered
/// so far stay valid.
pub fn drive<E: ExecutionEngine>(
    campaign: &mut Campaign,
    engine: &mut E,
    options: DriveOptions,
) -> Result<StopReason, DriveError<E::Error>> {
    let start = Instant::now();
    let progress = options.progress.as_ref().map(|p| {
        let p = p.add(ProgressBar::new(campaign.config().max_iteration));
        p.set_style(ProgressStyle::named_bar("Campaign iterations"));
        p.set_position(campaign.iteration());
        p
    });

    let result = run_iterations(campaign, engine, options.timeout, start, progress.as_ref());
    finish_progress(progress, &result);
    let reason = result?;
    info!(
        "Campaign stopped after {} iterations in {:?}",
        campaign.iteration(),
        Instant::now() - start
    );
    Ok(reason)
}

fn run_iterations<E: ExecutionEngine>(
    campaign: &mut Campaign,
    engine: &mut E,
    timeout: Option<Duration>,
    start: Instant,
    progress: Option<&ProgressBar>,
) -> Result<StopReason, DriveError<E::Error>> {
    while !campaign.is_done() {
        if check_timeout(timeout, Instant::now() - start) {
            warn!(
                "Timeout reached after {} of {} iterations. Stopping.",
                campaign.iteration(),
                campaign.config().max_iteration
            );
            return Ok(StopReason::Timeout);
        }
        let plan = campaign.payload_plan();
        let fill = campaign.fill_range();
        let test = campaign.test_range();
        let row_errors = engine
            .execute(&plan, fill, test)
            .map_err(DriveError::EngineFailed)?;
        let outcome = campaign.record_pass(&row_errors)?;
        if let Some(p) = progress {
            p.set_position(outcome.iteration + 1);
            p.set_message(format!("{} hammers", outcome.step));
        }
    }
    Ok(StopReason::Done)
}

/// A failed run leaves the bar at the iteration that failed.
fn finish_progress<T, EE>(progress: Option<ProgressBar>, result: &Result<T, EE>) {
    if let Some(p) = progress {
        match result {
            Ok(_) => p.finish(),
            Err(_) => p.abandon(),
        }
    }
}

fn check_timeout(timeout: Option<Duration>, duration: Duration) -> bool {
    timeout.is_some_and(|timeout| duration > timeout)
}
