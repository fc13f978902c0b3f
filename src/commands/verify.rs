//! Dashboard verification across a scenario's selections.

use std::thread;
use std::time::Duration;

use crate::cohort::{
    CategorizationVerifier, CohortError, DashboardProbe, ExpectationMatrix, ObservedCounts,
};
use crate::models::{DataRecencyFilter, SummarizationPeriod};

/// Accepts a period id (`14d`), label (`14 days`) or the dashboard banner
/// (`Summarizing 14 days of data`).
pub fn parse_period(text: &str) -> Result<SummarizationPeriod, CohortError> {
    SummarizationPeriod::from_summary_banner(text).or_else(|_| text.parse())
}

/// Settle once, then observe and check each selection in order, pausing
/// `click_wait` before each observation.
pub fn verify_checks(
    probe: &dyn DashboardProbe,
    verifier: &CategorizationVerifier,
    matrix: &ExpectationMatrix,
    checks: &[(DataRecencyFilter, SummarizationPeriod)],
    click_wait: Duration,
) -> Result<Vec<ObservedCounts>, CohortError> {
    verifier.wait_until_settled(probe)?;

    let mut observed = Vec::with_capacity(checks.len());
    for (recency, period) in checks {
        if !click_wait.is_zero() {
            thread::sleep(click_wait);
        }
        let counts = probe.observe(*recency, *period)?;
        verifier.check(matrix, &counts)?;
        observed.push(counts);
    }

    tracing::info!(selections = observed.len(), "Dashboard verification passed");
    Ok(observed)
}
