//! Categorization verifier: observed dashboard counts against the ledger.
//!
//! Checks only the categories present in an observation, since a page may
//! show a subset of sections. The first discrepancy becomes the error; all of
//! them are logged.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::models::{DataRecencyFilter, SummarizationPeriod};

use super::error::CohortError;
use super::traits::DashboardProbe;
use super::types::{CategoryCounts, Discrepancy, ExpectationMatrix, ObservedCounts, SettlePolicy};

pub struct CategorizationVerifier {
    policy: SettlePolicy,
}

impl CategorizationVerifier {
    pub fn new(policy: SettlePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SettlePolicy {
        self.policy
    }

    /// Categories in `observed` whose count differs from `expected`.
    pub fn discrepancies(expected: &CategoryCounts, observed: &ObservedCounts) -> Vec<Discrepancy> {
        observed
            .counts
            .iter()
            .filter_map(|(category, actual)| {
                let expected = expected.get(category);
                (expected != actual).then_some(Discrepancy {
                    category,
                    expected,
                    actual,
                })
            })
            .collect()
    }

    /// Compare one observation against the matrix.
    pub fn check(
        &self,
        matrix: &ExpectationMatrix,
        observed: &ObservedCounts,
    ) -> Result<(), CohortError> {
        let empty = CategoryCounts::new();
        let expected = matrix
            .counts(observed.recency, observed.period)
            .unwrap_or(&empty);
        let found = Self::discrepancies(expected, observed);

        for d in &found {
            tracing::warn!(
                category = %d.category,
                expected = d.expected,
                actual = d.actual,
                recency = %observed.recency,
                period = %observed.period,
                "Dashboard count mismatch"
            );
        }

        match found.first() {
            None => {
                tracing::info!(
                    recency = %observed.recency,
                    period = %observed.period,
                    categories = observed.counts.iter().count(),
                    "Dashboard counts match"
                );
                Ok(())
            }
            Some(d) => Err(CohortError::CountMismatch {
                category: d.category,
                expected: d.expected,
                actual: d.actual,
                recency: observed.recency,
                period: observed.period,
                snapshot: Box::new(observed.clone()),
            }),
        }
    }

    /// Block until the probe reports the summaries are computed.
    /// Returns how long it waited.
    pub fn wait_until_settled(&self, probe: &dyn DashboardProbe) -> Result<Duration, CohortError> {
        let started = Instant::now();
        match self.policy {
            SettlePolicy::Fixed(wait) => {
                tracing::info!(wait_ms = wait.as_millis() as u64, "Waiting for summary calculation");
                thread::sleep(wait);
                Ok(started.elapsed())
            }
            SettlePolicy::Poll { interval, timeout } => loop {
                if probe.is_settled()? {
                    let waited = started.elapsed();
                    tracing::debug!(waited_ms = waited.as_millis() as u64, "Dashboard settled");
                    return Ok(waited);
                }
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(CohortError::NotSettledTimeout { waited });
                }
                thread::sleep(interval.min(timeout - waited));
            },
        }
    }

    /// Settle, observe one selection, and check it.
    pub fn verify(
        &self,
        probe: &dyn DashboardProbe,
        matrix: &ExpectationMatrix,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    ) -> Result<ObservedCounts, CohortError> {
        self.wait_until_settled(probe)?;
        let observed = probe.observe(recency, period)?;
        self.check(matrix, &observed)?;
        Ok(observed)
    }
}

// ═══════════════════════════════════════════
// Static snapshots
// ═══════════════════════════════════════════

/// A dashboard read from recorded counts. Always settled.
#[derive(Debug, Clone, Default)]
pub struct StaticDashboard {
    snapshots: Vec<ObservedCounts>,
}

impl StaticDashboard {
    pub fn new(snapshots: Vec<ObservedCounts>) -> Self {
        Self { snapshots }
    }

    /// Load a JSON array of observations.
    pub fn from_file(path: &Path) -> Result<Self, CohortError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshots: Vec<ObservedCounts> = serde_json::from_str(&raw)?;
        Ok(Self { snapshots })
    }

    pub fn snapshots(&self) -> &[ObservedCounts] {
        &self.snapshots
    }
}

impl DashboardProbe for StaticDashboard {
    fn is_settled(&self) -> Result<bool, CohortError> {
        Ok(true)
    }

    fn observe(
        &self,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    ) -> Result<ObservedCounts, CohortError> {
        self.snapshots
            .iter()
            .find(|s| s.recency == recency && s.period == period)
            .cloned()
            .ok_or(CohortError::MissingObservation { recency, period })
    }
}
