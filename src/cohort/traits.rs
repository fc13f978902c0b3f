//! Trait at the dashboard boundary.
//!
//! The verifier never talks to a browser; whatever reads the dashboard
//! (a page driver, a JSON snapshot, the in-memory simulation) implements
//! `DashboardProbe`.

use crate::models::{DataRecencyFilter, SummarizationPeriod};

use super::error::CohortError;
use super::types::ObservedCounts;

/// Reads category counts off the dashboard.
pub trait DashboardProbe {
    /// Whether the upstream summary computation has finished.
    fn is_settled(&self) -> Result<bool, CohortError>;

    /// Per-category counts shown for one recency / period selection.
    /// Categories absent from the result were not observed.
    fn observe(
        &self,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    ) -> Result<ObservedCounts, CohortError>;
}
