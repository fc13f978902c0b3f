//! Error types for cohort generation and dashboard verification.
//!
//! Separate from TidepoolError so the engine stays usable without the HTTP
//! collaborator.

use std::time::Duration;

use thiserror::Error;

use crate::models::{Category, DataRecencyFilter, SummarizationPeriod};
use crate::tidepool::TidepoolError;

use super::types::ObservedCounts;

#[derive(Error, Debug)]
pub enum CohortError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Unsatisfiable request: {0}")]
    SpecConflict(String),

    #[error(
        "Count mismatch for '{}' under recency {recency} / period {period}: expected {expected}, got {actual}",
        .category.dashboard_title()
    )]
    CountMismatch {
        category: Category,
        expected: u32,
        actual: u32,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
        snapshot: Box<ObservedCounts>,
    },

    #[error("Dashboard did not settle within {waited:?}")]
    NotSettledTimeout { waited: Duration },

    #[error("Unknown {field} label: '{value}'")]
    UnknownLabel { field: String, value: String },

    #[error("No observation recorded for recency {recency} / period {period}")]
    MissingObservation {
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    },

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] TidepoolError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CohortError {
    /// Mismatches and timeouts are test outcomes; everything else is a setup failure.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::CountMismatch { .. } | Self::NotSettledTimeout { .. }
        )
    }
}
