//! Every batch generated for one tag, and the counts the dashboard should
//! show for them.
//!
//! A scenario seeds several offsets under the same tag; the dashboard
//! aggregates all of them, so expectations are always computed over the
//! whole ledger rather than per batch.

use serde::{Deserialize, Serialize};

use crate::models::{DataRecencyFilter, SummarizationPeriod, SyntheticPatient};

use super::error::CohortError;
use super::types::{
    CategoryCounts, EvaluationContext, ExpectationCell, ExpectationMatrix, GeneratedBatch,
};
use super::window;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLedger {
    pub tag_id: String,
    pub batches: Vec<GeneratedBatch>,
}

impl ScenarioLedger {
    pub fn new(tag_id: &str) -> Self {
        Self {
            tag_id: tag_id.to_string(),
            batches: Vec::new(),
        }
    }

    /// Add a batch. Batches seeded under another tag are rejected.
    pub fn record(&mut self, batch: GeneratedBatch) -> Result<(), CohortError> {
        if batch.spec.tag_id != self.tag_id {
            return Err(CohortError::SpecConflict(format!(
                "batch tagged '{}' recorded in ledger for '{}'",
                batch.spec.tag_id, self.tag_id
            )));
        }
        tracing::debug!(
            tag = %self.tag_id,
            offset_minutes = batch.spec.offset_minutes,
            patients = batch.patients.len(),
            "Recorded batch"
        );
        self.batches.push(batch);
        Ok(())
    }

    pub fn patients(&self) -> impl Iterator<Item = &SyntheticPatient> {
        self.batches.iter().flat_map(|b| b.patients.iter())
    }

    pub fn patient_count(&self) -> usize {
        self.batches.iter().map(|b| b.patients.len()).sum()
    }

    pub fn patient_names(&self) -> Vec<String> {
        self.patients().map(|p| p.name.clone()).collect()
    }

    /// Forget every batch, mirroring a tag cleanup on the collaborator.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Counts per category for visible patients under one selection.
    pub fn expected_counts(
        &self,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
        ctx: &EvaluationContext,
    ) -> CategoryCounts {
        let mut counts = CategoryCounts::new();
        for patient in self.patients() {
            if !window::patient_visible(patient, recency, ctx) {
                continue;
            }
            for category in window::membership(patient, period, ctx).iter() {
                counts.increment(category);
            }
        }
        counts
    }

    /// Expected counts for all recency / period pairs.
    pub fn expectation_matrix(&self, ctx: &EvaluationContext) -> ExpectationMatrix {
        let mut cells = Vec::with_capacity(DataRecencyFilter::ALL.len() * SummarizationPeriod::ALL.len());
        for recency in DataRecencyFilter::ALL {
            for period in SummarizationPeriod::ALL {
                cells.push(ExpectationCell {
                    recency: *recency,
                    period: *period,
                    counts: self.expected_counts(*recency, *period, ctx),
                });
            }
        }
        ExpectationMatrix { cells }
    }
}
