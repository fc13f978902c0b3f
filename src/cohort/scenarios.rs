//! Built-in dashboard scenarios.
//!
//! Each scenario is a set of offset batches seeded under one tag plus the
//! recency / period selections that get checked afterward.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::enums::str_enum;
use crate::models::{Category, DataRecencyFilter, OffsetSpec, SummarizationPeriod};

use super::error::CohortError;
use super::generator::generate_batch;
use super::ledger::ScenarioLedger;
use super::types::{CategoryCounts, CategoryRequest};

str_enum!(Scenario {
    SingleOffset => "offset" | "dashboard offset",
    MultiOffset => "scenario1" | "scenario 1",
    AllCategories => "scenario3" | "scenario 3",
    CgmUse24Hours => "scenario4" | "scenario 4",
});

const DAY: u32 = 24 * 60;

/// One `generate_batch` call in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetBatchPlan {
    pub offset_minutes: u32,
    pub period_length_days: u32,
    pub patient_name_prefix: String,
    pub counts: CategoryCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioPlan {
    pub scenario: Scenario,
    pub batches: Vec<OffsetBatchPlan>,
    /// Selections the dashboard is checked under.
    pub checks: Vec<(DataRecencyFilter, SummarizationPeriod)>,
}

fn counts(pairs: &[(Category, u32)]) -> CategoryCounts {
    CategoryCounts::from_pairs(pairs)
}

fn batch(offset_minutes: u32, days: u32, prefix: &str, counts: CategoryCounts) -> OffsetBatchPlan {
    OffsetBatchPlan {
        offset_minutes,
        period_length_days: days,
        patient_name_prefix: prefix.to_string(),
        counts,
    }
}

/// `{b1, b4, drop, tir, wear, mt}` in creation order.
fn six(b1: u32, b4: u32, drop: u32, tir: u32, wear: u32, mt: u32) -> CategoryCounts {
    counts(&[
        (Category::BelowRange1pct, b1),
        (Category::BelowRange4pct, b4),
        (Category::TirDrop15pct, drop),
        (Category::TimeInRangeLow70pct, tir),
        (Category::CgmWearLow70pct, wear),
        (Category::MeetingTargets, mt),
    ])
}

impl Scenario {
    /// Environment variable holding the scenario's tag.
    pub fn tag_key(&self) -> &'static str {
        match self {
            Self::SingleOffset => "TAG_ID",
            Self::MultiOffset => "TAG_SCENARIO1_ID",
            Self::AllCategories => "TAG_SCENARIO3_ID",
            Self::CgmUse24Hours => "TAG_SCENARIO4_ID",
        }
    }

    pub fn plan(&self) -> ScenarioPlan {
        use DataRecencyFilter as R;
        use SummarizationPeriod as P;

        match self {
            Self::SingleOffset => ScenarioPlan {
                scenario: *self,
                batches: vec![batch(
                    DAY,
                    14,
                    "Test Patient Dashboard Offset",
                    six(1, 1, 1, 1, 1, 1),
                )],
                checks: vec![(R::Within2Days, P::Last14Days)],
            },
            Self::MultiOffset => ScenarioPlan {
                scenario: *self,
                batches: vec![
                    batch(0, 14, "Test Patient Offset 0", six(50, 40, 40, 40, 40, 40)),
                    batch(2 * DAY, 14, "Test Patient Offset 2Days", six(40, 0, 0, 0, 0, 0)),
                    batch(7 * DAY, 14, "Test Patient Offset 7Days", six(40, 0, 0, 0, 0, 0)),
                    batch(14 * DAY, 14, "Test Patient Offset 14Days", six(40, 0, 0, 0, 0, 0)),
                ],
                checks: vec![
                    (R::Within2Days, P::Last14Days),
                    (R::Within7Days, P::Last14Days),
                    (R::Within14Days, P::Last14Days),
                    (R::Within30Days, P::Last14Days),
                ],
            },
            Self::AllCategories => ScenarioPlan {
                scenario: *self,
                batches: vec![batch(
                    0,
                    30,
                    "Test Patient Scenario3 AllCategories",
                    six(1, 1, 0, 1, 1, 1),
                )],
                checks: vec![
                    (R::Within24Hours, P::Last7Days),
                    (R::Within24Hours, P::Last14Days),
                    (R::Within24Hours, P::Last30Days),
                ],
            },
            Self::CgmUse24Hours => ScenarioPlan {
                scenario: *self,
                batches: vec![batch(0, 1, "Test Patient Scenario4", six(1, 1, 0, 1, 1, 1))],
                checks: vec![(R::Within24Hours, P::Last24Hours)],
            },
        }
    }
}

impl ScenarioPlan {
    /// Scale every batch's counts, rounding half up.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut plan = self.clone();
        for batch in &mut plan.batches {
            batch.counts = batch.counts.scaled(factor);
        }
        plan
    }

    pub fn total_patients(&self) -> u32 {
        self.batches.iter().map(|b| b.counts.total()).sum()
    }

    /// Generate every batch under `clinic_id` / `tag_id` into a fresh ledger.
    pub fn seed_ledger(
        &self,
        clinic_id: &str,
        tag_id: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<ScenarioLedger, CohortError> {
        let mut ledger = ScenarioLedger::new(tag_id);
        for plan in &self.batches {
            let spec = OffsetSpec::new(
                plan.offset_minutes,
                plan.period_length_days,
                &plan.patient_name_prefix,
                clinic_id,
                tag_id,
            );
            let request = CategoryRequest::independent(plan.counts.clone());
            ledger.record(generate_batch(&spec, &request, generated_at)?)?;
        }
        Ok(ledger)
    }
}
