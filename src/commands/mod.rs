//! Command handlers behind the CLI.
//!
//! Each handler takes its collaborators explicitly so the binary can swap the
//! HTTP store for the in-memory one on a dry run.

pub mod seed;
pub mod verify;

use chrono::{DateTime, Utc};
use serde::Serialize;

use std::time::Duration;

use crate::cohort::{
    CohortError, EvaluationContext, ExpectationMatrix, Scenario, ScenarioLedger, ScenarioPlan,
};
use crate::config::{Credentials, ScenarioConfig, DEFAULT_BASE_URL};

/// Clinic and tag used when planning without an environment.
pub const PLAN_CLINIC_ID: &str = "plan-clinic";
pub const PLAN_TAG_ID: &str = "plan-tag";

/// Configuration for a dry run against the in-memory store when the
/// environment carries no credentials. Uses the planning clinic and tag.
pub fn dry_run_config(scale_down: bool) -> ScenarioConfig {
    ScenarioConfig {
        credentials: Credentials::new("dry-run", "", DEFAULT_BASE_URL),
        clinic_id: PLAN_CLINIC_ID.to_string(),
        tag_id: PLAN_TAG_ID.to_string(),
        setup_data: true,
        scale_down,
        summary_wait: Duration::ZERO,
        dashboard_click_wait: Duration::ZERO,
    }
}

/// Scenario selection shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub scenario: Scenario,
    pub scale_down: bool,
    pub ctx: EvaluationContext,
}

impl RunOptions {
    pub fn plan(&self) -> ScenarioPlan {
        let plan = self.scenario.plan();
        if self.scale_down {
            plan.scaled(crate::config::SCALE_DOWN_FACTOR)
        } else {
            plan
        }
    }

    pub fn ledger(
        &self,
        clinic_id: &str,
        tag_id: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<ScenarioLedger, CohortError> {
        self.plan().seed_ledger(clinic_id, tag_id, generated_at)
    }
}

/// What `plan` prints.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub plan: ScenarioPlan,
    pub total_patients: u32,
    pub evaluation: EvaluationContext,
    pub expectations: ExpectationMatrix,
}

/// Generate the scenario offline and compute its expectation matrix.
pub fn plan(options: &RunOptions, generated_at: DateTime<Utc>) -> Result<PlanReport, CohortError> {
    let plan = options.plan();
    let ledger = plan.seed_ledger(PLAN_CLINIC_ID, PLAN_TAG_ID, generated_at)?;
    tracing::info!(
        scenario = %options.scenario,
        patients = ledger.patient_count(),
        "Planned scenario"
    );
    Ok(PlanReport {
        total_patients: plan.total_patients(),
        plan,
        evaluation: options.ctx,
        expectations: ledger.expectation_matrix(&options.ctx),
    })
}
