//! Seeding and cleanup of scenario patients.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cohort::{CohortError, ScenarioLedger};
use crate::config::ScenarioConfig;
use crate::models::CreatedPatient;
use crate::tidepool::PatientStore;

use super::RunOptions;

#[derive(Debug, Clone, Serialize)]
pub struct SeedOutcome {
    /// Patients removed from the tag before creating.
    pub cleaned: usize,
    pub created: Vec<CreatedPatient>,
    /// Creation skipped because setup is disabled; expectations still hold
    /// for data seeded by an earlier run.
    pub skipped: bool,
    #[serde(skip)]
    pub ledger: ScenarioLedger,
}

/// Delete every patient under the configured tag.
pub fn cleanup(store: &dyn PatientStore, config: &ScenarioConfig) -> Result<usize, CohortError> {
    let deleted = store.delete_patients(&config.credentials, &config.clinic_id, &config.tag_id)?;
    tracing::info!(tag = %config.tag_id, deleted, "Cleaned up scenario patients");
    Ok(deleted)
}

/// Generate the scenario, clear the tag, and create every batch.
pub fn seed(
    store: &dyn PatientStore,
    config: &ScenarioConfig,
    options: &RunOptions,
    generated_at: DateTime<Utc>,
) -> Result<SeedOutcome, CohortError> {
    let ledger = options.ledger(&config.clinic_id, &config.tag_id, generated_at)?;

    if !config.setup_data {
        tracing::info!(
            scenario = %options.scenario,
            "SETUP_DASHBOARD_DATA is off, skipping patient creation"
        );
        return Ok(SeedOutcome {
            cleaned: 0,
            created: Vec::new(),
            skipped: true,
            ledger,
        });
    }

    let cleaned = cleanup(store, config)?;
    let mut created = Vec::with_capacity(ledger.patient_count());
    for batch in &ledger.batches {
        tracing::info!(
            offset_minutes = batch.spec.offset_minutes,
            prefix = %batch.spec.patient_name_prefix,
            patients = batch.patients.len(),
            "Creating batch"
        );
        created.extend(store.create_patients(&config.credentials, batch)?);
    }

    Ok(SeedOutcome {
        cleaned,
        created,
        skipped: false,
        ledger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{EvaluationContext, Scenario};
    use crate::config::Credentials;
    use crate::tidepool::InMemoryPatientStore;
    use std::time::Duration;

    fn config(setup_data: bool) -> ScenarioConfig {
        ScenarioConfig {
            credentials: Credentials::new("qa@example.com", "pw", "http://localhost"),
            clinic_id: "clinic".into(),
            tag_id: "tag".into(),
            setup_data,
            scale_down: false,
            summary_wait: Duration::ZERO,
            dashboard_click_wait: Duration::ZERO,
        }
    }

    fn options() -> RunOptions {
        RunOptions {
            scenario: Scenario::AllCategories,
            scale_down: false,
            ctx: EvaluationContext::default(),
        }
    }

    #[test]
    fn seed_creates_every_patient() {
        let store = InMemoryPatientStore::new();
        let outcome = seed(&store, &config(true), &options(), Utc::now()).unwrap();
        assert!(!outcome.skipped);
        assert_eq!(outcome.created.len(), 5);
        assert_eq!(store.len(), 5);
        assert_eq!(outcome.ledger.patient_count(), 5);
    }

    #[test]
    fn reseeding_cleans_the_tag_first() {
        let store = InMemoryPatientStore::new();
        seed(&store, &config(true), &options(), Utc::now()).unwrap();
        let second = seed(&store, &config(true), &options(), Utc::now()).unwrap();
        assert_eq!(second.cleaned, 5);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn setup_disabled_skips_creation() {
        let store = InMemoryPatientStore::new();
        let outcome = seed(&store, &config(false), &options(), Utc::now()).unwrap();
        assert!(outcome.skipped);
        assert!(outcome.created.is_empty());
        assert!(store.is_empty());
        assert_eq!(outcome.ledger.patient_count(), 5);
    }

    #[test]
    fn cleanup_twice_is_a_no_op() {
        let store = InMemoryPatientStore::new();
        seed(&store, &config(true), &options(), Utc::now()).unwrap();
        assert_eq!(cleanup(&store, &config(true)).unwrap(), 5);
        assert_eq!(cleanup(&store, &config(true)).unwrap(), 0);
    }
}
