//! Categorization and test-data generation engine.
//!
//! Pipeline: `generator` builds patients per category request, `ledger`
//! accumulates them per tag and derives the expectation matrix through
//! `window` and `metrics`, `verifier` compares dashboard observations with it.

pub mod error;
pub mod generator;
pub mod ledger;
pub mod metrics;
pub mod scenarios;
pub mod traits;
pub mod types;
pub mod verifier;
pub mod window;

#[cfg(test)]
mod scenario_tests;

pub use error::CohortError;
pub use generator::{compose_patient, generate_batch, intended_set};
pub use ledger::ScenarioLedger;
pub use scenarios::{Scenario, ScenarioPlan};
pub use traits::DashboardProbe;
pub use types::*;
pub use verifier::{CategorizationVerifier, StaticDashboard};
