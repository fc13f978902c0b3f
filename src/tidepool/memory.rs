//! In-process patient store and a dashboard simulated over it.
//!
//! Used for dry runs and tests. The simulated dashboard buckets stored
//! patients with the same windowing rules the expectation matrix uses.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::cohort::{
    window, CategoryCounts, CohortError, DashboardProbe, EvaluationContext, GeneratedBatch,
    ObservedCounts,
};
use crate::config::Credentials;
use crate::models::{Category, CreatedPatient, DataRecencyFilter, SummarizationPeriod, SyntheticPatient};

use super::types::PatientStore;
use super::TidepoolError;

#[derive(Debug, Clone)]
pub struct StoredPatient {
    pub id: String,
    pub clinic_id: String,
    pub tag_id: String,
    pub patient: SyntheticPatient,
}

#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    patients: Mutex<Vec<StoredPatient>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored patient count. A poisoned lock is logged and read through,
    /// since the count itself is still meaningful.
    pub fn len(&self) -> usize {
        match self.patients.lock() {
            Ok(patients) => patients.len(),
            Err(poisoned) => {
                tracing::warn!("Patient store lock poisoned, reading count anyway");
                poisoned.into_inner().len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the patients under one clinic and tag.
    pub fn tagged(&self, clinic_id: &str, tag_id: &str) -> Result<Vec<StoredPatient>, TidepoolError> {
        let patients = self.patients.lock().map_err(|_| TidepoolError::LockPoisoned)?;
        Ok(patients
            .iter()
            .filter(|p| p.clinic_id == clinic_id && p.tag_id == tag_id)
            .cloned()
            .collect())
    }
}

impl PatientStore for InMemoryPatientStore {
    fn create_patients(
        &self,
        _credentials: &Credentials,
        batch: &GeneratedBatch,
    ) -> Result<Vec<CreatedPatient>, TidepoolError> {
        let mut patients = self.patients.lock().map_err(|_| TidepoolError::LockPoisoned)?;
        let created: Vec<CreatedPatient> = batch
            .patients
            .iter()
            .map(|patient| {
                let id = Uuid::new_v4().to_string();
                patients.push(StoredPatient {
                    id: id.clone(),
                    clinic_id: batch.spec.clinic_id.clone(),
                    tag_id: batch.spec.tag_id.clone(),
                    patient: patient.clone(),
                });
                CreatedPatient {
                    id,
                    name: patient.name.clone(),
                }
            })
            .collect();
        tracing::debug!(tag = %batch.spec.tag_id, created = created.len(), "Stored patients in memory");
        Ok(created)
    }

    fn delete_patients(
        &self,
        _credentials: &Credentials,
        clinic_id: &str,
        tag_id: &str,
    ) -> Result<usize, TidepoolError> {
        let mut patients = self.patients.lock().map_err(|_| TidepoolError::LockPoisoned)?;
        let before = patients.len();
        patients.retain(|p| !(p.clinic_id == clinic_id && p.tag_id == tag_id));
        Ok(before - patients.len())
    }
}

// ═══════════════════════════════════════════
// SimulatedDashboard
// ═══════════════════════════════════════════

/// Dashboard view of one clinic tag in an `InMemoryPatientStore`.
///
/// Reports "not settled" for the first `settle_after` readiness polls,
/// like a summary job still running.
pub struct SimulatedDashboard<'a> {
    store: &'a InMemoryPatientStore,
    clinic_id: String,
    tag_id: String,
    ctx: EvaluationContext,
    settle_after: u32,
    polls: AtomicU32,
}

impl<'a> SimulatedDashboard<'a> {
    pub fn new(store: &'a InMemoryPatientStore, clinic_id: &str, tag_id: &str) -> Self {
        Self {
            store,
            clinic_id: clinic_id.to_string(),
            tag_id: tag_id.to_string(),
            ctx: EvaluationContext::default(),
            settle_after: 0,
            polls: AtomicU32::new(0),
        }
    }

    pub fn with_context(mut self, ctx: EvaluationContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn settling_after(mut self, polls: u32) -> Self {
        self.settle_after = polls;
        self
    }
}

impl DashboardProbe for SimulatedDashboard<'_> {
    fn is_settled(&self) -> Result<bool, CohortError> {
        let polled = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(polled > self.settle_after)
    }

    fn observe(
        &self,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    ) -> Result<ObservedCounts, CohortError> {
        // every section is shown, empty ones as 0
        let mut counts = CategoryCounts::new();
        for category in Category::ALL {
            counts.set(*category, 0);
        }
        for stored in self.store.tagged(&self.clinic_id, &self.tag_id)? {
            let patient = &stored.patient;
            if !window::patient_visible(patient, recency, &self.ctx) {
                continue;
            }
            for category in window::membership(patient, period, &self.ctx).iter() {
                counts.increment(category);
            }
        }
        Ok(ObservedCounts {
            recency,
            period,
            counts,
        })
    }
}
