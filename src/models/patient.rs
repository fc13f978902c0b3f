use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::glucose::{CgmReading, READING_INTERVAL_MINUTES};
use crate::cohort::{CategorySet, CohortError};
use crate::config::MAX_PERIOD_LENGTH_DAYS;

/// Where and how stale a batch of synthetic patients should be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetSpec {
    /// Age of the last upload at generation time.
    pub offset_minutes: u32,
    /// Days of readings generated backward from the last upload.
    pub period_length_days: u32,
    pub patient_name_prefix: String,
    pub clinic_id: String,
    pub tag_id: String,
}

impl OffsetSpec {
    pub fn new(
        offset_minutes: u32,
        period_length_days: u32,
        patient_name_prefix: &str,
        clinic_id: &str,
        tag_id: &str,
    ) -> Self {
        Self {
            offset_minutes,
            period_length_days,
            patient_name_prefix: patient_name_prefix.to_string(),
            clinic_id: clinic_id.to_string(),
            tag_id: tag_id.to_string(),
        }
    }

    /// Rejects blank identifiers before anything is generated or uploaded.
    pub fn validate(&self) -> Result<(), CohortError> {
        let fields = [
            ("clinic_id", &self.clinic_id),
            ("tag_id", &self.tag_id),
            ("patient_name_prefix", &self.patient_name_prefix),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(CohortError::MissingConfiguration(name.to_string()));
            }
        }
        if self.period_length_days == 0 {
            return Err(CohortError::SpecConflict(
                "period length must be at least one day".into(),
            ));
        }
        if self.period_length_days > MAX_PERIOD_LENGTH_DAYS {
            return Err(CohortError::SpecConflict(format!(
                "period length of {} days exceeds the {MAX_PERIOD_LENGTH_DAYS}-day maximum",
                self.period_length_days
            )));
        }
        Ok(())
    }
}

/// A generated patient, before upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticPatient {
    pub name: String,
    pub offset: OffsetSpec,
    pub intended: CategorySet,
    /// Time of the most recent reading slot (`generated_at - offset`).
    pub anchor: DateTime<Utc>,
    /// Ascending by time.
    pub readings: Vec<CgmReading>,
}

impl SyntheticPatient {
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.anchor + Duration::minutes(i64::from(self.offset.offset_minutes))
    }

    /// Minutes since the last upload as seen `elapsed_minutes` after generation.
    pub fn staleness_minutes(&self, elapsed_minutes: u32) -> u64 {
        u64::from(self.offset.offset_minutes) + u64::from(elapsed_minutes)
    }

    /// Half-open span `(start, end]` the readings were generated for.
    pub fn sample_span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.anchor - Duration::days(i64::from(self.offset.period_length_days));
        (start, self.anchor)
    }

    pub fn last_reading(&self) -> Option<&CgmReading> {
        self.readings.last()
    }

    /// Wear over the generated span, 0.0 to 1.0.
    pub fn wear_fraction(&self) -> f64 {
        let slots = i64::from(self.offset.period_length_days) * 24 * 60 / READING_INTERVAL_MINUTES;
        if slots == 0 {
            return 0.0;
        }
        self.readings.len() as f64 / slots as f64
    }
}

/// A patient as acknowledged by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPatient {
    pub id: String,
    pub name: String,
}
