use serde::{Deserialize, Serialize};

use crate::cohort::GeneratedBatch;
use crate::config::Credentials;
use crate::models::{CgmReading, CreatedPatient};

use super::TidepoolError;

/// Creates and removes tagged clinic patients.
pub trait PatientStore: Send + Sync {
    /// Create every patient in the batch under its clinic and tag, uploading
    /// its readings. Returns them in batch order.
    fn create_patients(
        &self,
        credentials: &Credentials,
        batch: &GeneratedBatch,
    ) -> Result<Vec<CreatedPatient>, TidepoolError>;

    /// Delete every patient carrying `tag_id`. Idempotent: a tag with no
    /// patients deletes 0 and succeeds.
    fn delete_patients(
        &self,
        credentials: &Credentials,
        clinic_id: &str,
        tag_id: &str,
    ) -> Result<usize, TidepoolError>;
}

// ═══════════════════════════════════════════
// Wire format
// ═══════════════════════════════════════════

pub const SESSION_TOKEN_HEADER: &str = "x-tidepool-session-token";

/// Birth date given to every synthetic patient.
pub const SYNTHETIC_BIRTH_DATE: &str = "1990-01-01";

/// Readings per upload request.
pub const UPLOAD_CHUNK: usize = 1000;

/// Patients per clinic list page.
pub const LIST_PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub userid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest<'a> {
    pub full_name: &'a str,
    pub birth_date: &'a str,
    pub tags: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicPatient {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClinicPatientList {
    #[serde(default)]
    pub data: Vec<ClinicPatient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatasetRequest<'a> {
    pub client: DatasetClient<'a>,
    pub data_set_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DatasetClient<'a> {
    pub name: &'a str,
    pub version: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct DatasetEnvelope {
    pub data: DatasetInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub upload_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDatasetRequest<'a> {
    pub data_state: &'a str,
}

/// One continuous glucose datum.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CbgDatum<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub units: &'a str,
    pub value: u16,
    pub time: String,
    pub device_id: &'a str,
}

impl<'a> CbgDatum<'a> {
    pub fn from_reading(reading: &CgmReading, device_id: &'a str) -> Self {
        Self {
            kind: "cbg",
            units: "mg/dL",
            value: reading.value.0,
            time: reading
                .time
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            device_id,
        }
    }
}
