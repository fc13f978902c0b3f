use std::time::Duration;

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::StatusCode;
use zeroize::Zeroizing;

use crate::cohort::GeneratedBatch;
use crate::config::{Credentials, APP_NAME, APP_VERSION};
use crate::models::{CreatedPatient, SyntheticPatient};

use super::types::*;
use super::TidepoolError;

/// Blocking HTTP client for the Tidepool platform API.
pub struct TidepoolClient {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

/// Authenticated session for one store call.
struct Session {
    base_url: String,
    token: Zeroizing<String>,
}

impl TidepoolClient {
    pub fn new(timeout_secs: u64) -> Result<Self, TidepoolError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TidepoolError::Http(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error, base_url: &str) -> TidepoolError {
        if e.is_connect() {
            TidepoolError::Connection(base_url.to_string())
        } else if e.is_timeout() {
            TidepoolError::Http(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            TidepoolError::Http(e.to_string())
        }
    }

    /// Send and turn any non-success status into `Status`.
    fn send(&self, request: RequestBuilder, base_url: &str) -> Result<Response, TidepoolError> {
        let response = request
            .send()
            .map_err(|e| self.map_send_error(e, base_url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TidepoolError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn login(&self, credentials: &Credentials) -> Result<Session, TidepoolError> {
        let base_url = credentials.base_url.trim_end_matches('/').to_string();
        let request = self
            .client
            .post(format!("{base_url}/auth/login"))
            .basic_auth(&credentials.user_name, Some(credentials.password.as_str()));
        let response = self.send(request, &base_url)?;

        let token = response
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| Zeroizing::new(v.to_string()))
            .ok_or(TidepoolError::MissingSessionToken)?;
        let login: LoginResponse = response
            .json()
            .map_err(|e| TidepoolError::ResponseParsing(e.to_string()))?;

        tracing::debug!(user = %login.userid, "Tidepool session opened");
        Ok(Session { base_url, token })
    }

    fn authed(&self, session: &Session, request: RequestBuilder) -> RequestBuilder {
        request.header(SESSION_TOKEN_HEADER, session.token.as_str())
    }

    fn create_clinic_patient(
        &self,
        session: &Session,
        clinic_id: &str,
        tag_id: &str,
        name: &str,
    ) -> Result<ClinicPatient, TidepoolError> {
        let url = format!("{}/v1/clinics/{clinic_id}/patients", session.base_url);
        let body = CreatePatientRequest {
            full_name: name,
            birth_date: SYNTHETIC_BIRTH_DATE,
            tags: vec![tag_id],
        };
        let request = self.authed(session, self.client.post(url).json(&body));
        self.send(request, &session.base_url)?
            .json()
            .map_err(|e| TidepoolError::ResponseParsing(e.to_string()))
    }

    /// Open a dataset for the patient, post readings in chunks, then close it.
    fn upload_readings(
        &self,
        session: &Session,
        user_id: &str,
        patient: &SyntheticPatient,
    ) -> Result<(), TidepoolError> {
        if patient.readings.is_empty() {
            return Ok(());
        }

        let create = CreateDatasetRequest {
            client: DatasetClient {
                name: APP_NAME,
                version: APP_VERSION,
            },
            data_set_type: "normal",
        };
        let url = format!("{}/v1/users/{user_id}/datasets", session.base_url);
        let request = self.authed(session, self.client.post(url).json(&create));
        let dataset: DatasetEnvelope = self
            .send(request, &session.base_url)?
            .json()
            .map_err(|e| TidepoolError::ResponseParsing(e.to_string()))?;
        let upload_id = dataset.data.upload_id;

        let device_id = format!("{APP_NAME}-{user_id}");
        let data_url = format!("{}/v1/datasets/{upload_id}/data", session.base_url);
        for chunk in patient.readings.chunks(UPLOAD_CHUNK) {
            let data: Vec<CbgDatum<'_>> = chunk
                .iter()
                .map(|r| CbgDatum::from_reading(r, &device_id))
                .collect();
            let request = self.authed(session, self.client.post(&data_url).json(&data));
            self.send(request, &session.base_url)?;
        }

        let url = format!("{}/v1/datasets/{upload_id}", session.base_url);
        let close = CloseDatasetRequest {
            data_state: "closed",
        };
        let request = self.authed(session, self.client.put(url).json(&close));
        self.send(request, &session.base_url)?;

        tracing::debug!(
            patient = %patient.name,
            readings = patient.readings.len(),
            "Uploaded CGM dataset"
        );
        Ok(())
    }

    /// Every patient under the tag, across all list pages.
    fn list_tagged(
        &self,
        session: &Session,
        clinic_id: &str,
        tag_id: &str,
    ) -> Result<Vec<ClinicPatient>, TidepoolError> {
        let url = format!("{}/v1/clinics/{clinic_id}/patients", session.base_url);
        let limit = LIST_PAGE_SIZE.to_string();
        collect_pages(LIST_PAGE_SIZE, |offset| {
            let offset = offset.to_string();
            let request = self.authed(
                session,
                self.client.get(&url).query(&[
                    ("tags", tag_id),
                    ("offset", offset.as_str()),
                    ("limit", limit.as_str()),
                ]),
            );
            let list: ClinicPatientList = self
                .send(request, &session.base_url)?
                .json()
                .map_err(|e| TidepoolError::ResponseParsing(e.to_string()))?;
            Ok(list.data)
        })
    }
}

/// Fetch pages at increasing offsets until one comes back short.
fn collect_pages<T, F>(page_size: usize, mut fetch: F) -> Result<Vec<T>, TidepoolError>
where
    F: FnMut(usize) -> Result<Vec<T>, TidepoolError>,
{
    let mut items = Vec::new();
    loop {
        let page = fetch(items.len())?;
        let short = page.len() < page_size;
        items.extend(page);
        if short {
            return Ok(items);
        }
    }
}

impl PatientStore for TidepoolClient {
    fn create_patients(
        &self,
        credentials: &Credentials,
        batch: &GeneratedBatch,
    ) -> Result<Vec<CreatedPatient>, TidepoolError> {
        let session = self.login(credentials)?;
        let mut created = Vec::with_capacity(batch.patients.len());

        for patient in &batch.patients {
            let remote =
                self.create_clinic_patient(&session, &batch.spec.clinic_id, &batch.spec.tag_id, &patient.name)?;
            self.upload_readings(&session, &remote.id, patient)?;
            created.push(CreatedPatient {
                id: remote.id,
                name: patient.name.clone(),
            });
        }

        tracing::info!(
            clinic = %batch.spec.clinic_id,
            tag = %batch.spec.tag_id,
            created = created.len(),
            "Created Tidepool patients"
        );
        Ok(created)
    }

    fn delete_patients(
        &self,
        credentials: &Credentials,
        clinic_id: &str,
        tag_id: &str,
    ) -> Result<usize, TidepoolError> {
        let session = self.login(credentials)?;
        let patients = self.list_tagged(&session, clinic_id, tag_id)?;
        let mut deleted = 0;

        for patient in &patients {
            let url = format!(
                "{}/v1/clinics/{clinic_id}/patients/{}",
                session.base_url, patient.id
            );
            let request = self.authed(&session, self.client.delete(url));
            match self.send(request, &session.base_url) {
                Ok(_) => deleted += 1,
                Err(TidepoolError::Status { status, .. })
                    if status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    tracing::debug!(patient = %patient.id, "Patient already gone");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(clinic = %clinic_id, tag = %tag_id, deleted, "Deleted tagged patients");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_collected_until_a_short_page() {
        let total = 2 * LIST_PAGE_SIZE + 7;
        let mut offsets = Vec::new();
        let items = collect_pages(LIST_PAGE_SIZE, |offset| {
            offsets.push(offset);
            Ok((offset..total.min(offset + LIST_PAGE_SIZE)).collect::<Vec<_>>())
        })
        .unwrap();
        assert_eq!(items.len(), total);
        assert_eq!(offsets, vec![0, LIST_PAGE_SIZE, 2 * LIST_PAGE_SIZE]);
    }

    #[test]
    fn full_last_page_needs_an_empty_one() {
        let mut calls = 0;
        let items = collect_pages(2, |offset| {
            calls += 1;
            Ok((offset..4.min(offset + 2)).collect::<Vec<usize>>())
        })
        .unwrap();
        assert_eq!(items, vec![0, 1, 2, 3]);
        assert_eq!(calls, 3);
    }

    #[test]
    fn page_error_stops_collection() {
        let err = collect_pages::<usize, _>(2, |offset| {
            if offset == 0 {
                Ok(vec![0, 1])
            } else {
                Err(TidepoolError::Status {
                    status: 500,
                    body: "boom".into(),
                })
            }
        })
        .unwrap_err();
        assert!(matches!(err, TidepoolError::Status { status: 500, .. }));
    }

    #[test]
    fn unreachable_host_is_connection_error() {
        let client = TidepoolClient::new(2).unwrap();
        let credentials = Credentials::new("qa@example.com", "secret", "http://127.0.0.1:1");
        let err = client
            .delete_patients(&credentials, "clinic", "tag")
            .unwrap_err();
        assert!(
            matches!(err, TidepoolError::Connection(ref url) if url == "http://127.0.0.1:1"),
            "got {err}"
        );
    }
}
