//! Remote access to the patients endpoint.
//!
//! `GET /patients[?name=<term>]` returns a bare JSON array of patients and
//! `GET /patients/{id}` a single patient. Every failure (transport, status,
//! body shape) comes back as a [`FetchError`]; no partial results are returned.

pub mod error;

pub use error::{FetchError, Result};

use crate::models::{PatientListResponse, PatientRecord};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Path of the patients collection, relative to the API base URL.
pub const PATIENTS_ENDPOINT: &str = "/patients";

/// Source of patient data. The HTTP client implements it; tests substitute fakes.
#[async_trait]
pub trait PatientApi: Send + Sync {
    /// Lists patients, filtered by name when `term` is present and non-empty.
    async fn fetch_patient_list(&self, term: Option<&str>) -> Result<PatientListResponse>;

    /// Fetches a single patient by identifier.
    async fn fetch_patient_details(&self, id: &str) -> Result<PatientRecord>;
}

/// Builds the list URL. An empty or absent term sends no filter parameter.
pub fn patient_list_url(base_url: &str, term: Option<&str>) -> String {
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), PATIENTS_ENDPOINT);
    if let Some(term) = term.filter(|t| !t.is_empty()) {
        url.push_str("?name=");
        url.push_str(&urlencoding::encode(term));
    }
    url
}

/// Builds the detail URL for a single patient.
pub fn patient_details_url(base_url: &str, id: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        PATIENTS_ENDPOINT,
        urlencoding::encode(id)
    )
}

/// Decodes a list body. The wire shape is a bare array which is wrapped on return.
pub fn decode_patient_list(body: &str) -> Result<PatientListResponse> {
    let patients: Vec<PatientRecord> = serde_json::from_str(body)?;
    Ok(patients.into())
}

/// HTTP implementation of [`PatientApi`].
pub struct HttpPatientApi {
    client: Client,
    base_url: String,
}

impl HttpPatientApi {
    /// Creates a client against `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Issues a GET and returns the body of a 2xx response.
    async fn get_body(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http(status));
        }
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(body)
    }
}

#[async_trait]
impl PatientApi for HttpPatientApi {
    async fn fetch_patient_list(&self, term: Option<&str>) -> Result<PatientListResponse> {
        let url = patient_list_url(&self.base_url, term);
        info!(
            filtered = term.is_some_and(|t| !t.is_empty()),
            "Requesting patient list"
        );
        let body = self.get_body(&url).await?;
        decode_patient_list(&body)
    }

    async fn fetch_patient_details(&self, id: &str) -> Result<PatientRecord> {
        let url = patient_details_url(&self.base_url, id);
        info!("Requesting patient details");
        let body = self.get_body(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8000";

    #[test]
    fn list_url_without_term_has_no_filter() {
        assert_eq!(patient_list_url(BASE, None), "http://localhost:8000/patients");
        assert_eq!(patient_list_url(BASE, Some("")), "http://localhost:8000/patients");
    }

    #[test]
    fn list_url_encodes_term() {
        assert_eq!(
            patient_list_url(BASE, Some("saka")),
            "http://localhost:8000/patients?name=saka"
        );
        assert_eq!(
            patient_list_url(BASE, Some("Bukayo Saka&x=1")),
            "http://localhost:8000/patients?name=Bukayo%20Saka%26x%3D1"
        );
    }

    #[test]
    fn term_case_and_whitespace_are_preserved() {
        assert_eq!(
            patient_list_url(BASE, Some(" sAKa ")),
            "http://localhost:8000/patients?name=%20sAKa%20"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        assert_eq!(
            patient_list_url("http://api.local/", None),
            "http://api.local/patients"
        );
        assert_eq!(
            patient_details_url("http://api.local/", "a/b"),
            "http://api.local/patients/a%2Fb"
        );
    }

    #[test]
    fn decodes_bare_array_into_list_response() {
        let body = r#"[
            {"id": "1", "full_name": "Bukayo Saka", "birth_date": "2001-09-05", "resourceType": "Patient"},
            {"id": "2", "full_name": "Declan Rice", "birth_date": "1999-01-14", "resourceType": "Patient"}
        ]"#;
        let list = decode_patient_list(body).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.patients[1].full_name, "Declan Rice");
    }

    #[test]
    fn wrapped_or_malformed_bodies_are_decode_errors() {
        let wrapped = r#"{"patients": []}"#;
        assert!(matches!(
            decode_patient_list(wrapped),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(
            decode_patient_list("not json"),
            Err(FetchError::Decode(_))
        ));
    }

    /// Serves `response` to a single connection and returns the base URL.
    async fn serve_once(response: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn non_success_status_is_an_http_error() {
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let api = HttpPatientApi::new(base, Duration::from_secs(5)).unwrap();

        let err = api.fetch_patient_list(Some("saka")).await.unwrap_err();
        assert!(
            matches!(err, FetchError::Http { status: 500, .. }),
            "got {err:?}"
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_body_over_the_wire_is_a_decode_error() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot json",
        )
        .await;
        let api = HttpPatientApi::new(base, Duration::from_secs(5)).unwrap();

        let err = api.fetch_patient_list(None).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn detail_body_over_the_wire_decodes() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 87\r\nConnection: close\r\n\r\n{\"id\":\"7\",\"full_name\":\"Bukayo Saka\",\"birth_date\":\"2001-09-05\",\"resourceType\":\"Patient\"}",
        )
        .await;
        let api = HttpPatientApi::new(base, Duration::from_secs(5)).unwrap();

        let record = api.fetch_patient_details("7").await.unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.full_name, "Bukayo Saka");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let api = HttpPatientApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = api.fetch_patient_list(None).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
        assert!(err.is_transient());
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory [`PatientApi`] that records every request.
    ///
    /// Responses are keyed by search term (`None` for the unfiltered list);
    /// unknown terms answer with an empty list.
    #[derive(Default)]
    pub struct FakePatientApi {
        lists: Mutex<HashMap<Option<String>, (Duration, Result<Vec<PatientRecord>>)>>,
        details: Mutex<HashMap<String, PatientRecord>>,
        requests: Mutex<Vec<String>>,
    }

    impl FakePatientApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(
            &self,
            term: Option<&str>,
            latency_ms: u64,
            outcome: Result<Vec<PatientRecord>>,
        ) {
            self.lists.lock().unwrap().insert(
                term.map(str::to_string),
                (Duration::from_millis(latency_ms), outcome),
            );
        }

        pub fn with_detail(&self, record: PatientRecord) {
            self.details.lock().unwrap().insert(record.id.clone(), record);
        }

        /// Request URLs in issue order, relative to the API root.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PatientApi for FakePatientApi {
        async fn fetch_patient_list(&self, term: Option<&str>) -> Result<PatientListResponse> {
            self.requests
                .lock()
                .unwrap()
                .push(patient_list_url("", term));
            let term = term.filter(|t| !t.is_empty()).map(str::to_string);
            let scripted = self.lists.lock().unwrap().get(&term).cloned();
            let (latency, outcome) = scripted.unwrap_or((Duration::ZERO, Ok(Vec::new())));
            tokio::time::sleep(latency).await;
            outcome.map(PatientListResponse::from)
        }

        async fn fetch_patient_details(&self, id: &str) -> Result<PatientRecord> {
            self.requests
                .lock()
                .unwrap()
                .push(patient_details_url("", id));
            self.details
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| FetchError::http(reqwest::StatusCode::NOT_FOUND))
        }
    }
}
