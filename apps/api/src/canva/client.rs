//! HTTP client for the Canva Connect REST API.

use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use indexmap::IndexMap;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::canva::dataset::{DatasetDefinition, DatasetValue};
use crate::canva::polling::{JobError, JobStatus};
use crate::config::CanvaConfig;

const SCOPES: &str = "design:content:read design:content:write design:meta:read \
    brandtemplate:content:read brandtemplate:meta:read asset:read asset:write";

#[derive(Debug, Error)]
pub enum CanvaError {
    #[error("Canva integration is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Canva API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Value,
    },

    #[error("Unexpected Canva response: {0}")]
    Decode(String),
}

impl From<CanvaError> for JobError {
    fn from(e: CanvaError) -> Self {
        JobError::Upstream(e.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    InProgress,
    Success,
    Failed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesignUrls {
    pub edit_url: Option<String>,
    pub view_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedDesign {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub urls: DesignUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutofillResult {
    pub design: CreatedDesign,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutofillJob {
    pub id: String,
    pub status: JobState,
    pub result: Option<AutofillResult>,
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub status: JobState,
    #[serde(default)]
    pub urls: Vec<String>,
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedAsset {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetUploadJob {
    pub id: String,
    pub status: JobState,
    pub asset: Option<UploadedAsset>,
    pub error: Option<Value>,
}

#[derive(Deserialize)]
struct JobEnvelope<T> {
    job: T,
}

#[derive(Deserialize)]
struct DatasetEnvelope {
    #[serde(default)]
    dataset: DatasetDefinition,
}

fn job_status<T>(state: JobState, output: Option<T>, error: Option<Value>) -> JobStatus<T> {
    match (state, output) {
        (JobState::InProgress, _) => JobStatus::InProgress,
        (JobState::Success, Some(output)) => JobStatus::Success(output),
        (JobState::Success, None) => {
            JobStatus::Failed(json!({"message": "job succeeded without a result"}))
        }
        (JobState::Failed, _) => JobStatus::Failed(error.unwrap_or(Value::Null)),
    }
}

impl AutofillJob {
    pub fn status(self) -> JobStatus<CreatedDesign> {
        job_status(self.status, self.result.map(|r| r.design), self.error)
    }
}

impl ExportJob {
    pub fn status(self) -> JobStatus<Vec<String>> {
        let urls = (!self.urls.is_empty()).then_some(self.urls);
        job_status(self.status, urls, self.error)
    }
}

impl AssetUploadJob {
    pub fn status(self) -> JobStatus<String> {
        job_status(self.status, self.asset.map(|a| a.id), self.error)
    }
}

/// PKCE verifier / S256 challenge pair.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = pkce_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Thin wrapper over the REST API; every resource call takes the caller's
/// bearer token.
#[derive(Clone)]
pub struct CanvaClient {
    http: Client,
    config: CanvaConfig,
}

impl CanvaClient {
    pub fn new(config: CanvaConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build Canva HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.client_id.is_empty() && !self.config.client_secret.is_empty()
    }

    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String, CanvaError> {
        if !self.is_configured() {
            return Err(CanvaError::NotConfigured);
        }
        let url = url::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| CanvaError::Decode(format!("invalid authorize URL: {e}")))?;
        Ok(url.into())
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, CanvaError> {
        if !self.is_configured() {
            return Err(CanvaError::NotConfigured);
        }
        let request = self
            .http
            .post(self.endpoint("/oauth/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ]);
        self.send(request).await
    }

    pub async fn brand_template_dataset(
        &self,
        token: &str,
        brand_template_id: &str,
    ) -> Result<DatasetDefinition, CanvaError> {
        let request = self
            .http
            .get(self.endpoint(&format!("/brand-templates/{brand_template_id}/dataset")))
            .bearer_auth(token);
        let envelope: DatasetEnvelope = self.send(request).await?;
        Ok(envelope.dataset)
    }

    pub async fn create_autofill(
        &self,
        token: &str,
        brand_template_id: &str,
        title: &str,
        data: &IndexMap<String, DatasetValue>,
    ) -> Result<AutofillJob, CanvaError> {
        let request = self
            .http
            .post(self.endpoint("/autofills"))
            .bearer_auth(token)
            .json(&json!({
                "brand_template_id": brand_template_id,
                "title": title,
                "data": data,
            }));
        let envelope: JobEnvelope<AutofillJob> = self.send(request).await?;
        Ok(envelope.job)
    }

    pub async fn get_autofill(&self, token: &str, job_id: &str) -> Result<AutofillJob, CanvaError> {
        let request = self
            .http
            .get(self.endpoint(&format!("/autofills/{job_id}")))
            .bearer_auth(token);
        let envelope: JobEnvelope<AutofillJob> = self.send(request).await?;
        Ok(envelope.job)
    }

    pub async fn create_export(&self, token: &str, design_id: &str) -> Result<ExportJob, CanvaError> {
        let request = self
            .http
            .post(self.endpoint("/exports"))
            .bearer_auth(token)
            .json(&json!({
                "design_id": design_id,
                "format": {"type": "pdf"},
            }));
        let envelope: JobEnvelope<ExportJob> = self.send(request).await?;
        Ok(envelope.job)
    }

    pub async fn get_export(&self, token: &str, job_id: &str) -> Result<ExportJob, CanvaError> {
        let request = self
            .http
            .get(self.endpoint(&format!("/exports/{job_id}")))
            .bearer_auth(token);
        let envelope: JobEnvelope<ExportJob> = self.send(request).await?;
        Ok(envelope.job)
    }

    /// Starts an asset upload; the asset name travels base64-encoded in the
    /// metadata header.
    pub async fn create_asset_upload(
        &self,
        token: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetUploadJob, CanvaError> {
        let metadata = json!({ "name_base64": STANDARD.encode(name.as_bytes()) });
        let request = self
            .http
            .post(self.endpoint("/asset-uploads"))
            .bearer_auth(token)
            .header("Asset-Upload-Metadata", metadata.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        let envelope: JobEnvelope<AssetUploadJob> = self.send(request).await?;
        Ok(envelope.job)
    }

    pub async fn get_asset_upload(
        &self,
        token: &str,
        job_id: &str,
    ) -> Result<AssetUploadJob, CanvaError> {
        let request = self
            .http
            .get(self.endpoint(&format!("/asset-uploads/{job_id}")))
            .bearer_auth(token);
        let envelope: JobEnvelope<AssetUploadJob> = self.send(request).await?;
        Ok(envelope.job)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CanvaError> {
        let response = request.send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CanvaError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let details: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
        let message = api_message(&details);
        warn!("Canva API returned {status}: {message}");
        return Err(CanvaError::Api {
            status: status.as_u16(),
            message,
            details,
        });
    }

    debug!("Canva API returned {status} ({} bytes)", body.len());
    serde_json::from_str(&body).map_err(|e| CanvaError::Decode(e.to_string()))
}

/// Canva error bodies look like `{"code": "...", "message": "..."}`.
fn api_message(details: &Value) -> String {
    match details {
        Value::Object(fields) => fields
            .get("message")
            .or_else(|| fields.get("error_description"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| details.to_string()),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => "no error body".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(client_id: &str) -> CanvaClient {
        CanvaClient::new(CanvaConfig {
            client_id: client_id.to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:8080/api/canva/callback".to_string(),
            api_base: "https://api.canva.com/rest/v1/".to_string(),
            authorize_url: "https://www.canva.com/api/oauth/authorize".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_verifier_has_valid_length() {
        let pkce = Pkce::generate();
        assert!((43..=128).contains(&pkce.verifier.len()));
        assert_eq!(pkce.challenge, pkce_challenge(&pkce.verifier));
    }

    #[test]
    fn test_authorize_url_carries_state_and_challenge() {
        let url = client("app-1").authorize_url("signed-state", "chal").unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "app-1");
        assert_eq!(params["state"], "signed-state");
        assert_eq!(params["code_challenge"], "chal");
        assert_eq!(params["code_challenge_method"], "S256");
        assert!(params["scope"].contains("brandtemplate:content:read"));
    }

    #[test]
    fn test_authorize_url_requires_credentials() {
        assert!(matches!(
            client("").authorize_url("s", "c"),
            Err(CanvaError::NotConfigured)
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(
            client("app").endpoint("/autofills"),
            "https://api.canva.com/rest/v1/autofills"
        );
    }

    #[test]
    fn test_autofill_job_status_mapping() {
        let job: JobEnvelope<AutofillJob> = serde_json::from_value(json!({
            "job": {
                "id": "j1",
                "status": "success",
                "result": {
                    "type": "create_design",
                    "design": {
                        "id": "D1",
                        "title": "Bridge proposal",
                        "urls": {"edit_url": "https://canva.example/edit", "view_url": "https://canva.example/view"}
                    }
                }
            }
        }))
        .unwrap();
        match job.job.status() {
            JobStatus::Success(design) => {
                assert_eq!(design.id, "D1");
                assert_eq!(design.urls.edit_url.as_deref(), Some("https://canva.example/edit"));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_failed_and_empty_success_jobs_are_failures() {
        let failed: ExportJob = serde_json::from_value(json!({
            "id": "e1",
            "status": "failed",
            "error": {"code": "license_required", "message": "Premium element"}
        }))
        .unwrap();
        assert_eq!(
            failed.status(),
            JobStatus::Failed(json!({"code": "license_required", "message": "Premium element"}))
        );

        let empty: AssetUploadJob =
            serde_json::from_value(json!({"id": "a1", "status": "success"})).unwrap();
        assert!(matches!(empty.status(), JobStatus::Failed(_)));

        let running: AssetUploadJob =
            serde_json::from_value(json!({"id": "a1", "status": "in_progress"})).unwrap();
        assert_eq!(running.status(), JobStatus::InProgress);
    }

    #[test]
    fn test_api_message_prefers_message_field() {
        assert_eq!(
            api_message(&json!({"code": "not_found", "message": "Brand template missing"})),
            "Brand template missing"
        );
        assert_eq!(api_message(&Value::String(String::new())), "no error body");
    }
}
