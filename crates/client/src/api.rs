//! REST API client for the detection service HTTP endpoints.
//!
//! Wraps job submission, job status, result metadata/events and result
//! asset downloads using [`reqwest`].

use std::path::Path;
use std::time::Duration;

use laneguard_core::params::AnalyzeParams;
use laneguard_core::types::{EventList, JobAccepted, JobState, ResultMeta, TimelineEvent};
use serde::Deserialize;

/// HTTP client for one detection service instance.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("{detail} (HTTP {status})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The service's `detail` text, or the raw body when there is none.
        detail: String,
    },

    /// A successful response lacked a field the client depends on.
    #[error("Response is missing `{0}`")]
    MissingField(&'static str),

    /// Reading a local file for upload failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// `{"ok": true}` from the health endpoint.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    ok: bool,
}

/// FastAPI-style error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Create an API client whose requests time out after `timeout`.
    pub fn with_timeout(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Base HTTP URL, without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<bool, ApiError> {
        let response = self
            .client
            .get(format!("{}/health", self.api_url))
            .send()
            .await?;
        let body: HealthResponse = Self::parse_response(response).await?;
        Ok(body.ok)
    }

    /// Upload a video file from disk and start an analysis job.
    ///
    /// Returns the server-assigned job id.
    pub async fn submit_job(&self, path: &Path, params: &AnalyzeParams) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.mp4".to_string());
        self.submit_job_bytes(&file_name, bytes, params).await
    }

    /// Upload in-memory video bytes and start an analysis job.
    ///
    /// Sends a multipart `POST /api/jobs` carrying the file plus every
    /// detection and lane-of-interest parameter.
    pub async fn submit_job_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        params: &AnalyzeParams,
    ) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(video_mime(file_name))?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (name, value) in params.form_fields() {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(format!("{}/api/jobs", self.api_url))
            .multipart(form)
            .send()
            .await?;

        let accepted: JobAccepted = Self::parse_response(response).await?;
        let job_id = accepted
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::MissingField("job_id"))?;

        tracing::info!(job_id = %job_id, file_name, "Analysis job submitted");
        Ok(job_id)
    }

    /// `GET /api/jobs/{job_id}`.
    pub async fn get_job(&self, job_id: &str) -> Result<JobState, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/jobs/{}", self.api_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /api/results/{result_id}/meta`.
    pub async fn get_result_meta(&self, result_id: &str) -> Result<ResultMeta, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/results/{}/meta", self.api_url, result_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /api/results/{result_id}/events`, unwrapped to the event list
    /// in server order.
    pub async fn get_result_events(&self, result_id: &str) -> Result<Vec<TimelineEvent>, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/results/{}/events", self.api_url, result_id))
            .send()
            .await?;

        let list: EventList = Self::parse_response(response).await?;
        Ok(list.events)
    }

    /// URL of the annotated video for a result.
    pub fn video_url(&self, result_id: &str) -> String {
        format!("{}/api/results/{}/video", self.api_url, result_id)
    }

    /// URL of one event snapshot image.
    pub fn snapshot_url(&self, result_id: &str, snapshot: &str) -> String {
        format!(
            "{}/api/results/{}/snapshots/{}",
            self.api_url, result_id, snapshot
        )
    }

    /// Download the annotated video.
    pub async fn download_video(&self, result_id: &str) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(self.video_url(result_id)).await
    }

    /// Download one event snapshot.
    pub async fn download_snapshot(
        &self,
        result_id: &str,
        snapshot: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(self.snapshot_url(result_id, snapshot)).await
    }

    // ---- private helpers ----

    async fn get_bytes(&self, url: String) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`] carrying
    /// the server's `detail` text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: error_detail(&body, status),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Pull a human-readable message out of an error body.
fn error_detail(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return match parsed.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn video_mime(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
