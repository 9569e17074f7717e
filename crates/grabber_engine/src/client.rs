use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use futures_util::StreamExt;
use grabber_core::{JobRecord, VideoMetadata};
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::filename::local_filename;
use crate::persist::AtomicFileWriter;
use crate::{ApiError, FailureKind};

pub const EXTRACT_FALLBACK: &str = "Extraction failed";
pub const START_FALLBACK: &str = "Download failed to start";
pub const FETCH_JOB_FALLBACK: &str = "Download not found";
pub const FILE_FALLBACK: &str = "File not available";

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Service root, e.g. `http://localhost:8000`. Endpoints live under `/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to the request/response calls only; streams stay open.
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Request/response half of the backend contract.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn extract_metadata(&self, url: &str) -> Result<VideoMetadata, ApiError>;

    async fn start_download(&self, url: &str, format_id: &str) -> Result<JobRecord, ApiError>;

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord, ApiError>;

    /// Downloads the finished file of `job_id` into `dir`.
    async fn save_file(
        &self,
        job_id: &str,
        known_filename: Option<&str>,
        dir: &Path,
    ) -> Result<PathBuf, ApiError>;
}

#[derive(Serialize)]
struct ExtractBody<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct StartBody<'a> {
    url: &'a str,
    format_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    settings: BackendSettings,
    base: Url,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, ApiError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            settings,
            base,
            client,
            stream_client,
        })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    /// `api/downloads/{job_id}[/{tail}]`, with the id percent-encoded as one
    /// path segment.
    fn job_endpoint(&self, job_id: &str, tail: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.endpoint("api/downloads")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::new(FailureKind::InvalidUrl, "backend URL cannot hold a path"))?
            .push(job_id)
            .extend(tail);
        Ok(url)
    }

    pub fn job_url(&self, job_id: &str) -> Result<Url, ApiError> {
        self.job_endpoint(job_id, None)
    }

    /// URL of the finished file; the host download action targets this.
    pub fn file_url(&self, job_id: &str) -> Result<Url, ApiError> {
        self.job_endpoint(job_id, Some("file"))
    }

    pub fn progress_url(&self, job_id: &str) -> Result<Url, ApiError> {
        self.job_endpoint(job_id, Some("progress"))
    }

    async fn post_json<B, T>(&self, url: Url, body: &B, fallback: &str) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        engine_debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, fallback))?;
        decode_json(response, fallback).await
    }

    async fn get_json<T>(&self, url: Url, fallback: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        engine_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, fallback))?;
        decode_json(response, fallback).await
    }

    /// Opens the progress event stream of `job_id`.
    pub(crate) async fn open_progress(&self, job_id: &str) -> Result<reqwest::Response, ApiError> {
        let url = self.progress_url(job_id)?;
        engine_debug!("GET {} (stream)", url);
        let response = self
            .stream_client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, "Progress stream unavailable"))?;
        if !response.status().is_success() {
            return Err(error_from_response(response, "Progress stream unavailable").await);
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn extract_metadata(&self, url: &str) -> Result<VideoMetadata, ApiError> {
        self.post_json(
            self.endpoint("api/extract")?,
            &ExtractBody { url },
            EXTRACT_FALLBACK,
        )
        .await
    }

    async fn start_download(&self, url: &str, format_id: &str) -> Result<JobRecord, ApiError> {
        let record: JobRecord = self
            .post_json(
                self.endpoint("api/downloads")?,
                &StartBody { url, format_id },
                START_FALLBACK,
            )
            .await?;
        engine_info!("Started download job {} format={}", record.id, format_id);
        Ok(record)
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord, ApiError> {
        self.get_json(self.job_url(job_id)?, FETCH_JOB_FALLBACK)
            .await
    }

    async fn save_file(
        &self,
        job_id: &str,
        known_filename: Option<&str>,
        dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let url = self.file_url(job_id)?;
        engine_debug!("GET {} (file)", url);
        let response = self
            .stream_client
            .get(url)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, FILE_FALLBACK))?;
        if !response.status().is_success() {
            return Err(error_from_response(response, FILE_FALLBACK).await);
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let filename = local_filename(disposition.as_deref(), known_filename, job_id);

        let writer = AtomicFileWriter::new(dir.to_path_buf());
        let mut pending = writer.begin().map_err(persist_error)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(err, FILE_FALLBACK))?;
            pending.write_chunk(&chunk).map_err(persist_error)?;
        }
        let written = pending.len();
        let path = pending.commit(&filename).map_err(persist_error)?;
        engine_info!("Saved job {} to {:?} ({} bytes)", job_id, path, written);
        Ok(path)
    }
}

fn persist_error(err: crate::PersistError) -> ApiError {
    ApiError::new(FailureKind::Persist, err.to_string())
}

async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    fallback: &str,
) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from_response(response, fallback).await);
    }
    let body = response
        .bytes()
        .await
        .map_err(|err| map_reqwest_error(err, fallback))?;
    serde_json::from_slice(&body).map_err(|err| {
        engine_debug!("Undecodable response body: {}", err);
        ApiError::new(FailureKind::Decode, fallback)
    })
}

async fn error_from_response(response: reqwest::Response, fallback: &str) -> ApiError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    ApiError::new(
        FailureKind::HttpStatus(status.as_u16()),
        error_message(&body, fallback),
    )
}

/// Human-readable message from a backend error body.
///
/// Understands `{"detail": "..."}` and the validation form
/// `{"detail": [{"msg": "..."}, ...]}`. Anything else yields `fallback`.
pub fn error_message(body: &[u8], fallback: &str) -> String {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return fallback.to_string();
    };
    let message = match value.get("detail") {
        Some(serde_json::Value::String(detail)) => detail.trim().to_string(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    };
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn map_reqwest_error(err: reqwest::Error, fallback: &str) -> ApiError {
    engine_debug!("Request failed: {}", err);
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, format!("{fallback}: request timed out"));
    }
    ApiError::new(
        FailureKind::Network,
        format!("{fallback}: backend unreachable"),
    )
}
