//! PERO OCR HTTP protocol: three endpoints behind one trait.
//!
//! ```text
//! POST post_processing_request                      JSON job   → {status, request_id}
//! POST upload_image/{request_id}/{file_name}        multipart  → 2xx
//! GET  download_results/{request_id}/{file_name}/{txt|alto}    → body | {message}
//! ```
//!
//! Status handling lives in free functions ([`check_request_response`],
//! [`check_upload_response`], [`classify_download`]) that take a status code
//! and a body, so the rules are shared verbatim by [`PeroClient`] and by any
//! test double implementing [`OcrService`].

use crate::config::JobConfig;
use crate::error::PeroError;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Body, Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the organisation key.
pub const API_KEY_HEADER: &str = "api-key";

/// Substring of the error message the service uses while a job is queued.
pub const NOT_PROCESSED_YET: &str = "not processed yet";

/// Job description posted to `post_processing_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// OCR engine variant.
    pub engine: u32,
    /// Image names mapped to `null`; the service fills them as uploads arrive.
    pub images: BTreeMap<String, Option<String>>,
}

impl JobRequest {
    /// A job for exactly one image.
    pub fn single(engine: u32, file_name: impl Into<String>) -> Self {
        let mut images = BTreeMap::new();
        images.insert(file_name.into(), None);
        Self { engine, images }
    }
}

/// Result formats offered by `download_results`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFormat {
    /// Plain-text transcription.
    Txt,
    /// ALTO XML layout.
    Alto,
}

impl ResultFormat {
    /// Path segment used by the endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            ResultFormat::Txt => "txt",
            ResultFormat::Alto => "alto",
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Service-side state of a job as observed through `download_results`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// The result is ready; carries the response body.
    Processed(String),
    /// Not ready yet; poll again later.
    Unprocessed,
}

#[derive(Deserialize)]
struct RequestResponse {
    status: Option<String>,
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Validate a `post_processing_request` response and extract the request id.
///
/// Any status other than `"success"` is fatal: the service has no endpoint
/// to re-check a pending creation, so waiting would never change the answer.
pub fn check_request_response(status: u16, body: &str) -> Result<String, PeroError> {
    if status >= 400 {
        return Err(PeroError::RequestFailed { status });
    }

    let parsed: RequestResponse =
        serde_json::from_str(body).map_err(|e| PeroError::UnexpectedResponse {
            endpoint: "post_processing_request".into(),
            detail: e.to_string(),
        })?;

    match parsed.status.as_deref() {
        Some("success") => {}
        other => {
            return Err(PeroError::RequestRejected {
                status: other.unwrap_or("<missing>").to_string(),
            })
        }
    }

    parsed
        .request_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PeroError::UnexpectedResponse {
            endpoint: "post_processing_request".into(),
            detail: "response has no request_id".into(),
        })
}

/// Validate an `upload_image` response.
pub fn check_upload_response(status: u16, file_name: &str) -> Result<(), PeroError> {
    if status >= 400 {
        return Err(PeroError::UploadFailed {
            file_name: file_name.to_string(),
            status,
        });
    }
    Ok(())
}

/// Map a `download_results` response onto [`ProcessingStatus`].
///
/// * `200` → [`ProcessingStatus::Processed`] with the body
/// * `>= 400` whose JSON `message` contains "not processed yet" → `Unprocessed`
/// * any other `>= 400` → [`PeroError::DownloadFailed`]
/// * everything else → `Unprocessed`
pub fn classify_download(status: u16, body: &str) -> Result<ProcessingStatus, PeroError> {
    if status == 200 {
        return Ok(ProcessingStatus::Processed(body.to_string()));
    }
    if status < 400 {
        debug!("download_results returned {}, treating as unprocessed", status);
        return Ok(ProcessingStatus::Unprocessed);
    }

    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => err.message,
        Err(_) => {
            return Err(PeroError::DownloadFailed {
                status,
                message: truncate(body, 200),
            })
        }
    };

    if message.contains(NOT_PROCESSED_YET) {
        debug!("download_results {}: {}", status, message);
        Ok(ProcessingStatus::Unprocessed)
    } else {
        Err(PeroError::DownloadFailed { status, message })
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

/// The remote OCR service as seen by the job state machine.
pub trait OcrService {
    /// Create a processing request and return its identifier.
    fn post_processing_request(
        &self,
        job: &JobRequest,
    ) -> impl Future<Output = Result<String, PeroError>>;

    /// Upload the image for `file_name` under `request_id`.
    fn upload_image(
        &self,
        request_id: &str,
        file_name: &str,
        image_path: &Path,
        content_type: &str,
    ) -> impl Future<Output = Result<(), PeroError>>;

    /// Ask for one result format.
    fn download_results(
        &self,
        request_id: &str,
        file_name: &str,
        format: ResultFormat,
    ) -> impl Future<Output = Result<ProcessingStatus, PeroError>>;
}

/// [`OcrService`] backed by the real HTTP API.
///
/// One `reqwest::Client` is reused for every call so the connection pool
/// carries across submit, upload and every poll.
#[derive(Debug, Clone)]
pub struct PeroClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl PeroClient {
    pub fn new(config: &JobConfig) -> Result<Self, PeroError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PeroError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base: config.server_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Join path segments onto the API root, escaping each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, PeroError> {
        endpoint_url(&self.base, segments)
    }
}

pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, PeroError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| PeroError::InvalidConfig(format!("server URL '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn http_err(url: &Url) -> impl FnOnce(reqwest::Error) -> PeroError + '_ {
    move |source| PeroError::Http {
        endpoint: url.to_string(),
        source,
    }
}

impl OcrService for PeroClient {
    async fn post_processing_request(&self, job: &JobRequest) -> Result<String, PeroError> {
        let url = self.endpoint(&["post_processing_request"])?;
        debug!("POST {} engine={} images={:?}", url, job.engine, job.images.keys());

        let response = self
            .http
            .post(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(job)
            .send()
            .await
            .map_err(http_err(&url))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(http_err(&url))?;
        let request_id = check_request_response(status, &body)?;

        info!("Processing request created: {}", request_id);
        Ok(request_id)
    }

    async fn upload_image(
        &self,
        request_id: &str,
        file_name: &str,
        image_path: &Path,
        content_type: &str,
    ) -> Result<(), PeroError> {
        let url = self.endpoint(&["upload_image", request_id, file_name])?;

        let io_err = |source| PeroError::UploadIo {
            path: image_path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(image_path).await.map_err(io_err)?;
        let size = file.metadata().await.map_err(io_err)?.len();

        let part_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());

        // Streamed from disk; the known length keeps the form's Content-Length.
        let part = Part::stream_with_length(Body::from(file), size)
            .file_name(part_name)
            .mime_str(content_type)
            .map_err(http_err(&url))?;
        let form = Form::new().part("file", part);

        debug!("POST {} ({} bytes, {})", url, size, content_type);

        let response = self
            .http
            .post(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(http_err(&url))?;

        check_upload_response(response.status().as_u16(), file_name)?;
        info!("Uploaded {} ({} bytes)", file_name, size);
        Ok(())
    }

    async fn download_results(
        &self,
        request_id: &str,
        file_name: &str,
        format: ResultFormat,
    ) -> Result<ProcessingStatus, PeroError> {
        let url = self.endpoint(&["download_results", request_id, file_name, format.as_str()])?;

        let response = self
            .http
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(http_err(&url))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(http_err(&url))?;
        debug!("GET {} → {} ({} bytes)", url, status, body.len());

        classify_download(status, &body)
    }
}
