//! Configuration for a single OCR job.
//!
//! All job behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. The temporary working directory is part of the
//! config rather than process-global state, so tests can point it at a
//! scratch directory and inspect what the run leaves behind.

use crate::error::PeroError;
use crate::progress::ProgressCallback;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Public PERO OCR API root.
pub const DEFAULT_SERVER_URL: &str = "https://pero-ocr.fit.vutbr.cz/api/";

/// Engine variant requested when none is configured.
pub const DEFAULT_ENGINE: u32 = 1;

/// Configuration for one submit/upload/poll/download run.
///
/// # Example
/// ```rust
/// use pero_ocr::JobConfig;
/// use std::time::Duration;
///
/// let config = JobConfig::builder()
///     .api_key("my-organisation-key")
///     .poll_interval(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.engine, 1);
/// ```
#[derive(Clone)]
pub struct JobConfig {
    /// API root; every endpoint path is appended to it. Default: [`DEFAULT_SERVER_URL`].
    pub server_url: Url,

    /// Organisation key sent in the `api-key` header of every call.
    pub api_key: String,

    /// OCR engine variant placed in the job description. Default: 1.
    pub engine: u32,

    /// Delay between result-download attempts. Default: 5 s.
    pub poll_interval: Duration,

    /// Timeout for each individual HTTP call in seconds. Default: 300.
    ///
    /// Bounds a single stalled connection; it does not bound the poll loop,
    /// which runs until the service reports a result or an error.
    pub request_timeout_secs: u64,

    /// Parent directory for the per-run `pero_*` temporary directory.
    /// If None, uses the system temp directory.
    pub work_dir: Option<PathBuf>,

    /// Optional lifecycle event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_key: String::new(),
            engine: DEFAULT_ENGINE,
            poll_interval: Duration::from_secs(5),
            request_timeout_secs: 300,
            work_dir: None,
            progress_callback: None,
        }
    }
}

fn default_server_url() -> Url {
    // Compile-time constant; parsing cannot fail.
    Url::parse(DEFAULT_SERVER_URL).unwrap_or_else(|_| unreachable!("DEFAULT_SERVER_URL is valid"))
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("server_url", &self.server_url.as_str())
            .field("api_key", &"<redacted>")
            .field("engine", &self.engine)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("work_dir", &self.work_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
            server_url: None,
        }
    }
}

/// Builder for [`JobConfig`].
pub struct JobConfigBuilder {
    config: JobConfig,
    server_url: Option<String>,
}

impl fmt::Debug for JobConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfigBuilder")
            .field("config", &self.config)
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl JobConfigBuilder {
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn engine(mut self, engine: u32) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<JobConfig, PeroError> {
        if let Some(raw) = self.server_url.take() {
            self.config.server_url = parse_server_url(&raw)?;
        }
        if self.config.api_key.trim().is_empty() {
            return Err(PeroError::InvalidConfig("API key must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Parse an API root, normalising it to end with `/`.
fn parse_server_url(raw: &str) -> Result<Url, PeroError> {
    let mut url = Url::parse(raw)
        .map_err(|e| PeroError::InvalidConfig(format!("server URL '{raw}' is invalid: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(PeroError::InvalidConfig(format!(
            "server URL '{raw}' cannot carry endpoint paths"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = JobConfig::builder().api_key("k").build().unwrap();
        assert_eq!(config.server_url.as_str(), DEFAULT_SERVER_URL);
        assert_eq!(config.engine, 1);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.work_dir.is_none());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = JobConfig::builder().api_key("  ").build().unwrap_err();
        assert!(matches!(err, PeroError::InvalidConfig(_)));
    }

    #[test]
    fn server_url_gains_trailing_slash() {
        let config = JobConfig::builder()
            .api_key("k")
            .server_url("http://localhost:8080/api")
            .build()
            .unwrap();
        assert_eq!(config.server_url.as_str(), "http://localhost:8080/api/");
    }

    #[test]
    fn non_base_server_url_is_rejected() {
        let err = JobConfig::builder()
            .api_key("k")
            .server_url("mailto:ocr@example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cannot carry endpoint paths"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = JobConfig::builder().api_key("top-secret").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("top-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
