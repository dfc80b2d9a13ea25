//! Job inputs/outputs and the atomic writer for result files.

use crate::error::PeroError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The three paths one job works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPaths {
    /// Image to OCR.
    pub image: PathBuf,
    /// Destination of the plain-text result.
    pub output_txt: PathBuf,
    /// Destination of the ALTO XML result.
    pub output_alto: PathBuf,
}

impl JobPaths {
    pub fn new(
        image: impl Into<PathBuf>,
        output_txt: impl Into<PathBuf>,
        output_alto: impl Into<PathBuf>,
    ) -> Self {
        Self {
            image: image.into(),
            output_txt: output_txt.into(),
            output_alto: output_alto.into(),
        }
    }

    /// Both outputs exist already, so the job was done by an earlier run.
    pub fn outputs_exist(&self) -> bool {
        self.output_txt.exists() && self.output_alto.exists()
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// Both outputs were present before the run; nothing was sent.
    AlreadyDone,
    /// The service processed the image and both outputs were written.
    Completed(JobStats),
}

/// Statistics for a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Identifier the service issued for the job.
    pub request_id: String,
    /// Name the image was registered under.
    pub file_name: String,
    /// Whether a temporary JPEG was produced from a TIFF input.
    pub converted: bool,
    /// Download attempts, text and layout together.
    pub polls: u32,
    pub txt_bytes: usize,
    pub alto_bytes: usize,
    pub duration_ms: u64,
}

/// Write `contents` to `path` atomically.
///
/// Writes a sibling temp file and renames it over `path`, so an interrupted
/// run never leaves a truncated output behind for the "already done" check
/// to mistake for a finished one.
pub async fn write_output(path: &Path, contents: &str) -> Result<(), PeroError> {
    let fail = |source| PeroError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let written = match tokio::fs::write(&tmp_path, contents).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(())
}
