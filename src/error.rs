//! Error types for the pero-ocr library.
//!
//! Every failure of a job is fatal: the library returns `Err(PeroError)` and
//! leaves it to the caller (normally the `pero-ocr` binary) to report it and
//! pick an exit status. The only condition that is *not* an error is the
//! service answering "not processed yet" while a result is being polled;
//! that surfaces as [`crate::client::ProcessingStatus::Unprocessed`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pero-ocr library.
#[derive(Debug, Error)]
pub enum PeroError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input image was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// The image extension is not one the service accepts.
    #[error("The extension {extension:?} of '{path}' is not supported.\nSupported: tif, tiff, jpg, jpeg, jp2.")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Decoding the TIFF or encoding the JPEG replacement failed.
    #[error("Failed to convert '{path}' to JPEG: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// The resolved image could not be read for upload.
    #[error("Failed to read image '{path}' for upload: {source}")]
    UploadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Service errors ────────────────────────────────────────────────────
    /// `post_processing_request` answered with an HTTP error.
    #[error("The post processing request ended with status code {status}.")]
    RequestFailed { status: u16 },

    /// `post_processing_request` succeeded at the HTTP level but the body
    /// did not report `"status": "success"`.
    #[error("The post processing request was not accepted (status: {status:?}).")]
    RequestRejected { status: String },

    /// `upload_image` answered with an HTTP error.
    #[error("The image upload of {file_name} ended with status code {status}.")]
    UploadFailed { file_name: String, status: u16 },

    /// `download_results` answered with an HTTP error other than
    /// "not processed yet".
    #[error("The request returned status code {status}. The message is: {message}")]
    DownloadFailed { status: u16, message: String },

    /// The service returned a body that could not be decoded.
    #[error("Unexpected response from '{endpoint}': {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },

    /// The HTTP call itself failed (DNS, TLS, connection reset, timeout).
    #[error("HTTP request to '{endpoint}' failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write one of the output files.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PeroError {
    /// HTTP status code carried by the error, if the service produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PeroError::RequestFailed { status }
            | PeroError::UploadFailed { status, .. }
            | PeroError::DownloadFailed { status, .. } => Some(*status),
            PeroError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display_names_status() {
        let e = PeroError::RequestFailed { status: 401 };
        assert!(e.to_string().contains("401"), "got: {e}");
        assert_eq!(e.status_code(), Some(401));
    }

    #[test]
    fn upload_failed_display() {
        let e = PeroError::UploadFailed {
            file_name: "page_0001".into(),
            status: 413,
        };
        let msg = e.to_string();
        assert!(msg.contains("page_0001"));
        assert!(msg.contains("413"));
    }

    #[test]
    fn download_failed_display_includes_message() {
        let e = PeroError::DownloadFailed {
            status: 500,
            message: "engine crashed".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("engine crashed"));
    }

    #[test]
    fn unsupported_format_names_extension() {
        let e = PeroError::UnsupportedFormat {
            path: PathBuf::from("scan.png"),
            extension: "png".into(),
        };
        assert!(e.to_string().contains("extension \"png\""));
        assert_eq!(e.status_code(), None);
    }
}
