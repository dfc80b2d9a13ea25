//! Progress-callback trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::JobConfigBuilder::progress_callback`] to be told when the
//! request is created, the image uploaded, each poll answered and each
//! output written. The CLI uses it to drive a terminal spinner.
//!
//! # Example
//!
//! ```rust
//! use pero_ocr::{JobConfig, JobProgressCallback, ProcessingPhase};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter(AtomicU32);
//!
//! impl JobProgressCallback for PollCounter {
//!     fn on_poll(&self, _attempt: u32, _phase: ProcessingPhase, _processed: bool) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = JobConfig::builder()
//!     .api_key("secret")
//!     .progress_callback(Arc::new(PollCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::client::ResultFormat;
use std::path::Path;
use std::sync::Arc;

/// Which result the poll loop is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingPhase {
    /// Waiting for the plain-text transcription.
    Text,
    /// Text is done; fetching the ALTO layout.
    Layout,
}

/// Called by [`crate::job::run_job`] as the job advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait JobProgressCallback: Send + Sync {
    /// The service accepted the job and issued a request identifier.
    fn on_submitted(&self, request_id: &str) {
        let _ = request_id;
    }

    /// The image was uploaded under `file_name`.
    fn on_uploaded(&self, file_name: &str) {
        let _ = file_name;
    }

    /// A download attempt returned.
    ///
    /// # Arguments
    /// * `attempt`   — 1-indexed attempt number within `phase`
    /// * `phase`     — which result was requested
    /// * `processed` — whether the service delivered the result
    fn on_poll(&self, attempt: u32, phase: ProcessingPhase, processed: bool) {
        let _ = (attempt, phase, processed);
    }

    /// An output file was written.
    fn on_result_written(&self, format: ResultFormat, path: &Path, bytes: usize) {
        let _ = (format, path, bytes);
    }

    /// Both outputs are on disk and temporary files are gone.
    fn on_complete(&self) {}
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::JobConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        polls: AtomicU32,
        processed: AtomicU32,
        written_bytes: AtomicUsize,
        completes: AtomicU32,
    }

    impl JobProgressCallback for TrackingCallback {
        fn on_poll(&self, _attempt: u32, _phase: ProcessingPhase, processed: bool) {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if processed {
                self.processed.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_result_written(&self, _format: ResultFormat, _path: &Path, bytes: usize) {
            self.written_bytes.fetch_add(bytes, Ordering::SeqCst);
        }

        fn on_complete(&self) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_submitted("abc");
        cb.on_uploaded("page");
        cb.on_poll(1, ProcessingPhase::Text, false);
        cb.on_result_written(ResultFormat::Txt, Path::new("out.txt"), 10);
        cb.on_complete();
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_poll(1, ProcessingPhase::Text, false);
        tracker.on_poll(2, ProcessingPhase::Text, true);
        tracker.on_result_written(ResultFormat::Txt, Path::new("a.txt"), 12);
        tracker.on_poll(1, ProcessingPhase::Layout, true);
        tracker.on_result_written(ResultFormat::Alto, Path::new("a.xml"), 30);
        tracker.on_complete();

        assert_eq!(tracker.polls.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.processed.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.written_bytes.load(Ordering::SeqCst), 42);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_submitted("id");
        cb.on_complete();
    }
}
