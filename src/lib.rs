//! # pero-ocr
//!
//! Send one scanned page to the [PERO OCR](https://pero-ocr.fit.vutbr.cz/)
//! service and store its plain-text and ALTO XML results.
//!
//! The crate does no OCR itself. It resolves the image to upload, drives the
//! service's request/upload/download protocol until the job is processed and
//! writes the two results to disk.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image
//!  │
//!  ├─ 0. Skip     both outputs exist → done, no network
//!  ├─ 1. Input    tif/tiff → sibling .jpg, or convert to JPEG (q=50) in pero_*/
//!  ├─ 2. Submit   POST post_processing_request {engine, images: {name: null}}
//!  ├─ 3. Upload   POST upload_image/{request_id}/{name} (multipart)
//!  ├─ 4. Poll     GET download_results/…/txt until 200, then …/alto
//!  └─ 5. Cleanup  remove the temporary JPEG and its directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pero_ocr::{process_image, JobConfig, JobOutcome, JobPaths};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JobConfig::builder().api_key("my-organisation-key").build()?;
//!     let paths = JobPaths::new("page_0001.tif", "page_0001.txt", "page_0001.xml");
//!     match process_image(&paths, &config).await? {
//!         JobOutcome::AlreadyDone => eprintln!("nothing to do"),
//!         JobOutcome::Completed(stats) => eprintln!("request {}", stats.request_id),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pero-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{JobRequest, OcrService, PeroClient, ProcessingStatus, ResultFormat};
pub use config::{JobConfig, JobConfigBuilder, DEFAULT_SERVER_URL};
pub use error::PeroError;
pub use job::{process_image, process_image_sync, run_job, JobState, Sleeper, TokioSleeper};
pub use output::{JobOutcome, JobPaths, JobStats};
pub use pipeline::input::{content_type_for, resolve_image, ResolvedImage};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProcessingPhase, ProgressCallback};
