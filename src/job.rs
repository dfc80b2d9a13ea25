//! Job orchestration: submit → upload → poll → download → cleanup.
//!
//! The run is an explicit state machine so each transition can be tested
//! against a scripted [`OcrService`] and a [`Sleeper`] that records delays
//! instead of waiting them out.
//!
//! ```text
//!  Submitted ──upload──▶ AwaitingResult ──txt 200──▶ AwaitingLayout ──alto 200──▶ Done
//!                          │    ▲                       │    ▲
//!                          └────┘ not processed yet     └────┘ not processed yet
//!                             (sleep poll_interval)        (sleep poll_interval)
//!
//!  any fatal error ──▶ Failed
//! ```
//!
//! The poll loop has no attempt limit: it ends when the service delivers
//! both results or answers with an error other than "not processed yet".

use crate::client::{JobRequest, OcrService, PeroClient, ProcessingStatus, ResultFormat};
use crate::config::JobConfig;
use crate::error::PeroError;
use crate::output::{write_output, JobOutcome, JobPaths, JobStats};
use crate::pipeline::input::{self, ResolvedImage};
use crate::progress::ProcessingPhase;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Injectable delay between poll attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Where a running job is.
#[derive(Debug)]
pub enum JobState {
    /// The request exists; the image has not been uploaded yet.
    Submitted { request_id: String },
    /// Waiting for the text result.
    AwaitingResult { request_id: String, attempt: u32 },
    /// Text written; waiting for the ALTO result.
    AwaitingLayout { request_id: String, attempt: u32 },
    /// Both outputs written.
    Done,
    /// Terminal failure.
    Failed(PeroError),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }
}

/// Mutable bookkeeping carried across transitions.
struct JobRun<'a, S, C> {
    service: &'a S,
    sleeper: &'a C,
    paths: &'a JobPaths,
    config: &'a JobConfig,
    image: &'a ResolvedImage,
    polls: u32,
    txt_bytes: usize,
    alto_bytes: usize,
}

impl<S: OcrService, C: Sleeper> JobRun<'_, S, C> {
    /// Advance one transition.
    async fn step(&mut self, state: JobState) -> JobState {
        match self.try_step(state).await {
            Ok(next) => next,
            Err(e) => JobState::Failed(e),
        }
    }

    async fn try_step(&mut self, state: JobState) -> Result<JobState, PeroError> {
        match state {
            JobState::Submitted { request_id } => {
                self.service
                    .upload_image(
                        &request_id,
                        &self.image.file_name,
                        &self.image.path,
                        self.image.content_type,
                    )
                    .await?;
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_uploaded(&self.image.file_name);
                }
                Ok(JobState::AwaitingResult {
                    request_id,
                    attempt: 1,
                })
            }

            JobState::AwaitingResult { request_id, attempt } => {
                match self.poll(&request_id, ResultFormat::Txt, attempt).await? {
                    ProcessingStatus::Processed(body) => {
                        self.txt_bytes = self.save(ResultFormat::Txt, &body).await?;
                        Ok(JobState::AwaitingLayout {
                            request_id,
                            attempt: 1,
                        })
                    }
                    ProcessingStatus::Unprocessed => {
                        self.sleeper.sleep(self.config.poll_interval).await;
                        Ok(JobState::AwaitingResult {
                            request_id,
                            attempt: attempt + 1,
                        })
                    }
                }
            }

            JobState::AwaitingLayout { request_id, attempt } => {
                match self.poll(&request_id, ResultFormat::Alto, attempt).await? {
                    ProcessingStatus::Processed(body) => {
                        self.alto_bytes = self.save(ResultFormat::Alto, &body).await?;
                        Ok(JobState::Done)
                    }
                    ProcessingStatus::Unprocessed => {
                        warn!(
                            "Text for {} is ready but ALTO is not; retrying",
                            self.image.file_name
                        );
                        self.sleeper.sleep(self.config.poll_interval).await;
                        Ok(JobState::AwaitingLayout {
                            request_id,
                            attempt: attempt + 1,
                        })
                    }
                }
            }

            terminal @ (JobState::Done | JobState::Failed(_)) => Ok(terminal),
        }
    }

    async fn poll(
        &mut self,
        request_id: &str,
        format: ResultFormat,
        attempt: u32,
    ) -> Result<ProcessingStatus, PeroError> {
        self.polls += 1;
        let status = self
            .service
            .download_results(request_id, &self.image.file_name, format)
            .await?;

        let processed = matches!(status, ProcessingStatus::Processed(_));
        debug!(
            "Poll {} for {} ({}): {}",
            attempt,
            self.image.file_name,
            format,
            if processed { "processed" } else { "unprocessed" }
        );
        if let Some(ref cb) = self.config.progress_callback {
            let phase = match format {
                ResultFormat::Txt => ProcessingPhase::Text,
                ResultFormat::Alto => ProcessingPhase::Layout,
            };
            cb.on_poll(attempt, phase, processed);
        }
        Ok(status)
    }

    async fn save(&self, format: ResultFormat, body: &str) -> Result<usize, PeroError> {
        let path = match format {
            ResultFormat::Txt => &self.paths.output_txt,
            ResultFormat::Alto => &self.paths.output_alto,
        };
        write_output(path, body).await?;
        info!("Wrote {} result to {} ({} bytes)", format, path.display(), body.len());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_result_written(format, path, body.len());
        }
        Ok(body.len())
    }
}

/// Run one job against `service`, waiting between polls with `sleeper`.
///
/// Returns [`JobOutcome::AlreadyDone`] without any service call when both
/// outputs already exist. On failure the temporary conversion directory is
/// removed when the resolved image is dropped.
pub async fn run_job<S: OcrService, C: Sleeper>(
    service: &S,
    sleeper: &C,
    paths: &JobPaths,
    config: &JobConfig,
) -> Result<JobOutcome, PeroError> {
    let start = Instant::now();

    if paths.outputs_exist() {
        info!(
            "Outputs {} and {} already exist; nothing to do",
            paths.output_txt.display(),
            paths.output_alto.display()
        );
        return Ok(JobOutcome::AlreadyDone);
    }

    let image = input::resolve_image(&paths.image, config.work_dir.as_deref()).await?;
    info!(
        "Submitting {} as '{}' ({})",
        image.path.display(),
        image.file_name,
        image.content_type
    );

    let job = JobRequest::single(config.engine, image.file_name.clone());
    let request_id = service.post_processing_request(&job).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_submitted(&request_id);
    }

    let mut run = JobRun {
        service,
        sleeper,
        paths,
        config,
        image: &image,
        polls: 0,
        txt_bytes: 0,
        alto_bytes: 0,
    };

    let mut state = JobState::Submitted {
        request_id: request_id.clone(),
    };
    while !state.is_terminal() {
        state = run.step(state).await;
    }

    if let JobState::Failed(e) = state {
        return Err(e);
    }

    let stats = JobStats {
        request_id,
        file_name: image.file_name.clone(),
        converted: image.is_converted(),
        polls: run.polls,
        txt_bytes: run.txt_bytes,
        alto_bytes: run.alto_bytes,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    image.cleanup()?;

    info!(
        "Job {} complete: {} polls, {}ms",
        stats.request_id, stats.polls, stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_complete();
    }

    Ok(JobOutcome::Completed(stats))
}

/// Run one job against the real service.
pub async fn process_image(paths: &JobPaths, config: &JobConfig) -> Result<JobOutcome, PeroError> {
    let client = PeroClient::new(config)?;
    run_job(&client, &TokioSleeper, paths, config).await
}

/// Synchronous wrapper around [`process_image`].
///
/// Creates a current-thread tokio runtime internally.
pub fn process_image_sync(paths: &JobPaths, config: &JobConfig) -> Result<JobOutcome, PeroError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PeroError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_image(paths, config))
}
