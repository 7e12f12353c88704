//! The processing loop.
//!
//! A single consumer that works the queue head to completion before looking
//! at the next job:
//!
//! 1. Download every source into the input directory
//! 2. Run the requested edit through the transcoder
//! 3. Send the result back to the requester
//! 4. Finalize: remove working files, retract the status message and pop
//!
//! Finalizing runs after every outcome. A failed job is reported to the
//! requester before it is finalized.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use vedit_gateway::MessagingGateway;
use vedit_media::Transcoder;
use vedit_models::{EditOperation, Job};
use vedit_queue::JobQueue;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::notifier::StatusBoard;
use crate::workspace::WorkDirs;

/// Text sent to the requester when a job fails.
pub fn failure_text(err: &WorkerError) -> String {
    format!("Sorry, there was an error processing your video: {}", err)
}

/// How a job left the queue.
#[derive(Debug)]
pub enum JobOutcome {
    /// The result was delivered.
    Completed,
    /// Processing or delivery failed; the requester was told.
    Failed(WorkerError),
    /// The job record was malformed and dropped without a reply.
    Discarded,
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }
}

/// The single queue consumer.
pub struct ProcessingLoop {
    queue: JobQueue,
    board: StatusBoard,
    gateway: Arc<dyn MessagingGateway>,
    transcoder: Arc<dyn Transcoder>,
    dirs: WorkDirs,
    idle_backoff: Duration,
    settle_delay: Duration,
}

impl ProcessingLoop {
    pub fn new(
        config: &WorkerConfig,
        queue: JobQueue,
        board: StatusBoard,
        gateway: Arc<dyn MessagingGateway>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            queue,
            board,
            gateway,
            transcoder,
            dirs: WorkDirs::new(&config.work_dir),
            idle_backoff: config.idle_backoff,
            settle_delay: config.settle_delay,
        }
    }

    pub fn work_dirs(&self) -> &WorkDirs {
        &self.dirs
    }

    /// Run until shutdown is signalled. Shutdown is only observed between
    /// jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Processing loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.run_once().await.is_some() {
                continue;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.idle_backoff) => {}
            }
        }

        info!("Processing loop stopped");
    }

    /// Handle the queue head, if any. Returns `None` when the queue is empty.
    pub async fn run_once(&self) -> Option<JobOutcome> {
        let job = self.queue.peek_head().await?;
        let logger = JobLogger::for_job(&job);
        let span = logger.create_span();
        Some(self.handle_job(job, logger).instrument(span).await)
    }

    async fn handle_job(&self, job: Job, logger: JobLogger) -> JobOutcome {
        let started = Instant::now();
        let kind = job.operation.kind();

        if let Err(e) = job.validate() {
            logger.log_warning(&format!("discarding malformed job: {}", e));
            self.finalize(&job).await;
            metrics::record_job_discarded();
            return JobOutcome::Discarded;
        }

        logger.log_start(&format!("{} source(s)", job.sources.len()));

        let outcome = match self.execute(&job, &logger).await {
            Ok(()) => {
                logger.log_completion(&format!(
                    "delivered in {:.1}s",
                    started.elapsed().as_secs_f64()
                ));
                metrics::record_job_completed(kind, started.elapsed());
                JobOutcome::Completed
            }
            Err(e) => {
                if e.is_input_error() {
                    logger.log_warning(&e.to_string());
                } else {
                    logger.log_error(&e.to_string());
                }
                metrics::record_job_failed(kind, e.is_input_error());
                self.report_failure(&job, &e).await;
                JobOutcome::Failed(e)
            }
        };

        self.finalize(&job).await;
        outcome
    }

    /// Fetch, transcode and deliver.
    async fn execute(&self, job: &Job, logger: &JobLogger) -> WorkerResult<()> {
        self.dirs.ensure().await?;

        let inputs = self.fetch_sources(job, logger).await?;
        let output = self.dirs.output_path(&job.id);

        match job.operation {
            EditOperation::Crop { start, end } => {
                self.transcoder.crop(&inputs[0], start, end, &output).await?;
            }
            EditOperation::Speed { factor } => {
                self.transcoder.speed(&inputs[0], factor, &output).await?;
            }
            EditOperation::Concat => {
                self.transcoder.concat(&inputs, &output).await?;
            }
        }
        logger.log_progress("transcoding finished, uploading result");

        self.gateway
            .send_video(job.requester, &output)
            .await
            .map_err(|e| WorkerError::delivery_failed(e.to_string()))
    }

    /// Download every source in order, then check none of them is empty.
    async fn fetch_sources(&self, job: &Job, logger: &JobLogger) -> WorkerResult<Vec<PathBuf>> {
        let mut inputs = Vec::with_capacity(job.sources.len());

        for (index, source) in job.sources.iter().enumerate() {
            let dest = self.dirs.input_path(&job.id, index);
            self.gateway
                .download(source, &dest)
                .await
                .map_err(|e| WorkerError::download_failed(e.to_string()))?;
            inputs.push(dest);
        }
        logger.log_progress(&format!("downloaded {} source(s)", inputs.len()));

        tokio::time::sleep(self.settle_delay).await;

        for (index, path) in inputs.iter().enumerate() {
            let len = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
            if len == 0 {
                return Err(WorkerError::EmptySource { index });
            }
        }

        Ok(inputs)
    }

    async fn report_failure(&self, job: &Job, err: &WorkerError) {
        if let Err(e) = self.gateway.send_text(job.requester, &failure_text(err), &[]).await {
            warn!(job_id = %job.id, "Failed to report error to requester: {}", e);
        }
    }

    /// Release everything a job holds. Safe to call more than once.
    pub async fn finalize(&self, job: &Job) {
        let removed = self.dirs.cleanup(job).await;
        debug!(job_id = %job.id, removed, "Working files removed");

        if let Some(message) = self.board.remove(&job.id).await {
            if let Err(e) = self.gateway.delete_message(message).await {
                warn!(job_id = %job.id, "Failed to delete status message: {}", e);
            }
        }

        if self.queue.pop_if(&job.id).await.is_some() {
            let remaining = self.queue.len().await;
            debug!(job_id = %job.id, remaining = remaining, "Job released");
        }
    }
}
