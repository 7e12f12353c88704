//! Bot runtime: wires the intake, processing and notifier tasks together.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use vedit_gateway::MessagingGateway;
use vedit_media::Transcoder;
use vedit_queue::JobQueue;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::intake::{IntakeAdapter, SessionStore};
use crate::notifier::{ProgressNotifier, StatusBoard};
use crate::processor::ProcessingLoop;
use crate::workspace::WorkDirs;

/// Owns the shared state and runs the three long-lived tasks.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: JobQueue,
    board: StatusBoard,
    sessions: SessionStore,
    gateway: Arc<dyn MessagingGateway>,
    transcoder: Arc<dyn Transcoder>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        gateway: Arc<dyn MessagingGateway>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            queue: JobQueue::new(),
            board: StatusBoard::new(),
            sessions: SessionStore::new(),
            gateway,
            transcoder,
            shutdown,
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Ask all tasks to stop. The processing loop finishes its current job
    /// first.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> WorkerResult<()> {
        WorkDirs::new(&self.config.work_dir).ensure().await?;
        info!("Working directory: {}", self.config.work_dir.display());

        let processor = ProcessingLoop::new(
            &self.config,
            self.queue.clone(),
            self.board.clone(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.transcoder),
        );
        let notifier = ProgressNotifier::new(
            Arc::clone(&self.gateway),
            self.queue.clone(),
            self.board.clone(),
            self.config.notify_interval,
        );
        let intake = IntakeAdapter::new(
            Arc::clone(&self.gateway),
            self.queue.clone(),
            self.board.clone(),
            self.sessions.clone(),
            self.config.repo_url.clone(),
        );

        let processing_rx = self.shutdown.subscribe();
        let notifier_rx = self.shutdown.subscribe();
        let intake_rx = self.shutdown.subscribe();

        let processing = tokio::spawn(async move { processor.run(processing_rx).await });
        let notifying = tokio::spawn(async move { notifier.run(notifier_rx).await });
        let polling = tokio::spawn(async move { intake.run(intake_rx).await });

        let (processing, notifying, polling) = tokio::join!(processing, notifying, polling);
        for (name, result) in [
            ("processing", processing),
            ("notifier", notifying),
            ("intake", polling),
        ] {
            if let Err(e) = result {
                error!("{} task ended abnormally: {}", name, e);
            }
        }

        info!("Job executor stopped ({} job(s) left in queue)", self.queue.len().await);
        Ok(())
    }
}
