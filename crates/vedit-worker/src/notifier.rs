//! Queue position reporting.
//!
//! Each submitted job gets a status message showing its place in the queue.
//! [`StatusBoard`] tracks those messages and [`ProgressNotifier`] keeps them
//! in sync with the queue until the job leaves it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use vedit_gateway::{MessageRef, MessagingGateway};
use vedit_models::JobId;
use vedit_queue::JobQueue;

/// User-facing queue position text. `position` is zero-based.
pub fn position_text(position: usize) -> String {
    format!("Your task is in position {} of the queue.", position + 1)
}

#[derive(Debug, Clone, Copy)]
struct StatusEntry {
    message: MessageRef,
    /// Position currently displayed
    shown: usize,
}

/// Outstanding status messages, keyed by job.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<HashMap<JobId, StatusEntry>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `message`, which currently shows `position`.
    pub async fn register(&self, job_id: JobId, message: MessageRef, position: usize) {
        self.inner.lock().await.insert(
            job_id,
            StatusEntry {
                message,
                shown: position,
            },
        );
    }

    /// Stop tracking a job. Returns its message if it was tracked, so exactly
    /// one caller ends up retracting it.
    pub async fn remove(&self, job_id: &JobId) -> Option<MessageRef> {
        self.inner.lock().await.remove(job_id).map(|e| e.message)
    }

    pub async fn message_for(&self, job_id: &JobId) -> Option<MessageRef> {
        self.inner.lock().await.get(job_id).map(|e| e.message)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    async fn snapshot(&self) -> Vec<(JobId, StatusEntry)> {
        self.inner
            .lock()
            .await
            .iter()
            .map(|(id, e)| (id.clone(), *e))
            .collect()
    }

    async fn mark_shown(&self, job_id: &JobId, position: usize) {
        if let Some(entry) = self.inner.lock().await.get_mut(job_id) {
            entry.shown = position;
        }
    }
}

/// Periodically edits status messages to match the queue.
pub struct ProgressNotifier {
    gateway: Arc<dyn MessagingGateway>,
    queue: JobQueue,
    board: StatusBoard,
    interval: Duration,
}

impl ProgressNotifier {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        queue: JobQueue,
        board: StatusBoard,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            queue,
            board,
            interval,
        }
    }

    /// Reconcile every tracked message once.
    ///
    /// Queued jobs whose position changed get their message edited; jobs no
    /// longer queued have their message deleted and are dropped from the
    /// board. Gateway failures are logged and retried on the next pass.
    pub async fn tick(&self) {
        for (job_id, entry) in self.board.snapshot().await {
            match self.queue.position_of(&job_id).await {
                Some(position) if position == entry.shown => {}
                Some(position) => {
                    match self
                        .gateway
                        .edit_text(entry.message, &position_text(position))
                        .await
                    {
                        Ok(()) => {
                            debug!(job_id = %job_id, position, "Updated queue position");
                            self.board.mark_shown(&job_id, position).await;
                        }
                        Err(e) => warn!(job_id = %job_id, "Failed to update queue position: {}", e),
                    }
                }
                None => {
                    if let Some(message) = self.board.remove(&job_id).await {
                        if let Err(e) = self.gateway.delete_message(message).await {
                            warn!(job_id = %job_id, "Failed to delete status message: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Run until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Progress notifier started ({:?} interval)", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => self.tick().await,
            }
        }
        info!("Progress notifier stopped");
    }
}
