//! FIFO job queue shared by the intake, processing and notifier tasks.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use vedit_models::{Job, JobId};

use crate::error::{QueueError, QueueResult};

/// Job queue handle.
///
/// Clones share the same underlying queue. Positions are computed on demand
/// from the current order, never stored, so they cannot go stale.
#[derive(Debug, Clone, Default)]
pub struct JobQueue {
    inner: Arc<Mutex<VecDeque<Job>>>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail.
    ///
    /// Returns the job's zero-based position, computed under the same lock as
    /// the insertion.
    pub async fn push(&self, job: Job) -> QueueResult<usize> {
        let mut queue = self.inner.lock().await;

        if queue.iter().any(|j| j.id == job.id) {
            return Err(QueueError::Duplicate(job.id.to_string()));
        }

        let position = queue.len();
        info!(job_id = %job.id, position, "Enqueued job");
        queue.push_back(job);
        Ok(position)
    }

    /// Remove the head. Returns `None` if the queue is empty.
    ///
    /// Only the processing loop calls this, once the head has been fully
    /// handled.
    pub async fn pop(&self) -> Option<Job> {
        let job = self.inner.lock().await.pop_front();
        if let Some(ref j) = job {
            debug!(job_id = %j.id, "Removed job from queue head");
        }
        job
    }

    /// Remove the head only if it is `id`.
    ///
    /// Lets a finished job be released more than once without touching the
    /// job queued behind it.
    pub async fn pop_if(&self, id: &JobId) -> Option<Job> {
        let mut queue = self.inner.lock().await;
        if queue.front().map(|j| &j.id) != Some(id) {
            return None;
        }
        let job = queue.pop_front();
        debug!(job_id = %id, "Removed job from queue head");
        job
    }

    /// Return the head without removing it.
    pub async fn peek_head(&self) -> Option<Job> {
        self.inner.lock().await.front().cloned()
    }

    /// Zero-based distance of a job from the head.
    pub async fn position_of(&self, id: &JobId) -> Option<usize> {
        self.inner.lock().await.iter().position(|j| &j.id == id)
    }

    /// Number of queued jobs, including the one being processed.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// IDs in queue order.
    pub async fn snapshot_ids(&self) -> Vec<JobId> {
        self.inner.lock().await.iter().map(|j| j.id.clone()).collect()
    }
}
