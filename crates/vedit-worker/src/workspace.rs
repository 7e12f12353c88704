//! Per-job working files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use vedit_models::{Job, JobId};

/// Input and output directories under the configured work dir.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    input: PathBuf,
    output: PathBuf,
}

impl WorkDirs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            input: root.join("input"),
            output: root.join("output"),
        }
    }

    /// Create both directories if needed.
    pub async fn ensure(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.input).await?;
        fs::create_dir_all(&self.output).await
    }

    /// Download target for the `index`-th source of a job.
    pub fn input_path(&self, job_id: &JobId, index: usize) -> PathBuf {
        self.input.join(format!("{}_{}.mp4", job_id, index))
    }

    /// Transcoder output for a job.
    pub fn output_path(&self, job_id: &JobId) -> PathBuf {
        self.output.join(format!("{}.mp4", job_id))
    }

    /// Every file a job may leave behind.
    pub fn job_files(&self, job: &Job) -> Vec<PathBuf> {
        (0..job.sources.len())
            .map(|i| self.input_path(&job.id, i))
            .chain(std::iter::once(self.output_path(&job.id)))
            .collect()
    }

    /// Remove a job's working files. Missing files are skipped; other
    /// failures are logged. Returns the number of files removed.
    pub async fn cleanup(&self, job: &Job) -> usize {
        let mut removed = 0;
        for path in self.job_files(job) {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(job_id = %job.id, "Removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(job_id = %job.id, "Failed to remove {}: {}", path.display(), e),
            }
        }
        removed
    }
}
