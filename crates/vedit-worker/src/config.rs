//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Root of the `input/` and `output/` working directories
    pub work_dir: PathBuf,
    /// Sleep between polls of an empty queue
    pub idle_backoff: Duration,
    /// Pause after the last download before the files are checked
    pub settle_delay: Duration,
    /// Interval between queue position updates
    pub notify_interval: Duration,
    /// Long-poll timeout for inbound updates
    pub poll_timeout: Duration,
    /// Link shown on the greeting message
    pub repo_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            work_dir: PathBuf::from("./vids"),
            idle_backoff: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            notify_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(30),
            repo_url: "https://github.com/fobbidennotis/telegramEditorBot".to_string(),
        }
    }
}

// Keeps the token out of startup logs.
impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("bot_token", &"<redacted>")
            .field("work_dir", &self.work_dir)
            .field("idle_backoff", &self.idle_backoff)
            .field("settle_delay", &self.settle_delay)
            .field("notify_interval", &self.notify_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("repo_url", &self.repo_url)
            .finish()
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bot_token = lookup("TG_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| WorkerError::config_error("TG_BOT_TOKEN is not set"))?;

        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Ok(Self {
            bot_token,
            work_dir: lookup("VEDIT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            idle_backoff: secs("VEDIT_IDLE_BACKOFF_SECS", defaults.idle_backoff),
            settle_delay: secs("VEDIT_SETTLE_DELAY_SECS", defaults.settle_delay),
            notify_interval: secs("VEDIT_NOTIFY_INTERVAL_SECS", defaults.notify_interval),
            poll_timeout: secs("VEDIT_POLL_TIMEOUT_SECS", defaults.poll_timeout),
            repo_url: lookup("VEDIT_REPO_URL").unwrap_or(defaults.repo_url),
        })
    }
}
