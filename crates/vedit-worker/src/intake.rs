//! Chat intake: turns user interactions into queued jobs.
//!
//! A conversation goes: user sends a video, picks an operation from the
//! buttons under the bot's reply, then supplies the parameters. Crop and
//! speed take a single text reply; concat collects further videos until the
//! user sends `merge`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use vedit_gateway::{Button, InboundEvent, MessageRef, MessagingGateway};
use vedit_models::{
    parse_crop_range, parse_speed_factor, ChatId, EditOperation, Job, JobId, ModelResult,
    OperationKind, SourceRef,
};
use vedit_queue::JobQueue;

use crate::error::WorkerResult;
use crate::metrics;
use crate::notifier::{position_text, StatusBoard};

pub const GREETING_TEXT: &str = "Hey, I am a telegram bot for easy and fast video editing \
     (yet another ffmpeg wrapper lol). Just drop me your video. I am also open-source, \
     so you can self-host me.";
pub const CHOOSE_ACTION_TEXT: &str = "Alright, now choose an action to perform from below";
pub const SPEED_PROMPT_TEXT: &str =
    "Send me a speed multiplier (e.g., 2 for double speed, 0.5 for half speed).";
pub const CROP_PROMPT_TEXT: &str =
    "Send me your timecodes AS A REPLY TO THIS MESSAGE in the format:\n\
     start;end\n(e.g., 00:00:05;00:00:10)";
pub const CONCAT_PROMPT_TEXT: &str =
    "Send me the videos to append, one by one, then send merge to join them.";
pub const NO_VIDEO_TEXT: &str = "No video found in the replied message!";
pub const INVALID_INPUT_TEXT: &str =
    "Invalid input or an error occurred. Please ensure your input is in the correct format.";

const MERGE_KEYWORD: &str = "merge";

/// Back-off after a failed poll for updates.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// An operation a user picked but has not finished specifying.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    /// Chat the result goes to
    pub requester: ChatId,
    /// Videos collected so far, in arrival order
    pub sources: Vec<SourceRef>,
}

/// Pending operations keyed by user ID. At most one per user.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<i64, PendingOperation>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pending operation, replacing any unfinished one. Returns the
    /// replaced operation.
    pub async fn begin(&self, user_id: i64, pending: PendingOperation) -> Option<PendingOperation> {
        self.inner.lock().await.insert(user_id, pending)
    }

    /// Add a video sent in `chat` to the user's pending concat. Returns the
    /// new source count, or `None` if the user has no pending concat started
    /// in that chat.
    pub async fn append_source(
        &self,
        user_id: i64,
        chat: ChatId,
        source: SourceRef,
    ) -> Option<usize> {
        let mut sessions = self.inner.lock().await;
        let pending = sessions
            .get_mut(&user_id)
            .filter(|p| p.kind == OperationKind::Concat && p.requester == chat)?;
        pending.sources.push(source);
        Some(pending.sources.len())
    }

    pub async fn kind_of(&self, user_id: i64) -> Option<OperationKind> {
        self.inner.lock().await.get(&user_id).map(|p| p.kind)
    }

    /// Remove and return the user's pending operation.
    pub async fn take(&self, user_id: i64) -> Option<PendingOperation> {
        self.inner.lock().await.remove(&user_id)
    }
}

/// Reacts to inbound chat events.
pub struct IntakeAdapter {
    gateway: Arc<dyn MessagingGateway>,
    queue: JobQueue,
    board: StatusBoard,
    sessions: SessionStore,
    repo_url: String,
}

impl IntakeAdapter {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        queue: JobQueue,
        board: StatusBoard,
        sessions: SessionStore,
        repo_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            queue,
            board,
            sessions,
            repo_url: repo_url.into(),
        }
    }

    /// Poll for events until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Intake started");

        loop {
            let events = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                result = self.gateway.next_events() => result,
            };

            match events {
                Ok(events) => {
                    for event in events {
                        let user_id = event.user_id();
                        if let Err(e) = self.handle_event(event).await {
                            warn!(user_id, "Failed to handle chat event: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to poll for updates: {}", e);
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }

        info!("Intake stopped");
    }

    pub async fn handle_event(&self, event: InboundEvent) -> WorkerResult<()> {
        match event {
            InboundEvent::Command { message, command, .. } => {
                if command == "start" {
                    self.gateway
                        .send_text(
                            message.chat,
                            GREETING_TEXT,
                            &[vec![Button::url("👨🏼‍💻Github", &self.repo_url)]],
                        )
                        .await?;
                }
                Ok(())
            }
            InboundEvent::Video {
                user_id,
                message,
                source,
            } => self.on_video(user_id, message, source).await,
            InboundEvent::Callback {
                callback_id,
                user_id,
                data,
                message,
                replied_video,
            } => {
                self.on_choice(&callback_id, user_id, &data, message, replied_video)
                    .await
            }
            InboundEvent::Text {
                user_id,
                message,
                text,
                is_reply,
            } => self.on_text(user_id, message, &text, is_reply).await,
        }
    }

    async fn on_video(
        &self,
        user_id: i64,
        message: MessageRef,
        source: SourceRef,
    ) -> WorkerResult<()> {
        if let Some(count) = self
            .sessions
            .append_source(user_id, message.chat, source)
            .await
        {
            debug!(user_id, count, "Added video to pending concat");
            self.gateway
                .reply_text(
                    message,
                    &format!("Got it, {count} videos so far. Send more or send merge."),
                    &[],
                )
                .await?;
            return Ok(());
        }

        let buttons = vec![
            vec![Button::callback("Crop", OperationKind::Crop.as_str())],
            vec![Button::callback("Modify speed", OperationKind::Speed.as_str())],
            vec![Button::callback("Concat", OperationKind::Concat.as_str())],
        ];
        self.gateway
            .reply_text(message, CHOOSE_ACTION_TEXT, &buttons)
            .await?;
        Ok(())
    }

    async fn on_choice(
        &self,
        callback_id: &str,
        user_id: i64,
        data: &str,
        message: Option<MessageRef>,
        replied_video: Option<SourceRef>,
    ) -> WorkerResult<()> {
        let Ok(kind) = data.parse::<OperationKind>() else {
            debug!(user_id, data, "Ignoring unknown button");
            self.gateway.answer_callback(callback_id, None, false).await?;
            return Ok(());
        };

        let (Some(message), Some(video)) = (message, replied_video) else {
            self.gateway
                .answer_callback(callback_id, Some(NO_VIDEO_TEXT), true)
                .await?;
            return Ok(());
        };

        let replaced = self
            .sessions
            .begin(
                user_id,
                PendingOperation {
                    kind,
                    requester: message.chat,
                    sources: vec![video],
                },
            )
            .await;
        if let Some(previous) = replaced {
            debug!(user_id, previous = %previous.kind, "Replaced unfinished operation");
        }

        self.gateway.answer_callback(callback_id, None, false).await?;

        let prompt = match kind {
            OperationKind::Crop => CROP_PROMPT_TEXT,
            OperationKind::Speed => SPEED_PROMPT_TEXT,
            OperationKind::Concat => CONCAT_PROMPT_TEXT,
        };
        self.gateway.reply_text(message, prompt, &[]).await?;
        Ok(())
    }

    async fn on_text(
        &self,
        user_id: i64,
        message: MessageRef,
        text: &str,
        is_reply: bool,
    ) -> WorkerResult<()> {
        let wants_merge = text.trim().eq_ignore_ascii_case(MERGE_KEYWORD);

        match self.sessions.kind_of(user_id).await {
            Some(OperationKind::Concat) if wants_merge => {}
            Some(OperationKind::Crop | OperationKind::Speed) if is_reply => {}
            _ => return Ok(()),
        }

        let Some(pending) = self.sessions.take(user_id).await else {
            return Ok(());
        };

        match build_job(user_id, message, &pending, text) {
            Ok(job) => self.submit(job, message).await,
            Err(e) => {
                debug!(user_id, "Rejected parameters {:?}: {}", text, e);
                self.gateway
                    .reply_text(message, INVALID_INPUT_TEXT, &[])
                    .await?;
                Ok(())
            }
        }
    }

    /// Queue a job and post its status message.
    async fn submit(&self, job: Job, message: MessageRef) -> WorkerResult<()> {
        let job_id = job.id.clone();
        let kind = job.operation.kind();

        let position = match self.queue.push(job).await {
            Ok(position) => position,
            Err(e) => {
                warn!(job_id = %job_id, "Failed to enqueue job: {}", e);
                self.gateway
                    .reply_text(message, INVALID_INPUT_TEXT, &[])
                    .await?;
                return Ok(());
            }
        };
        metrics::record_job_enqueued(kind);

        let status = self
            .gateway
            .reply_text(message, &position_text(position), &[])
            .await?;
        self.board.register(job_id, status, position).await;
        Ok(())
    }
}

/// Build the job for a finished conversation.
fn build_job(
    user_id: i64,
    message: MessageRef,
    pending: &PendingOperation,
    text: &str,
) -> ModelResult<Job> {
    let operation = match pending.kind {
        OperationKind::Crop => parse_crop_range(text)?,
        OperationKind::Speed => parse_speed_factor(text)?,
        OperationKind::Concat => EditOperation::Concat,
    };
    Job::new(
        JobId::generate(user_id, message.message_id),
        pending.requester,
        operation,
        pending.sources.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGateway;

    const USER: i64 = 7;
    const CHAT: ChatId = ChatId(70);

    struct Harness {
        gateway: Arc<FakeGateway>,
        queue: JobQueue,
        board: StatusBoard,
        sessions: SessionStore,
        intake: IntakeAdapter,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(FakeGateway::new());
        let queue = JobQueue::new();
        let board = StatusBoard::new();
        let sessions = SessionStore::new();
        let intake = IntakeAdapter::new(
            gateway.clone(),
            queue.clone(),
            board.clone(),
            sessions.clone(),
            "https://example.com/repo",
        );
        Harness {
            gateway,
            queue,
            board,
            sessions,
            intake,
        }
    }

    fn msg(id: i64) -> MessageRef {
        MessageRef::new(CHAT, id)
    }

    fn video(id: i64, file: &str) -> InboundEvent {
        InboundEvent::Video {
            user_id: USER,
            message: msg(id),
            source: SourceRef::new(file),
        }
    }

    fn choose(data: &str, replied: Option<&str>) -> InboundEvent {
        InboundEvent::Callback {
            callback_id: "cb".to_string(),
            user_id: USER,
            data: data.to_string(),
            message: Some(msg(2)),
            replied_video: replied.map(SourceRef::new),
        }
    }

    fn text(id: i64, body: &str, is_reply: bool) -> InboundEvent {
        InboundEvent::Text {
            user_id: USER,
            message: msg(id),
            text: body.to_string(),
            is_reply,
        }
    }

    #[tokio::test]
    async fn test_session_store_append_only_for_concat() {
        let sessions = SessionStore::new();
        assert_eq!(sessions.append_source(1, CHAT, SourceRef::new("x")).await, None);

        sessions
            .begin(
                1,
                PendingOperation {
                    kind: OperationKind::Crop,
                    requester: CHAT,
                    sources: vec![SourceRef::new("a")],
                },
            )
            .await;
        assert_eq!(sessions.append_source(1, CHAT, SourceRef::new("x")).await, None);

        let replaced = sessions
            .begin(
                1,
                PendingOperation {
                    kind: OperationKind::Concat,
                    requester: CHAT,
                    sources: vec![SourceRef::new("a")],
                },
            )
            .await;
        assert_eq!(replaced.map(|p| p.kind), Some(OperationKind::Crop));
        assert_eq!(
            sessions.append_source(1, ChatId(71), SourceRef::new("b")).await,
            None
        );
        assert_eq!(sessions.append_source(1, CHAT, SourceRef::new("b")).await, Some(2));
        assert_eq!(sessions.take(1).await.unwrap().sources.len(), 2);
        assert!(sessions.take(1).await.is_none());
    }

    #[tokio::test]
    async fn test_start_sends_greeting_with_link() {
        let h = harness();
        h.intake
            .handle_event(InboundEvent::Command {
                user_id: USER,
                message: msg(1),
                command: "start".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(h.gateway.sent(), vec![(CHAT, GREETING_TEXT.to_string())]);
        assert_eq!(
            h.gateway.sent_buttons()[0],
            vec![vec![Button::url("👨🏼‍💻Github", "https://example.com/repo")]]
        );
    }

    #[tokio::test]
    async fn test_video_offers_operations() {
        let h = harness();
        h.intake.handle_event(video(1, "A")).await.unwrap();

        assert_eq!(h.gateway.replies(), vec![(msg(1), CHOOSE_ACTION_TEXT.to_string())]);
        let data: Vec<String> = h.gateway.reply_buttons()[0]
            .iter()
            .flatten()
            .map(|b| match b {
                Button::Callback { data, .. } => data.clone(),
                Button::Url { url, .. } => url.clone(),
            })
            .collect();
        assert_eq!(data, vec!["crop", "speed", "concat"]);
    }

    #[tokio::test]
    async fn test_choice_without_video_alerts() {
        let h = harness();
        h.intake.handle_event(choose("crop", None)).await.unwrap();

        assert_eq!(
            h.gateway.callbacks(),
            vec![("cb".to_string(), Some(NO_VIDEO_TEXT.to_string()), true)]
        );
        assert!(h.sessions.kind_of(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_choice_on_inaccessible_message_is_answered() {
        let h = harness();
        h.intake
            .handle_event(InboundEvent::Callback {
                callback_id: "old".to_string(),
                user_id: USER,
                data: "concat".to_string(),
                message: None,
                replied_video: None,
            })
            .await
            .unwrap();

        assert_eq!(
            h.gateway.callbacks(),
            vec![("old".to_string(), Some(NO_VIDEO_TEXT.to_string()), true)]
        );
        assert!(h.gateway.replies().is_empty());
        assert!(h.sessions.kind_of(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_crop_reply_enqueues_job() {
        let h = harness();
        h.intake.handle_event(choose("crop", Some("A"))).await.unwrap();
        assert_eq!(h.gateway.replies()[0].1, CROP_PROMPT_TEXT);

        h.intake
            .handle_event(text(3, "00:00:05;00:00:10", true))
            .await
            .unwrap();

        let ids = h.queue.snapshot_ids().await;
        assert_eq!(ids.len(), 1);
        let job = h.queue.peek_head().await.unwrap();
        assert_eq!(job.operation, EditOperation::Crop { start: 5.0, end: 10.0 });
        assert_eq!(job.sources, vec![SourceRef::new("A")]);
        assert_eq!(job.requester, CHAT);

        let replies = h.gateway.replies();
        assert_eq!(replies.last().unwrap().1, "Your task is in position 1 of the queue.");
        assert!(h.board.message_for(&ids[0]).await.is_some());
        assert!(h.sessions.kind_of(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_speed_requires_reply() {
        let h = harness();
        h.intake.handle_event(choose("speed", Some("A"))).await.unwrap();

        h.intake.handle_event(text(3, "2", false)).await.unwrap();
        assert!(h.queue.is_empty().await);
        assert_eq!(h.sessions.kind_of(USER).await, Some(OperationKind::Speed));

        h.intake.handle_event(text(4, "0,5", true)).await.unwrap();
        let job = h.queue.peek_head().await.unwrap();
        assert_eq!(job.operation, EditOperation::Speed { factor: 0.5 });
    }

    #[tokio::test]
    async fn test_invalid_parameters_clear_session() {
        let h = harness();
        h.intake.handle_event(choose("crop", Some("A"))).await.unwrap();
        h.intake.handle_event(text(3, "00:00:10;00:00:05", true)).await.unwrap();

        assert!(h.queue.is_empty().await);
        assert_eq!(h.gateway.replies().last().unwrap().1, INVALID_INPUT_TEXT);
        assert!(h.sessions.kind_of(USER).await.is_none());

        h.intake.handle_event(text(4, "00:00:01;00:00:05", true)).await.unwrap();
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_concat_accumulates_until_merge() {
        let h = harness();
        h.intake.handle_event(choose("concat", Some("A"))).await.unwrap();
        h.intake.handle_event(video(3, "B")).await.unwrap();
        h.intake.handle_event(text(4, "not yet", false)).await.unwrap();
        h.intake.handle_event(video(5, "C")).await.unwrap();
        assert!(h.queue.is_empty().await);

        h.intake.handle_event(text(6, " Merge ", false)).await.unwrap();

        let job = h.queue.peek_head().await.unwrap();
        assert_eq!(job.operation, EditOperation::Concat);
        assert_eq!(
            job.sources,
            vec![SourceRef::new("A"), SourceRef::new("B"), SourceRef::new("C")]
        );
        assert!(h.sessions.kind_of(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_video_from_other_chat_is_not_merged() {
        let h = harness();
        h.intake.handle_event(choose("concat", Some("A"))).await.unwrap();
        let elsewhere = MessageRef::new(ChatId(71), 3);
        h.intake
            .handle_event(InboundEvent::Video {
                user_id: USER,
                message: elsewhere,
                source: SourceRef::new("B"),
            })
            .await
            .unwrap();

        assert_eq!(
            h.gateway.replies().last().unwrap(),
            &(elsewhere, CHOOSE_ACTION_TEXT.to_string())
        );
        h.intake.handle_event(text(4, "merge", false)).await.unwrap();
        let job = h.queue.peek_head().await.unwrap();
        assert_eq!(job.sources, vec![SourceRef::new("A")]);
    }

    #[tokio::test]
    async fn test_new_choice_replaces_pending_concat() {
        let h = harness();
        h.intake.handle_event(choose("concat", Some("A"))).await.unwrap();
        h.intake.handle_event(choose("speed", Some("B"))).await.unwrap();
        h.intake.handle_event(text(4, "merge", false)).await.unwrap();

        assert!(h.queue.is_empty().await);
        assert_eq!(h.sessions.kind_of(USER).await, Some(OperationKind::Speed));
    }

    #[tokio::test]
    async fn test_text_without_session_is_ignored() {
        let h = harness();
        h.intake.handle_event(text(1, "2", true)).await.unwrap();
        h.intake.handle_event(text(2, "merge", false)).await.unwrap();

        assert!(h.queue.is_empty().await);
        assert!(h.gateway.replies().is_empty());
    }

    #[tokio::test]
    async fn test_second_job_reports_second_position() {
        let h = harness();
        for (i, file) in ["A", "B"].iter().enumerate() {
            let base = (i as i64) * 10;
            h.intake.handle_event(choose("speed", Some(file))).await.unwrap();
            h.intake.handle_event(text(base + 3, "2", true)).await.unwrap();
        }

        assert_eq!(h.queue.len().await, 2);
        assert_eq!(
            h.gateway.replies().last().unwrap().1,
            "Your task is in position 2 of the queue."
        );
        assert_eq!(h.board.len().await, 2);
    }
}
