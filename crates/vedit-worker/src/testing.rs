//! In-memory gateway for unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vedit_gateway::{
    Button, GatewayError, GatewayResult, InboundEvent, MessageRef, MessagingGateway,
};
use vedit_models::{ChatId, SourceRef};

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<(ChatId, String, Vec<Vec<Button>>)>,
    replies: Vec<(MessageRef, String, Vec<Vec<Button>>)>,
    edits: Vec<(MessageRef, String)>,
    deleted: Vec<MessageRef>,
    videos: Vec<(ChatId, PathBuf)>,
    downloads: Vec<(SourceRef, PathBuf)>,
    callbacks: Vec<(String, Option<String>, bool)>,
    events: VecDeque<Vec<InboundEvent>>,
}

pub struct FakeGateway {
    recorded: Mutex<Recorded>,
    next_message_id: AtomicI64,
    download_content: Mutex<Vec<u8>>,
    fail_edits: AtomicBool,
    fail_downloads: AtomicBool,
    fail_send_video: AtomicBool,
    fail_send_text: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            recorded: Mutex::new(Recorded::default()),
            next_message_id: AtomicI64::new(1000),
            download_content: Mutex::new(b"video".to_vec()),
            fail_edits: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
            fail_send_video: AtomicBool::new(false),
            fail_send_text: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    fn record(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    fn next_message(&self, chat: ChatId) -> MessageRef {
        MessageRef::new(chat, self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send_video(&self, fail: bool) {
        self.fail_send_video.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send_text(&self, fail: bool) {
        self.fail_send_text.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_download_content(&self, content: &[u8]) {
        *self.download_content.lock().unwrap() = content.to_vec();
    }

    pub fn push_events(&self, events: Vec<InboundEvent>) {
        self.record().events.push_back(events);
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.record().sent.iter().map(|(c, t, _)| (*c, t.clone())).collect()
    }

    pub fn sent_buttons(&self) -> Vec<Vec<Vec<Button>>> {
        self.record().sent.iter().map(|(_, _, b)| b.clone()).collect()
    }

    pub fn replies(&self) -> Vec<(MessageRef, String)> {
        self.record().replies.iter().map(|(m, t, _)| (*m, t.clone())).collect()
    }

    pub fn reply_buttons(&self) -> Vec<Vec<Vec<Button>>> {
        self.record().replies.iter().map(|(_, _, b)| b.clone()).collect()
    }

    pub fn edits(&self) -> Vec<(MessageRef, String)> {
        self.record().edits.clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.record().deleted.clone()
    }

    pub fn videos(&self) -> Vec<(ChatId, PathBuf)> {
        self.record().videos.clone()
    }

    pub fn downloads(&self) -> Vec<(SourceRef, PathBuf)> {
        self.record().downloads.clone()
    }

    pub fn callbacks(&self) -> Vec<(String, Option<String>, bool)> {
        self.record().callbacks.clone()
    }
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef> {
        if self.fail_send_text.load(Ordering::SeqCst) {
            return Err(GatewayError::api("sendMessage", "bot was blocked by the user"));
        }
        self.record().sent.push((chat, text.to_string(), buttons.to_vec()));
        Ok(self.next_message(chat))
    }

    async fn reply_text(
        &self,
        to: MessageRef,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef> {
        self.record().replies.push((to, text.to_string(), buttons.to_vec()));
        Ok(self.next_message(to.chat))
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> GatewayResult<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(GatewayError::api("editMessageText", "message to edit not found"));
        }
        self.record().edits.push((message, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> GatewayResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(GatewayError::api("deleteMessage", "message to delete not found"));
        }
        self.record().deleted.push(message);
        Ok(())
    }

    async fn send_video(&self, chat: ChatId, path: &Path) -> GatewayResult<()> {
        if self.fail_send_video.load(Ordering::SeqCst) {
            return Err(GatewayError::api("sendVideo", "Request Entity Too Large"));
        }
        if !path.exists() {
            return Err(GatewayError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            )));
        }
        self.record().videos.push((chat, path.to_path_buf()));
        Ok(())
    }

    async fn download(&self, source: &SourceRef, dest: &Path) -> GatewayResult<()> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(GatewayError::api("getFile", "file is too big"));
        }
        self.record().downloads.push((source.clone(), dest.to_path_buf()));
        let content = self.download_content.lock().unwrap().clone();
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, content).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> GatewayResult<()> {
        self.record()
            .callbacks
            .push((callback_id.to_string(), text.map(str::to_string), alert));
        Ok(())
    }

    async fn next_events(&self) -> GatewayResult<Vec<InboundEvent>> {
        let next = self.record().events.pop_front();
        match next {
            Some(events) => Ok(events),
            None => {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }
}
