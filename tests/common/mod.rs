//! Shared fixtures: in-memory database pools and a recording sender.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use foldervault::core::AppResult;
use foldervault::delivery::sender::{ContentSender, MessageHandle};
use foldervault::delivery::CancelRegistry;
use foldervault::storage::db::create_memory_pool;
use foldervault::storage::{folders, DbPool};

pub fn memory_pool() -> DbPool {
    create_memory_pool().expect("in-memory pool")
}

pub fn now() -> String {
    Utc::now().to_rfc3339()
}

/// A folder with three items, ready to deliver.
pub fn seed_folder(pool: &DbPool, name: &str) -> i64 {
    let conn = pool.get().unwrap();
    let id = folders::create_folder(&conn, name, &now()).unwrap();
    folders::add_content(&conn, id, None, "text", None, Some("hello"), &now()).unwrap();
    folders::add_content(&conn, id, Some("photo-1"), "photo", Some(100), None, &now()).unwrap();
    folders::add_content(&conn, id, Some("doc-1"), "document", Some(200), None, &now()).unwrap();
    id
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub kind: &'static str,
    pub payload: String,
    pub protect: bool,
    pub spoiler: bool,
}

/// Records everything the engine sends. Optionally flips a cancel flag
/// after a set number of sends, to exercise mid-stream cancellation
/// deterministically.
pub struct MockSender {
    pub sent: Mutex<Vec<SentMessage>>,
    pub deleted: Mutex<Vec<MessageHandle>>,
    next_id: AtomicI32,
    cancel_after: Mutex<Option<(usize, Arc<CancelRegistry>, i64)>>,
}

impl MockSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
            cancel_after: Mutex::new(None),
        })
    }

    pub fn cancel_after(&self, sends: usize, registry: Arc<CancelRegistry>, user_id: i64) {
        *self.cancel_after.lock().unwrap() = Some((sends, registry, user_id));
    }

    /// Messages recorded for one chat, in send order.
    pub fn sent_to(&self, chat_id: i64) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    fn record(&self, msg: SentMessage) -> MessageHandle {
        let chat_id = msg.chat_id;
        let mut sent = self.sent.lock().unwrap();
        sent.push(msg);
        let count = sent.len();
        drop(sent);

        if let Some((after, registry, user_id)) = &*self.cancel_after.lock().unwrap() {
            if count == *after {
                registry.cancel(*user_id);
            }
        }

        MessageHandle {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ContentSender for MockSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<MessageHandle> {
        Ok(self.record(SentMessage {
            chat_id,
            kind: "text",
            payload: text.to_owned(),
            protect: false,
            spoiler: false,
        }))
    }

    async fn send_photo(&self, chat_id: i64, file_id: &str, protect: bool, spoiler: bool) -> AppResult<MessageHandle> {
        Ok(self.record(SentMessage {
            chat_id,
            kind: "photo",
            payload: file_id.to_owned(),
            protect,
            spoiler,
        }))
    }

    async fn send_video(&self, chat_id: i64, file_id: &str, protect: bool, spoiler: bool) -> AppResult<MessageHandle> {
        Ok(self.record(SentMessage {
            chat_id,
            kind: "video",
            payload: file_id.to_owned(),
            protect,
            spoiler,
        }))
    }

    async fn send_document(&self, chat_id: i64, file_id: &str, protect: bool) -> AppResult<MessageHandle> {
        Ok(self.record(SentMessage {
            chat_id,
            kind: "document",
            payload: file_id.to_owned(),
            protect,
            spoiler: false,
        }))
    }

    async fn delete_message(&self, handle: MessageHandle) -> AppResult<()> {
        self.deleted.lock().unwrap().push(handle);
        Ok(())
    }
}
