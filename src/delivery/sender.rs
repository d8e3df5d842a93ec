//! Outbound message seam.
//!
//! The delivery engine talks to Telegram only through [`ContentSender`],
//! so tests can swap in a recorder and the engine never imports `teloxide`
//! directly.

use async_trait::async_trait;

use crate::core::AppResult;

/// Enough of a sent message to delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub message_id: i32,
}

#[async_trait]
pub trait ContentSender: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<MessageHandle>;

    /// `protect` blocks forwarding/saving; `spoiler` blurs until tapped.
    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        protect: bool,
        spoiler: bool,
    ) -> AppResult<MessageHandle>;

    async fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        protect: bool,
        spoiler: bool,
    ) -> AppResult<MessageHandle>;

    async fn send_document(&self, chat_id: i64, file_id: &str, protect: bool) -> AppResult<MessageHandle>;

    async fn delete_message(&self, handle: MessageHandle) -> AppResult<()>;
}
