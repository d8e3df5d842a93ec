//! The production `ContentSender` backed by a live Bot.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageId};

use crate::core::AppResult;
use crate::delivery::sender::{ContentSender, MessageHandle};

pub struct BotSender {
    bot: Bot,
}

impl BotSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn handle_of(msg: &teloxide::types::Message) -> MessageHandle {
    MessageHandle {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
    }
}

#[async_trait]
impl ContentSender for BotSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<MessageHandle> {
        let msg = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(handle_of(&msg))
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        protect: bool,
        spoiler: bool,
    ) -> AppResult<MessageHandle> {
        let msg = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_owned())))
            .protect_content(protect)
            .has_spoiler(spoiler)
            .await?;
        Ok(handle_of(&msg))
    }

    async fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        protect: bool,
        spoiler: bool,
    ) -> AppResult<MessageHandle> {
        let msg = self
            .bot
            .send_video(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_owned())))
            .protect_content(protect)
            .has_spoiler(spoiler)
            .await?;
        Ok(handle_of(&msg))
    }

    async fn send_document(&self, chat_id: i64, file_id: &str, protect: bool) -> AppResult<MessageHandle> {
        let msg = self
            .bot
            .send_document(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_owned())))
            .protect_content(protect)
            .await?;
        Ok(handle_of(&msg))
    }

    async fn delete_message(&self, handle: MessageHandle) -> AppResult<()> {
        self.bot
            .delete_message(ChatId(handle.chat_id), MessageId(handle.message_id))
            .await?;
        Ok(())
    }
}
