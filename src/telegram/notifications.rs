//! Fire-and-forget administrator notifications.
//!
//! Every helper swallows its own errors; a broken notification must never
//! bubble into the flow that triggered it.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config;

pub async fn notify_admin_text(bot: &Bot, text: &str) {
    if let Err(e) = bot.send_message(ChatId(*config::ADMIN_ID), text).await {
        log::warn!("Failed to notify admin: {}", e);
    }
}

/// Tell the admin a user is waiting on an OTP, with a one-tap button that
/// generates and sends the code.
pub async fn notify_otp_request(bot: &Bot, folder_id: i64, folder_name: &str, user_id: i64, username: Option<&str>) {
    let who = username
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| format!("id {}", user_id));
    let text = format!("{} is requesting a one-time code for \"{}\".", who, folder_name);
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Generate and send code",
        format!("otp:{}:{}", folder_id, user_id),
    )]]);

    let result = bot
        .send_message(ChatId(*config::ADMIN_ID), text)
        .reply_markup(keyboard)
        .await;
    if let Err(e) = result {
        log::warn!("Failed to send OTP request notice: {}", e);
    }
}
