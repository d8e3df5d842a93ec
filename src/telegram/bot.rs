//! Bot initialization and the command surface.

use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

use crate::core::config;

// /start arrives with a deep-link payload or bare; both must parse.
fn parse_payload(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "open a folder link", parse_with = parse_payload)]
    Start(String),
    #[command(description = "show help")]
    Help,
    #[command(description = "cancel an in-progress delivery")]
    Cancel,
}

/// Create the Bot from the configured token.
pub fn create_bot() -> Bot {
    Bot::new(config::BOT_TOKEN.clone())
}

/// Register the command list in the Telegram UI. Failures are logged and
/// ignored; the bot works without the menu.
pub async fn setup_bot_commands(bot: &Bot) {
    use teloxide::types::BotCommand;

    let result = bot
        .set_my_commands(vec![
            BotCommand::new("start", "open a folder link"),
            BotCommand::new("help", "show help"),
            BotCommand::new("cancel", "cancel an in-progress delivery"),
        ])
        .await;

    if let Err(e) = result {
        log::warn!("Failed to set bot commands: {}", e);
    }
}
