//! Telegram transport: bot setup, dispatcher schema, the production
//! content sender and admin notifications.

pub mod bot;
pub mod handlers;
pub mod notifications;
pub mod sender;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use sender::BotSender;
