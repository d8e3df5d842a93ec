//! Foldervault - Telegram bot for distributing content folders behind
//! password-protected, expiring, single-use-capable deep links.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, token generation
//! - `storage`: SQLite persistence behind an r2d2 pool
//! - `access`: gate evaluation, session state, OTP sub-flow
//! - `delivery`: content streaming, cancellation, self-destruct timers
//! - `sweeper`: background cleanup loops
//! - `telegram`: bot setup, dispatcher schema, outbound sender

pub mod access;
pub mod core;
pub mod delivery;
pub mod storage;
pub mod sweeper;
pub mod telegram;

pub use core::{config, AppError, AppResult};
pub use delivery::{CancelRegistry, ContentSender, DeliveryEngine, DeliveryResult, SelfDestructQueue};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, BotSender, HandlerDeps};
