use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use foldervault::core::{config, init_logger};
use foldervault::delivery::{CancelRegistry, DeliveryEngine, SelfDestructQueue};
use foldervault::storage::create_pool;
use foldervault::telegram::{create_bot, schema, setup_bot_commands, BotSender, HandlerDeps};
use foldervault::{sweeper, ContentSender};

/// Main entry point for the Telegram bot
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    // Catch panics from handler tasks so the dispatcher keeps running
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    let db_pool = create_pool(&config::DATABASE_PATH)?;
    log::info!("Database ready at {}", *config::DATABASE_PATH);

    let bot = create_bot();
    setup_bot_commands(&bot).await;

    let sender: Arc<dyn ContentSender> = Arc::new(BotSender::new(bot.clone()));
    let engine = Arc::new(DeliveryEngine::new(
        db_pool.clone(),
        Arc::clone(&sender),
        SelfDestructQueue::new(),
        Arc::new(CancelRegistry::new()),
    ));

    sweeper::start_sweeps(db_pool.clone(), Arc::clone(&sender));

    let deps = HandlerDeps { db_pool, engine };

    log::info!("Starting dispatcher");
    Dispatcher::builder(bot, schema(deps))
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
