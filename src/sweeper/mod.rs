//! Background sweeps: link purge, trending purge, poll closing and the
//! quote of the day.
//!
//! Each sweep runs as its own `tokio::spawn`ed interval loop and catches
//! its own failures, so one broken sweep never stops the others.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::interval;

use crate::core::{config, AppResult};
use crate::delivery::sender::ContentSender;
use crate::storage::{engagement, get_connection, links, otp, roster, DbPool};

/// Spawn every background sweep. Called once at startup.
pub fn start_sweeps(pool: DbPool, sender: Arc<dyn ContentSender>) {
    spawn_sweep("link purge", config::sweep::link_purge_interval(), {
        let pool = pool.clone();
        move || {
            let pool = pool.clone();
            async move { purge_links(&pool) }
        }
    });

    spawn_sweep("trending purge", config::sweep::trending_purge_interval(), {
        let pool = pool.clone();
        move || {
            let pool = pool.clone();
            async move { purge_trending(&pool) }
        }
    });

    spawn_sweep("poll closer", config::sweep::poll_close_interval(), {
        let pool = pool.clone();
        let sender = Arc::clone(&sender);
        move || {
            let pool = pool.clone();
            let sender = Arc::clone(&sender);
            async move { close_overdue_polls(&pool, sender).await }
        }
    });

    spawn_sweep("quote of the day", config::sweep::qotd_interval(), {
        let pool = pool.clone();
        let sender = Arc::clone(&sender);
        move || {
            let pool = pool.clone();
            let sender = Arc::clone(&sender);
            async move { send_daily_quote(&pool, sender).await }
        }
    });
}

fn spawn_sweep<F, Fut>(name: &'static str, period: tokio::time::Duration, mut run: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = AppResult<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        log::info!("Sweep '{}' started (every {}s)", name, period.as_secs());
        loop {
            ticker.tick().await;
            if let Err(e) = run().await {
                log::error!("Sweep '{}' failed: {}", name, e);
            }
        }
    });
}

/// Delete expired and revoked links, plus settled OTP rows. Touches only
/// `links` and `folder_otps`; folders and their files are never swept.
pub fn purge_links(pool: &DbPool) -> AppResult<()> {
    let conn = get_connection(pool)?;
    let now = Utc::now().to_rfc3339();
    let (expired, revoked) = links::purge_expired_and_revoked(&conn, &now)?;
    let stale_otps = otp::purge_stale_otps(&conn, &now)?;
    if expired + revoked + stale_otps > 0 {
        log::info!(
            "Link purge: {} expired, {} revoked, {} stale OTPs removed",
            expired,
            revoked,
            stale_otps
        );
    }
    Ok(())
}

pub fn purge_trending(pool: &DbPool) -> AppResult<()> {
    let conn = get_connection(pool)?;
    let removed = engagement::purge_expired_trending(&conn, &Utc::now().to_rfc3339())?;
    if removed > 0 {
        log::info!("Trending purge: {} entries removed", removed);
    }
    Ok(())
}

/// Close every open poll past its close time and broadcast the tally.
/// Per-subscriber send failures are logged and skipped; the poll closes
/// regardless, so results are announced at most once.
pub async fn close_overdue_polls(pool: &DbPool, sender: Arc<dyn ContentSender>) -> AppResult<()> {
    let conn = get_connection(pool)?;
    let overdue = engagement::overdue_polls(&conn, &Utc::now().to_rfc3339())?;
    if overdue.is_empty() {
        return Ok(());
    }

    let subscribers = roster::active_subscribers(&conn)?;
    for poll in overdue {
        let tally = engagement::poll_tally(&conn, poll.id)?;
        let mut text = format!("Poll closed: {}\n", poll.question);
        if tally.is_empty() {
            text.push_str("No votes were cast.");
        } else {
            for (choice, count) in &tally {
                text.push_str(&format!("{}: {}\n", choice, count));
            }
        }

        for sub in &subscribers {
            if let Err(e) = sender.send_text(sub.user_id, &text).await {
                log::warn!("Poll result to {} failed: {}", sub.user_id, e);
            }
        }
        engagement::close_poll(&conn, poll.id)?;
        log::info!("Closed poll {} ({} votes)", poll.id, tally.iter().map(|t| t.1).sum::<i64>());
    }
    Ok(())
}

/// Send a randomly picked quote to every non-banned, non-admin
/// subscriber.
pub async fn send_daily_quote(pool: &DbPool, sender: Arc<dyn ContentSender>) -> AppResult<()> {
    let conn = get_connection(pool)?;
    let quote = match engagement::next_quote(&conn)? {
        Some(q) => q,
        None => return Ok(()),
    };

    let text = match &quote.author {
        Some(author) => format!("Quote of the day:\n\"{}\"\n- {}", quote.text, author),
        None => format!("Quote of the day:\n\"{}\"", quote.text),
    };

    let mut sent = 0usize;
    for sub in roster::active_subscribers(&conn)? {
        if roster::is_admin(&conn, sub.user_id)? {
            continue;
        }
        match sender.send_text(sub.user_id, &text).await {
            Ok(_) => sent += 1,
            Err(e) => log::warn!("Daily quote to {} failed: {}", sub.user_id, e),
        }
    }

    engagement::mark_quote_sent(&conn, quote.id, &Utc::now().to_rfc3339())?;
    log::info!("Daily quote {} sent to {} subscribers", quote.id, sent);
    Ok(())
}
