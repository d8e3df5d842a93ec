//! The redemption ledger: single-use claims, access records and the
//! admin-facing redemption notice.

use std::sync::Arc;

use chrono::Utc;

use crate::core::{config, AppResult};
use crate::delivery::sender::ContentSender;
use crate::storage::links::{self, LinkRecord};
use crate::storage::{DbConnection, DbPool};

/// Claim a single-use link for `requester`. `true` means this call won the
/// claim; `false` means someone else already holds it (or the link is not
/// single-use at all).
pub fn consume_single_use(conn: &DbConnection, token: &str, requester: i64) -> AppResult<bool> {
    let won = links::consume_single_use(conn, token, requester, &Utc::now().to_rfc3339())?;
    Ok(won)
}

/// Record one successful link-based delivery: folder log row, link audit
/// row and the access counter, all with the same timestamp.
pub fn record_link_access(
    conn: &DbConnection,
    link: &LinkRecord,
    requester: i64,
    username: Option<&str>,
) -> AppResult<()> {
    let now = Utc::now().to_rfc3339();
    links::insert_folder_access(conn, requester, username, link.folder_id, &now)?;
    links::insert_link_access(conn, link.id, link.folder_id, requester, username, &now)?;
    links::increment_access_count(conn, link.id)?;
    Ok(())
}

/// Record a delivery that had no link behind it (OTP or secret codeword).
/// Only the folder-level log applies.
pub fn record_folder_access(
    conn: &DbConnection,
    folder_id: i64,
    requester: i64,
    username: Option<&str>,
) -> AppResult<()> {
    links::insert_folder_access(conn, requester, username, folder_id, &Utc::now().to_rfc3339())?;
    Ok(())
}

/// Tell the administrator a single-use link was just redeemed.
///
/// Fire-and-forget: runs on its own task and swallows every failure, so a
/// flaky notification can never fail or delay the delivery that triggered
/// it.
pub fn notify_redemption(
    pool: DbPool,
    sender: Arc<dyn ContentSender>,
    link_id: i64,
    token: String,
    folder_name: String,
    requester: i64,
    username: Option<String>,
) {
    tokio::spawn(async move {
        let visitors = match pool.get() {
            Ok(conn) => links::unique_visitor_count(&conn, link_id).unwrap_or(0),
            Err(e) => {
                log::warn!("Redemption notice: pool unavailable: {}", e);
                0
            }
        };

        let who = username
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| format!("id {}", requester));
        let text = format!(
            "Single-use link {}… for \"{}\" was redeemed by {} ({} unique visitors).",
            &token[..token.len().min(8)],
            folder_name,
            who,
            visitors
        );

        if let Err(e) = sender.send_text(*config::ADMIN_ID, &text).await {
            log::warn!("Failed to send redemption notice: {}", e);
        }
    });
}
