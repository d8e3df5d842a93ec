//! Database operations for admins and subscribers.

use rusqlite::{params, OptionalExtension};

use crate::storage::db::DbConnection;

#[derive(Debug, Clone)]
pub struct SubscriberRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub banned: bool,
}

pub fn is_admin(conn: &DbConnection, user_id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM admins WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn is_super_admin(conn: &DbConnection, user_id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM admins WHERE user_id = ?1 AND is_super_admin = 1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn add_admin(
    conn: &DbConnection,
    user_id: i64,
    username: Option<&str>,
    added_by: i64,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO admins (user_id, username, added_by, added_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, username, added_by, now],
    )?;
    Ok(changed > 0)
}

pub fn remove_admin(conn: &DbConnection, user_id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM admins WHERE user_id = ?1 AND is_super_admin = 0",
        params![user_id],
    )?;
    Ok(changed > 0)
}

pub fn is_banned(conn: &DbConnection, user_id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM subscribers WHERE user_id = ?1 AND banned = 1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// A ban keeps a user out unless they are also an admin; admins can
/// always reach the bot.
pub fn is_blocked(conn: &DbConnection, user_id: i64) -> rusqlite::Result<bool> {
    Ok(is_banned(conn, user_id)? && !is_admin(conn, user_id)?)
}

pub fn set_banned(
    conn: &DbConnection,
    user_id: i64,
    banned: bool,
    reason: Option<&str>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE subscribers SET banned = ?1, ban_reason = ?2 WHERE user_id = ?3",
        params![banned as i64, reason, user_id],
    )?;
    Ok(changed > 0)
}

/// Upsert a subscriber row and refresh `last_active`. Every inbound update
/// routes through this so the broadcast roster stays current.
pub fn track_subscriber(
    conn: &DbConnection,
    user_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO subscribers (user_id, username, first_name, subscribed_at, last_active)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             username = excluded.username,
             first_name = excluded.first_name,
             last_active = excluded.last_active",
        params![user_id, username, first_name, now],
    )?;
    Ok(())
}

/// All non-banned subscribers, for broadcasts and the daily quote.
pub fn active_subscribers(conn: &DbConnection) -> rusqlite::Result<Vec<SubscriberRecord>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, username, first_name, banned FROM subscribers WHERE banned = 0",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SubscriberRecord {
            user_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            banned: row.get::<_, i64>(3)? != 0,
        })
    })?;

    let mut subs = Vec::new();
    for row in rows {
        subs.push(row?);
    }
    Ok(subs)
}
