//! Database operations for access links and the access ledger.

use rusqlite::{params, OptionalExtension};

use crate::storage::db::DbConnection;

/// An access-link row from the database.
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub id: i64,
    pub folder_id: i64,
    pub token: String,
    pub expiry: Option<String>,
    pub revoked: bool,
    pub created_at: String,
    pub access_count: i64,
    pub single_use: bool,
    pub used_by: Option<i64>,
    pub used_at: Option<String>,
}

fn parse_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkRecord> {
    Ok(LinkRecord {
        id: row.get(0)?,
        folder_id: row.get(1)?,
        token: row.get(2)?,
        expiry: row.get(3)?,
        revoked: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        access_count: row.get(6)?,
        single_use: row.get::<_, i64>(7)? != 0,
        used_by: row.get(8)?,
        used_at: row.get(9)?,
    })
}

const LINK_COLUMNS: &str =
    "id, folder_id, token, expiry, revoked, created_at, access_count, single_use, used_by, used_at";

/// Insert a new access link. Returns the new link id.
pub fn create_link(
    conn: &DbConnection,
    folder_id: i64,
    token: &str,
    expiry: Option<&str>,
    single_use: bool,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO links (folder_id, token, expiry, single_use, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![folder_id, token, expiry, single_use as i64, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_link_by_token(conn: &DbConnection, token: &str) -> rusqlite::Result<Option<LinkRecord>> {
    conn.query_row(
        &format!("SELECT {LINK_COLUMNS} FROM links WHERE token = ?1"),
        params![token],
        parse_link,
    )
    .optional()
}

pub fn list_links_for_folder(conn: &DbConnection, folder_id: i64) -> rusqlite::Result<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINK_COLUMNS} FROM links WHERE folder_id = ?1 ORDER BY id DESC"
    ))?;
    let rows = stmt.query_map(params![folder_id], parse_link)?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

pub fn revoke_link(conn: &DbConnection, token: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE links SET revoked = 1 WHERE token = ?1",
        params![token],
    )?;
    Ok(changed > 0)
}

/// Atomically claim a single-use link for `user_id`.
///
/// The WHERE clause is the whole concurrency story: the update only lands
/// on a still-unclaimed, unrevoked single-use row, so of N racing callers
/// exactly one sees an affected-row count of 1. Losers get `false` and are
/// turned away without a second query deciding anything.
pub fn consume_single_use(
    conn: &DbConnection,
    token: &str,
    user_id: i64,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE links SET used_by = ?1, used_at = ?2
         WHERE token = ?3 AND single_use = 1 AND used_by IS NULL AND revoked = 0",
        params![user_id, now, token],
    )?;
    Ok(changed > 0)
}

pub fn increment_access_count(conn: &DbConnection, link_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE links SET access_count = access_count + 1 WHERE id = ?1",
        params![link_id],
    )?;
    Ok(())
}

/// Record a folder access in the audit log.
pub fn insert_folder_access(
    conn: &DbConnection,
    user_id: i64,
    username: Option<&str>,
    folder_id: i64,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO logs (user_id, username, folder_id, accessed_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, username, folder_id, now],
    )?;
    Ok(())
}

/// Record a per-link access (also feeds the unique-visitor count).
pub fn insert_link_access(
    conn: &DbConnection,
    link_id: i64,
    folder_id: i64,
    user_id: i64,
    username: Option<&str>,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO link_access_log (link_id, folder_id, user_id, username, accessed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![link_id, folder_id, user_id, username, now],
    )?;
    Ok(())
}

/// Distinct users that ever opened this link.
pub fn unique_visitor_count(conn: &DbConnection, link_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM link_access_log WHERE link_id = ?1",
        params![link_id],
        |row| row.get(0),
    )
}

/// Delete expired and revoked links. Returns `(expired, revoked)` counts.
///
/// Expiry comparison happens in SQL so the sweep and the gate agree on
/// the timestamp format; rows with a NULL expiry never expire.
pub fn purge_expired_and_revoked(conn: &DbConnection, now: &str) -> rusqlite::Result<(usize, usize)> {
    let expired = conn.execute(
        "DELETE FROM links WHERE expiry IS NOT NULL AND expiry < ?1 AND revoked = 0",
        params![now],
    )?;
    let revoked = conn.execute("DELETE FROM links WHERE revoked = 1", [])?;
    Ok((expired, revoked))
}
