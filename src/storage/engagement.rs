//! Database operations for trending entries, polls and the daily quote.

use rusqlite::{params, OptionalExtension};

use crate::storage::db::DbConnection;

#[derive(Debug, Clone)]
pub struct TrendingEntry {
    pub id: i64,
    pub folder_id: i64,
    pub label: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollRecord {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct QuoteRecord {
    pub id: i64,
    pub text: String,
    pub author: Option<String>,
}

pub fn add_trending(
    conn: &DbConnection,
    folder_id: i64,
    label: &str,
    added_by: i64,
    now: &str,
    expires_at: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO trending (folder_id, label, added_by, added_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![folder_id, label, added_by, now, expires_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_trending(conn: &DbConnection, now: &str) -> rusqlite::Result<Vec<TrendingEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, folder_id, label, expires_at FROM trending
         WHERE expires_at IS NULL OR expires_at >= ?1
         ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map(params![now], |row| {
        Ok(TrendingEntry {
            id: row.get(0)?,
            folder_id: row.get(1)?,
            label: row.get(2)?,
            expires_at: row.get(3)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Remove trending entries past their expiry. Returns the count removed.
pub fn purge_expired_trending(conn: &DbConnection, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM trending WHERE expires_at IS NOT NULL AND expires_at < ?1",
        params![now],
    )
}

pub fn create_poll(
    conn: &DbConnection,
    question: &str,
    options: &[&str],
    created_by: i64,
    now: &str,
    closes_at: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO polls (question, option_a, option_b, option_c, option_d, created_by, created_at, closes_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            question,
            options.first(),
            options.get(1),
            options.get(2),
            options.get(3),
            created_by,
            now,
            closes_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record a vote; one per user per poll, first vote wins.
pub fn record_vote(
    conn: &DbConnection,
    poll_id: i64,
    user_id: i64,
    choice: &str,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO poll_votes (poll_id, user_id, choice, voted_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![poll_id, user_id, choice, now],
    )?;
    Ok(changed > 0)
}

/// Open polls past their close time. The sweep closes these and tallies.
pub fn overdue_polls(conn: &DbConnection, now: &str) -> rusqlite::Result<Vec<PollRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, question, option_a, option_b, option_c, option_d, closes_at, status
         FROM polls WHERE status = 'open' AND closes_at < ?1",
    )?;
    let rows = stmt.query_map(params![now], |row| {
        let options = [
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ]
        .into_iter()
        .flatten()
        .collect();
        Ok(PollRecord {
            id: row.get(0)?,
            question: row.get(1)?,
            options,
            closes_at: row.get(6)?,
            status: row.get(7)?,
        })
    })?;

    let mut polls = Vec::new();
    for row in rows {
        polls.push(row?);
    }
    Ok(polls)
}

pub fn close_poll(conn: &DbConnection, poll_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE polls SET status = 'closed', result_sent = 1 WHERE id = ?1",
        params![poll_id],
    )?;
    Ok(())
}

/// Vote tally for one poll as `(choice, count)` pairs, highest first.
pub fn poll_tally(conn: &DbConnection, poll_id: i64) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT choice, COUNT(*) FROM poll_votes WHERE poll_id = ?1
         GROUP BY choice ORDER BY COUNT(*) DESC",
    )?;
    let rows = stmt.query_map(params![poll_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut tally = Vec::new();
    for row in rows {
        tally.push(row?);
    }
    Ok(tally)
}

pub fn add_quote(
    conn: &DbConnection,
    text: &str,
    author: Option<&str>,
    added_by: i64,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO quotes (text, author, added_by, added_at) VALUES (?1, ?2, ?3, ?4)",
        params![text, author, added_by, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A uniformly random quote from the pool.
pub fn next_quote(conn: &DbConnection) -> rusqlite::Result<Option<QuoteRecord>> {
    conn.query_row(
        "SELECT id, text, author FROM quotes ORDER BY RANDOM() LIMIT 1",
        [],
        |row| {
            Ok(QuoteRecord {
                id: row.get(0)?,
                text: row.get(1)?,
                author: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn mark_quote_sent(conn: &DbConnection, quote_id: i64, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE quotes SET last_sent = ?1 WHERE id = ?2",
        params![now, quote_id],
    )?;
    Ok(())
}
