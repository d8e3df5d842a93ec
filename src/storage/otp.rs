//! Database operations for per-folder one-time passwords.

use rusqlite::{params, OptionalExtension};

use crate::storage::db::DbConnection;

/// A pending or settled OTP row.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: i64,
    pub folder_id: i64,
    pub user_id: i64,
    pub code: String,
    pub created_at: String,
    pub expires_at: String,
    pub status: String,
}

fn parse_otp(row: &rusqlite::Row<'_>) -> rusqlite::Result<OtpRecord> {
    Ok(OtpRecord {
        id: row.get(0)?,
        folder_id: row.get(1)?,
        user_id: row.get(2)?,
        code: row.get(3)?,
        created_at: row.get(4)?,
        expires_at: row.get(5)?,
        status: row.get(6)?,
    })
}

/// Store a freshly issued code after revoking any still-pending one for
/// the same folder and user. At most one pending code per pair.
pub fn insert_otp(
    conn: &DbConnection,
    folder_id: i64,
    user_id: i64,
    code: &str,
    now: &str,
    expires_at: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "UPDATE folder_otps SET status = 'revoked'
         WHERE folder_id = ?1 AND user_id = ?2 AND status = 'pending'",
        params![folder_id, user_id],
    )?;
    conn.execute(
        "INSERT INTO folder_otps (folder_id, user_id, code, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![folder_id, user_id, code, now, expires_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The single pending code for this folder/user pair, if any.
pub fn get_pending_otp(
    conn: &DbConnection,
    folder_id: i64,
    user_id: i64,
) -> rusqlite::Result<Option<OtpRecord>> {
    conn.query_row(
        "SELECT id, folder_id, user_id, code, created_at, expires_at, status
         FROM folder_otps
         WHERE folder_id = ?1 AND user_id = ?2 AND status = 'pending'
         ORDER BY id DESC LIMIT 1",
        params![folder_id, user_id],
        parse_otp,
    )
    .optional()
}

pub fn mark_otp_used(conn: &DbConnection, otp_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folder_otps SET status = 'used' WHERE id = ?1",
        params![otp_id],
    )?;
    Ok(())
}

pub fn mark_otp_expired(conn: &DbConnection, otp_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folder_otps SET status = 'expired' WHERE id = ?1",
        params![otp_id],
    )?;
    Ok(())
}

/// Revoke a code outright, used when the attempt budget runs out.
pub fn mark_otp_revoked(conn: &DbConnection, otp_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folder_otps SET status = 'revoked' WHERE id = ?1",
        params![otp_id],
    )?;
    Ok(())
}

/// Drop settled rows and flip long-expired pending ones. Keeps the table
/// from growing without bound between verifications.
pub fn purge_stale_otps(conn: &DbConnection, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE folder_otps SET status = 'expired'
         WHERE status = 'pending' AND expires_at < ?1",
        params![now],
    )?;
    let removed = conn.execute(
        "DELETE FROM folder_otps WHERE status IN ('used', 'expired', 'revoked')",
        [],
    )?;
    Ok(removed)
}
