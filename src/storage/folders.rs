//! Database operations for folders and their content items.

use rusqlite::{params, OptionalExtension};

use crate::storage::db::DbConnection;

/// A folder row from the database.
#[derive(Debug, Clone)]
pub struct FolderRecord {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub forwardable: bool,
    pub auto_delete_minutes: Option<i64>,
    pub password: Option<String>,
    pub note: Option<String>,
    pub pinned: bool,
    pub is_secret: bool,
    pub secret_code: Option<String>,
    pub otp_required: bool,
    pub otp_expiry_minutes: Option<i64>,
}

/// One unit of deliverable payload belonging to exactly one folder.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: i64,
    pub folder_id: i64,
    pub file_id: Option<String>,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub text_content: Option<String>,
}

fn parse_folder(row: &rusqlite::Row<'_>) -> rusqlite::Result<FolderRecord> {
    Ok(FolderRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        forwardable: row.get::<_, i64>(3)? != 0,
        auto_delete_minutes: row.get(4)?,
        password: row.get(5)?,
        note: row.get(6)?,
        pinned: row.get::<_, i64>(7)? != 0,
        is_secret: row.get::<_, i64>(8)? != 0,
        secret_code: row.get(9)?,
        otp_required: row.get::<_, i64>(10)? != 0,
        otp_expiry_minutes: row.get(11)?,
    })
}

const FOLDER_COLUMNS: &str = "id, name, created_at, forwardable, auto_delete_minutes, password, note, \
     pinned, is_secret, secret_code, otp_required, otp_expiry_minutes";

/// Create a folder. Returns the new folder id.
///
/// Names are UNIQUE at the storage layer (case-sensitive); a duplicate
/// insert surfaces as a constraint violation.
pub fn create_folder(conn: &DbConnection, name: &str, now: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO folders (name, created_at) VALUES (?1, ?2)",
        params![name, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_folder(conn: &DbConnection, folder_id: i64) -> rusqlite::Result<Option<FolderRecord>> {
    conn.query_row(
        &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?1"),
        params![folder_id],
        parse_folder,
    )
    .optional()
}

/// Look up a secret folder by its codeword, case-insensitively.
///
/// Only folders with `is_secret=1` participate; a match grants the keyless
/// entry path (no link, no expiry, no revocation).
pub fn find_secret_folder(conn: &DbConnection, codeword: &str) -> rusqlite::Result<Option<FolderRecord>> {
    conn.query_row(
        &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE is_secret = 1 AND LOWER(secret_code) = LOWER(?1)"),
        params![codeword],
        parse_folder,
    )
    .optional()
}

/// Content items in insertion order (oldest first), which is delivery order.
pub fn list_content(conn: &DbConnection, folder_id: i64) -> rusqlite::Result<Vec<ContentItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, folder_id, file_id, file_type, file_size, text_content
         FROM files WHERE folder_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![folder_id], |row| {
        Ok(ContentItem {
            id: row.get(0)?,
            folder_id: row.get(1)?,
            file_id: row.get(2)?,
            file_type: row.get(3)?,
            file_size: row.get(4)?,
            text_content: row.get(5)?,
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Append a content item to a folder.
pub fn add_content(
    conn: &DbConnection,
    folder_id: i64,
    file_id: Option<&str>,
    file_type: &str,
    file_size: Option<i64>,
    text_content: Option<&str>,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO files (folder_id, file_id, file_type, file_size, uploaded_at, text_content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![folder_id, file_id, file_type, file_size, now, text_content],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Set or clear the folder password (stored as plaintext, compared exactly).
pub fn set_password(conn: &DbConnection, folder_id: i64, password: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folders SET password = ?1 WHERE id = ?2",
        params![password, folder_id],
    )?;
    Ok(())
}

pub fn set_forwardable(conn: &DbConnection, folder_id: i64, forwardable: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folders SET forwardable = ?1 WHERE id = ?2",
        params![forwardable as i64, folder_id],
    )?;
    Ok(())
}

pub fn set_auto_delete(conn: &DbConnection, folder_id: i64, minutes: Option<i64>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folders SET auto_delete_minutes = ?1 WHERE id = ?2",
        params![minutes, folder_id],
    )?;
    Ok(())
}

/// Mark a folder as secret with a codeword, or clear the secret entry path.
pub fn set_secret(conn: &DbConnection, folder_id: i64, code: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE folders SET is_secret = ?1, secret_code = ?2 WHERE id = ?3",
        params![code.is_some() as i64, code, folder_id],
    )?;
    Ok(())
}

/// Toggle the OTP requirement. `expiry_minutes` applies when enabling.
pub fn set_otp_requirement(
    conn: &DbConnection,
    folder_id: i64,
    expiry_minutes: Option<i64>,
) -> rusqlite::Result<()> {
    match expiry_minutes {
        Some(mins) => conn.execute(
            "UPDATE folders SET otp_required = 1, otp_expiry_minutes = ?1 WHERE id = ?2",
            params![mins, folder_id],
        )?,
        None => conn.execute(
            "UPDATE folders SET otp_required = 0, otp_expiry_minutes = NULL WHERE id = ?1",
            params![folder_id],
        )?,
    };
    Ok(())
}

/// Delete a folder and everything hanging off it: content items, links,
/// access logs and pending OTPs. Done as a batch so a half-deleted folder
/// never survives a crash between statements.
pub fn delete_folder(conn: &DbConnection, folder_id: i64) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "BEGIN;
         DELETE FROM files WHERE folder_id = {id};
         DELETE FROM links WHERE folder_id = {id};
         DELETE FROM logs WHERE folder_id = {id};
         DELETE FROM link_access_log WHERE folder_id = {id};
         DELETE FROM folder_otps WHERE folder_id = {id};
         DELETE FROM folders WHERE id = {id};
         COMMIT;",
        id = folder_id
    ))?;
    Ok(())
}
