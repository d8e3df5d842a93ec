use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    build_pool(manager)
}

/// Create an in-memory pool sharing one database across connections.
///
/// Used by tests; `cache=shared` keeps every pooled connection on the same
/// in-memory database so concurrent redemption attempts actually contend.
/// Each call gets its own named database, so pools built in parallel tests
/// never see each other's rows.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let uri = format!("file:memdb-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    let manager = SqliteConnectionManager::file(uri).with_flags(
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_URI,
    );
    build_pool(manager)
}

fn build_pool(manager: SqliteConnectionManager) -> Result<DbPool, r2d2::Error> {
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = init_schema(&conn) {
        log::warn!("Failed to initialize schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create every table and index the bot relies on.
///
/// All statements are `IF NOT EXISTS`, so this is safe to run on every
/// startup against an existing database.
fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS folders (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT UNIQUE,
            created_at          TEXT,
            forwardable         INTEGER DEFAULT 1,
            auto_delete_minutes INTEGER,
            password            TEXT,
            note                TEXT,
            pinned              INTEGER DEFAULT 0,
            is_secret           INTEGER DEFAULT 0,
            secret_code         TEXT,
            otp_required        INTEGER DEFAULT 0,
            otp_expiry_minutes  INTEGER
        );

        CREATE TABLE IF NOT EXISTS files (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id    INTEGER,
            file_id      TEXT,
            file_type    TEXT,
            file_size    INTEGER,
            uploaded_at  TEXT,
            text_content TEXT
        );

        CREATE TABLE IF NOT EXISTS links (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id    INTEGER,
            token        TEXT UNIQUE,
            expiry       TEXT,
            revoked      INTEGER DEFAULT 0,
            created_at   TEXT,
            access_count INTEGER DEFAULT 0,
            single_use   INTEGER DEFAULT 0,
            used_by      INTEGER,
            used_at      TEXT
        );

        CREATE TABLE IF NOT EXISTS logs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER,
            username    TEXT,
            folder_id   INTEGER,
            accessed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS link_access_log (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            link_id     INTEGER,
            folder_id   INTEGER,
            user_id     INTEGER,
            username    TEXT,
            accessed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS folder_otps (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id  INTEGER,
            user_id    INTEGER,
            code       TEXT,
            created_at TEXT,
            expires_at TEXT,
            status     TEXT DEFAULT 'pending'
        );

        CREATE TABLE IF NOT EXISTS admins (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id        INTEGER UNIQUE,
            username       TEXT,
            added_by       INTEGER,
            added_at       TEXT,
            is_super_admin INTEGER DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS subscribers (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER UNIQUE,
            username      TEXT,
            first_name    TEXT,
            subscribed_at TEXT,
            last_active   TEXT,
            banned        INTEGER DEFAULT 0,
            ban_reason    TEXT
        );

        CREATE TABLE IF NOT EXISTS trending (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id  INTEGER,
            label      TEXT,
            added_by   INTEGER,
            added_at   TEXT,
            expires_at TEXT,
            sort_order INTEGER DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS polls (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            question    TEXT,
            option_a    TEXT,
            option_b    TEXT,
            option_c    TEXT,
            option_d    TEXT,
            created_by  INTEGER,
            created_at  TEXT,
            closes_at   TEXT,
            status      TEXT DEFAULT 'open',
            result_sent INTEGER DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS poll_votes (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            poll_id  INTEGER,
            user_id  INTEGER,
            choice   TEXT,
            voted_at TEXT,
            UNIQUE(poll_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS quotes (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            text      TEXT,
            author    TEXT,
            added_by  INTEGER,
            added_at  TEXT,
            last_sent TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_folder_name     ON folders(name);
        CREATE INDEX IF NOT EXISTS idx_link_token      ON links(token);
        CREATE INDEX IF NOT EXISTS idx_logs_folder     ON logs(folder_id);
        CREATE INDEX IF NOT EXISTS idx_link_access     ON link_access_log(link_id);
        CREATE INDEX IF NOT EXISTS idx_admin_user      ON admins(user_id);
        CREATE INDEX IF NOT EXISTS idx_subscriber_user ON subscribers(user_id);
        CREATE INDEX IF NOT EXISTS idx_trending        ON trending(folder_id);
        CREATE INDEX IF NOT EXISTS idx_poll_votes      ON poll_votes(poll_id, user_id);
        CREATE INDEX IF NOT EXISTS idx_quotes          ON quotes(last_sent);
        CREATE INDEX IF NOT EXISTS idx_folder_otps     ON folder_otps(folder_id, user_id);",
    )?;

    Ok(())
}
