use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Telegram user id of the administrator receiving redemption and OTP
/// notifications. Read from ADMIN_ID environment variable.
pub static ADMIN_ID: Lazy<i64> = Lazy::new(|| {
    env::var("ADMIN_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: foldervault.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "foldervault.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: foldervault.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "foldervault.log".to_string()));

/// Access gate configuration
pub mod access {
    /// Wrong-password budget for one access attempt. Exhausting it clears
    /// the session; a fresh /start restarts the counter.
    pub const MAX_PASSWORD_ATTEMPTS: u8 = 3;

    /// Wrong-code budget for one OTP entry flow. Exhausting it marks the
    /// pending code revoked.
    pub const MAX_OTP_ATTEMPTS: u8 = 3;

    /// Bounds for the per-folder OTP validity window (minutes).
    pub const OTP_EXPIRY_MIN_MINUTES: i64 = 1;
    pub const OTP_EXPIRY_MAX_MINUTES: i64 = 60;

    /// Access-link token length (62-symbol alphabet, ~190 bits).
    pub const TOKEN_LEN: usize = 32;
}

/// Background sweep configuration
pub mod sweep {
    use super::Duration;

    /// Interval between expired/revoked link purges (daily)
    pub const LINK_PURGE_SECS: u64 = 86_400;

    /// Interval between trending purges (hourly)
    pub const TRENDING_PURGE_SECS: u64 = 3_600;

    /// Interval between poll close checks (every 5 minutes)
    pub const POLL_CLOSE_SECS: u64 = 300;

    /// Interval between quote-of-the-day broadcasts (daily)
    pub const QOTD_SECS: u64 = 86_400;

    pub fn link_purge_interval() -> Duration {
        Duration::from_secs(LINK_PURGE_SECS)
    }

    pub fn trending_purge_interval() -> Duration {
        Duration::from_secs(TRENDING_PURGE_SECS)
    }

    pub fn poll_close_interval() -> Duration {
        Duration::from_secs(POLL_CLOSE_SECS)
    }

    pub fn qotd_interval() -> Duration {
        Duration::from_secs(QOTD_SECS)
    }
}
