//! In-memory per-user interaction state.
//!
//! A user is in at most one pending interaction at a time; starting a new
//! one replaces the old. State lives only for the process lifetime, so a
//! restart simply asks the user to follow their link again.

use dashmap::DashMap;
use once_cell::sync::Lazy;

/// What the bot is currently waiting for from a given user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Folder password prompt; `token` is kept so delivery can resume on
    /// the same link after the password clears.
    AwaitingPassword {
        folder_id: i64,
        token: Option<String>,
        attempts: u8,
    },
    /// OTP prompt for a folder the user already passed the other gates on.
    AwaitingOtp { folder_id: i64, attempts: u8 },
}

static SESSIONS: Lazy<DashMap<i64, Pending>> = Lazy::new(DashMap::new);

pub fn set(user_id: i64, state: Pending) {
    SESSIONS.insert(user_id, state);
}

pub fn get(user_id: i64) -> Option<Pending> {
    SESSIONS.get(&user_id).map(|entry| entry.clone())
}

pub fn clear(user_id: i64) {
    SESSIONS.remove(&user_id);
}

/// Bump the attempt counter for the user's pending prompt and return the
/// new count. Returns `None` when no prompt is pending.
pub fn record_failed_attempt(user_id: i64) -> Option<u8> {
    let mut entry = SESSIONS.get_mut(&user_id)?;
    let attempts = match entry.value_mut() {
        Pending::AwaitingPassword { attempts, .. } | Pending::AwaitingOtp { attempts, .. } => {
            *attempts += 1;
            *attempts
        }
    };
    Some(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Unique ids per test; the map is process-global.

    #[test]
    fn test_new_state_replaces_old() {
        set(9001, Pending::AwaitingPassword { folder_id: 1, token: None, attempts: 0 });
        set(9001, Pending::AwaitingOtp { folder_id: 2, attempts: 0 });
        assert_eq!(get(9001), Some(Pending::AwaitingOtp { folder_id: 2, attempts: 0 }));
        clear(9001);
    }

    #[test]
    fn test_failed_attempts_accumulate() {
        set(9002, Pending::AwaitingOtp { folder_id: 1, attempts: 0 });
        assert_eq!(record_failed_attempt(9002), Some(1));
        assert_eq!(record_failed_attempt(9002), Some(2));
        assert_eq!(record_failed_attempt(9002), Some(3));
        clear(9002);
        assert_eq!(record_failed_attempt(9002), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        clear(9003);
        clear(9003);
        assert_eq!(get(9003), None);
    }
}
