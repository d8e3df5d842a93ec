//! One-time-password issue and verification for OTP-gated folders.

use chrono::{DateTime, Duration, Utc};

use crate::core::config::access::{MAX_OTP_ATTEMPTS, OTP_EXPIRY_MAX_MINUTES, OTP_EXPIRY_MIN_MINUTES};
use crate::core::token::generate_otp;
use crate::core::AppResult;
use crate::storage::folders::FolderRecord;
use crate::storage::{otp, DbConnection};

/// Result of checking a submitted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Accepted,
    /// Wrong code; `remaining_attempts` left before the code is revoked.
    Rejected { remaining_attempts: u8 },
    /// The pending code expired before verification.
    Expired,
    /// The attempt budget ran out; the code was revoked.
    LockedOut,
    /// No code is pending for this folder/user pair.
    NoPending,
}

/// Issue a fresh code for `user_id` on an OTP-gated folder.
///
/// Any older pending code for the pair is revoked by the insert, so only
/// the newest code ever verifies. Returns the code and its expiry.
pub fn issue_otp(
    conn: &DbConnection,
    folder: &FolderRecord,
    user_id: i64,
) -> AppResult<(String, DateTime<Utc>)> {
    let minutes = folder
        .otp_expiry_minutes
        .unwrap_or(OTP_EXPIRY_MIN_MINUTES)
        .clamp(OTP_EXPIRY_MIN_MINUTES, OTP_EXPIRY_MAX_MINUTES);

    let code = generate_otp();
    let now = Utc::now();
    let expires_at = now + Duration::minutes(minutes);

    otp::insert_otp(conn, folder.id, user_id, &code, &now.to_rfc3339(), &expires_at.to_rfc3339())?;
    log::info!("Issued OTP for folder {} to user {}, valid {} min", folder.id, user_id, minutes);

    Ok((code, expires_at))
}

/// Verify a submitted code against the pending one.
///
/// Expiry is checked before the code itself, so a correct-but-late entry
/// still reads as expired. `attempts_so_far` counts earlier wrong entries
/// in this session (the caller tracks them); the budget is
/// [`MAX_OTP_ATTEMPTS`] in total.
pub fn verify_otp(
    conn: &DbConnection,
    folder_id: i64,
    user_id: i64,
    submitted: &str,
    attempts_so_far: u8,
) -> AppResult<VerifyOutcome> {
    let pending = match otp::get_pending_otp(conn, folder_id, user_id)? {
        Some(record) => record,
        None => return Ok(VerifyOutcome::NoPending),
    };

    let expired = match DateTime::parse_from_rfc3339(&pending.expires_at) {
        Ok(ts) => Utc::now() > ts.with_timezone(&Utc),
        Err(_) => true,
    };
    if expired {
        otp::mark_otp_expired(conn, pending.id)?;
        return Ok(VerifyOutcome::Expired);
    }

    if submitted.trim() != pending.code {
        let attempts = attempts_so_far + 1;
        if attempts >= MAX_OTP_ATTEMPTS {
            otp::mark_otp_revoked(conn, pending.id)?;
            log::warn!("OTP attempt budget exhausted for user {} on folder {}", user_id, folder_id);
            return Ok(VerifyOutcome::LockedOut);
        }
        return Ok(VerifyOutcome::Rejected {
            remaining_attempts: MAX_OTP_ATTEMPTS - attempts,
        });
    }

    otp::mark_otp_used(conn, pending.id)?;
    Ok(VerifyOutcome::Accepted)
}
