//! The gate evaluator: a pure decision function over a link and its folder.
//!
//! Every access path (deep link, secret codeword) funnels through
//! [`evaluate`], which inspects only the values handed to it. No I/O
//! happens here; callers load the records and act on the decision.

use chrono::{DateTime, Utc};

use crate::storage::folders::FolderRecord;
use crate::storage::links::LinkRecord;

/// Outcome of a gate check, in strict precedence order. When several
/// conditions hold at once the earliest variant wins: a revoked link
/// reports `Revoked` even if it has also expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Token unknown, or the link points at a folder that no longer exists.
    Invalid,
    /// The link was revoked; terminal, nothing un-revokes it.
    Revoked,
    /// Single-use link already claimed by a different requester.
    RedeemedByOther,
    /// The link's expiry timestamp is in the past.
    Expired,
    /// Folder has a password the requester has not presented this session.
    PasswordRequired,
    /// Folder requires a one-time password the requester has not cleared.
    OtpRequired,
    Allow,
}

/// What the requester has already proven in this session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionProof {
    pub password_verified: bool,
    pub otp_verified: bool,
}

/// Evaluate link-based access for `requester` at instant `now`.
pub fn evaluate(
    link: Option<&LinkRecord>,
    folder: Option<&FolderRecord>,
    requester: i64,
    now: DateTime<Utc>,
    proof: SessionProof,
) -> GateDecision {
    let link = match link {
        Some(l) => l,
        None => return GateDecision::Invalid,
    };
    let folder = match folder {
        Some(f) => f,
        None => return GateDecision::Invalid,
    };

    if link.revoked {
        return GateDecision::Revoked;
    }

    if link.single_use {
        if let Some(claimant) = link.used_by {
            if claimant != requester {
                return GateDecision::RedeemedByOther;
            }
        }
    }

    if let Some(expiry) = &link.expiry {
        if is_expired(expiry, now) {
            return GateDecision::Expired;
        }
    }

    folder_gates(folder, proof)
}

/// Evaluate codeword-based access to a secret folder. There is no link, so
/// revocation, redemption and expiry do not apply; the folder's own gates
/// still do.
pub fn evaluate_secret(folder: &FolderRecord, proof: SessionProof) -> GateDecision {
    folder_gates(folder, proof)
}

fn folder_gates(folder: &FolderRecord, proof: SessionProof) -> GateDecision {
    if folder.password.is_some() && !proof.password_verified {
        return GateDecision::PasswordRequired;
    }
    if folder.otp_required && !proof.otp_verified {
        return GateDecision::OtpRequired;
    }
    GateDecision::Allow
}

/// Strict comparison: a link is expired only once `now` is past the
/// stored instant, so an access at exactly the expiry moment still passes.
fn is_expired(expiry: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(expiry) {
        Ok(ts) => now > ts.with_timezone(&Utc),
        Err(_) => {
            log::warn!("Unparseable link expiry '{}', treating as expired", expiry);
            true
        }
    }
}
