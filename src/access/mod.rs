//! Access control: gate evaluation, session state and the OTP sub-flow.

pub mod gate;
pub mod otp;
pub mod session;

use chrono::Utc;

use crate::core::AppResult;
use crate::storage::folders::FolderRecord;
use crate::storage::links::LinkRecord;
use crate::storage::{folders, links, DbConnection};

pub use gate::{GateDecision, SessionProof};

/// Load the link and folder behind a token and run the gate.
///
/// Returns the decision together with the records so the caller can act on
/// an `Allow` (or prompt on `PasswordRequired`/`OtpRequired`) without a
/// second lookup.
pub fn check_token(
    conn: &DbConnection,
    token: &str,
    requester: i64,
    proof: SessionProof,
) -> AppResult<(GateDecision, Option<LinkRecord>, Option<FolderRecord>)> {
    let link = links::get_link_by_token(conn, token)?;
    let folder = match &link {
        Some(l) => folders::get_folder(conn, l.folder_id)?,
        None => None,
    };

    let decision = gate::evaluate(link.as_ref(), folder.as_ref(), requester, Utc::now(), proof);
    Ok((decision, link, folder))
}

/// Match a plain-text codeword against secret folders and run the
/// folder-level gates on a hit.
pub fn check_codeword(
    conn: &DbConnection,
    codeword: &str,
    proof: SessionProof,
) -> AppResult<Option<(GateDecision, FolderRecord)>> {
    let folder = match folders::find_secret_folder(conn, codeword)? {
        Some(f) => f,
        None => return Ok(None),
    };
    let decision = gate::evaluate_secret(&folder, proof);
    Ok(Some((decision, folder)))
}
