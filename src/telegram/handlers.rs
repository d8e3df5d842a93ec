//! Dispatcher schema and handler chain.
//!
//! These handlers cover the entry points that drive the access core:
//! deep links, pending password/OTP prompts, secret codewords and the
//! cancel/OTP callbacks.

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

use crate::access::otp::{verify_otp, VerifyOutcome};
use crate::access::{self, gate::GateDecision, session, SessionProof};
use crate::access::session::Pending;
use crate::core::config::{self, access::MAX_PASSWORD_ATTEMPTS};
use crate::delivery::{DeliveryEngine, DeliveryResult, Recipient};
use crate::storage::folders::FolderRecord;
use crate::storage::links::LinkRecord;
use crate::storage::{folders, roster, DbPool};
use crate::telegram::bot::Command;
use crate::telegram::notifications::{notify_admin_text, notify_otp_request};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: DbPool,
    pub engine: Arc<DeliveryEngine>,
}

/// Build the dispatcher schema. The same tree serves production and the
/// integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callbacks = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callbacks))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                match cmd {
                    Command::Start(payload) => {
                        if let Err(e) = handle_start(&bot, &msg, &deps, payload.trim()).await {
                            report_failure(&bot, &msg, "start", e).await;
                        }
                    }
                    Command::Help => {
                        bot.send_message(
                            msg.chat.id,
                            "Open a folder link you were given, or type its secret codeword. \
                             Use /cancel to stop an in-progress delivery.",
                        )
                        .await?;
                    }
                    Command::Cancel => {
                        let user_id = match &msg.from {
                            Some(u) => u.id.0 as i64,
                            None => return Ok(()),
                        };
                        let text = if deps.engine.cancels().cancel(user_id) {
                            "Cancelling delivery."
                        } else {
                            "No delivery in progress."
                        };
                        bot.send_message(msg.chat.id, text).await?;
                    }
                }
                Ok(())
            }
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text().map(|t| !t.starts_with('/')).unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user = match &msg.from {
                    Some(u) => u.clone(),
                    None => return Ok(()),
                };
                let user_id = user.id.0 as i64;
                let text = msg.text().unwrap_or_default().trim().to_owned();

                let outcome = match session::get(user_id) {
                    Some(Pending::AwaitingPassword { folder_id, token, .. }) => {
                        handle_password_entry(&bot, &msg, &deps, folder_id, token, &text).await
                    }
                    Some(Pending::AwaitingOtp { folder_id, attempts }) => {
                        handle_otp_entry(&bot, &msg, &deps, folder_id, attempts, &text).await
                    }
                    None => handle_codeword(&bot, &msg, &deps, &text).await,
                };
                if let Err(e) = outcome {
                    report_failure(&bot, &msg, "message", e).await;
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let data = q.data.clone().unwrap_or_default();
            let presser = q.from.id.0 as i64;

            if data == "cancel" {
                let text = if deps.engine.cancels().cancel(presser) {
                    "Cancelling delivery."
                } else {
                    "No delivery in progress."
                };
                bot.answer_callback_query(q.id.clone()).text(text).await?;
            } else if let Some(rest) = data.strip_prefix("otp:") {
                if let Err(e) = handle_otp_generate(&bot, &deps, presser, rest).await {
                    log::error!("OTP generate callback failed: {}", e);
                }
                bot.answer_callback_query(q.id.clone()).await?;
            } else {
                bot.answer_callback_query(q.id.clone()).await?;
            }
            Ok(())
        }
    })
}

/// Translate a failed handler into the generic user-facing error notice.
/// Storage failures abort the operation; nothing is retried.
async fn report_failure(bot: &Bot, msg: &Message, what: &str, e: HandlerError) {
    log::error!("{} handler failed: {}", what, e);
    let _ = bot
        .send_message(msg.chat.id, "A database error occurred. Please try again later.")
        .await;
}

async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps, payload: &str) -> Result<(), HandlerError> {
    let user = match &msg.from {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;

    let conn = deps.db_pool.get()?;
    if roster::is_blocked(&conn, user_id)? {
        bot.send_message(msg.chat.id, "Access restricted.").await?;
        return Ok(());
    }
    roster::track_subscriber(
        &conn,
        user_id,
        user.username.as_deref(),
        Some(&user.first_name),
        &chrono::Utc::now().to_rfc3339(),
    )?;
    drop(conn);

    if payload.is_empty() {
        bot.send_message(
            msg.chat.id,
            "Welcome. Open a folder link you were given, or type its secret codeword.",
        )
        .await?;
        return Ok(());
    }

    if payload.starts_with("s_") {
        bot.send_message(msg.chat.id, "Short links are not supported; ask for a full folder link.")
            .await?;
        return Ok(());
    }

    resolve_token(bot, msg, deps, payload, SessionProof::default()).await
}

/// Run the gate on a token and act on the decision. Re-entered with
/// richer proof after a password clears.
async fn resolve_token(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    token: &str,
    proof: SessionProof,
) -> Result<(), HandlerError> {
    let user = match &msg.from {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;

    let conn = deps.db_pool.get()?;
    let (decision, link, folder) = access::check_token(&conn, token, user_id, proof)?;
    drop(conn);

    match decision {
        GateDecision::Invalid => {
            bot.send_message(msg.chat.id, "This link is not valid.").await?;
        }
        GateDecision::Revoked => {
            bot.send_message(msg.chat.id, "This link has been revoked.").await?;
        }
        GateDecision::RedeemedByOther => {
            bot.send_message(msg.chat.id, "This link has already been used.").await?;
        }
        GateDecision::Expired => {
            bot.send_message(msg.chat.id, "This link has expired.").await?;
        }
        // The remaining decisions all carry a folder; a missing one would
        // have come back as Invalid.
        GateDecision::PasswordRequired => {
            if let Some(folder) = folder {
                session::set(
                    user_id,
                    Pending::AwaitingPassword {
                        folder_id: folder.id,
                        token: Some(token.to_owned()),
                        attempts: 0,
                    },
                );
                bot.send_message(msg.chat.id, "This folder is password protected. Enter the password:")
                    .await?;
            }
        }
        GateDecision::OtpRequired => {
            if let Some(folder) = folder {
                begin_otp_wait(bot, msg, user_id, user.username.as_deref(), &folder).await?;
            }
        }
        GateDecision::Allow => {
            if let Some(folder) = folder {
                deliver_folder(bot, msg, deps, &folder, link.as_ref()).await?;
            }
        }
    }
    Ok(())
}

async fn begin_otp_wait(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    username: Option<&str>,
    folder: &FolderRecord,
) -> Result<(), HandlerError> {
    session::set(user_id, Pending::AwaitingOtp { folder_id: folder.id, attempts: 0 });
    notify_otp_request(bot, folder.id, &folder.name, user_id, username).await;
    bot.send_message(
        msg.chat.id,
        "This folder requires a one-time code. The administrator has been notified; \
         enter the code once you receive it.",
    )
    .await?;
    Ok(())
}

async fn handle_password_entry(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    folder_id: i64,
    token: Option<String>,
    entered: &str,
) -> Result<(), HandlerError> {
    let user = match &msg.from {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;

    let conn = deps.db_pool.get()?;
    let folder = match folders::get_folder(&conn, folder_id)? {
        Some(f) => f,
        None => {
            session::clear(user_id);
            bot.send_message(msg.chat.id, "This folder no longer exists.").await?;
            return Ok(());
        }
    };
    drop(conn);

    if folder.password.as_deref() == Some(entered) {
        session::clear(user_id);
        let proof = SessionProof { password_verified: true, otp_verified: false };
        match token {
            Some(token) => resolve_token(bot, msg, deps, &token, proof).await?,
            None => {
                // Codeword entry path; only the folder gates remain.
                if folder.otp_required {
                    begin_otp_wait(bot, msg, user_id, user.username.as_deref(), &folder).await?;
                } else {
                    deliver_folder(bot, msg, deps, &folder, None).await?;
                }
            }
        }
        return Ok(());
    }

    let attempts = session::record_failed_attempt(user_id).unwrap_or(MAX_PASSWORD_ATTEMPTS);
    if attempts >= MAX_PASSWORD_ATTEMPTS {
        session::clear(user_id);
        log::warn!("Password attempt budget exhausted for user {} on folder {}", user_id, folder_id);
        bot.send_message(msg.chat.id, "Too many wrong attempts. Follow your link again to retry.")
            .await?;
    } else {
        let remaining = MAX_PASSWORD_ATTEMPTS - attempts;
        bot.send_message(msg.chat.id, format!("Wrong password. {} attempt(s) left.", remaining))
            .await?;
    }
    Ok(())
}

async fn handle_otp_entry(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    folder_id: i64,
    attempts: u8,
    entered: &str,
) -> Result<(), HandlerError> {
    let user = match &msg.from {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;

    let conn = deps.db_pool.get()?;
    let outcome = verify_otp(&conn, folder_id, user_id, entered, attempts)?;
    let folder = folders::get_folder(&conn, folder_id)?;
    drop(conn);

    match outcome {
        VerifyOutcome::Accepted => {
            session::clear(user_id);
            match folder {
                Some(folder) => deliver_folder(bot, msg, deps, &folder, None).await?,
                None => {
                    bot.send_message(msg.chat.id, "This folder no longer exists.").await?;
                }
            }
        }
        VerifyOutcome::Rejected { remaining_attempts } => {
            session::record_failed_attempt(user_id);
            bot.send_message(msg.chat.id, format!("Wrong code. {} attempt(s) left.", remaining_attempts))
                .await?;
        }
        VerifyOutcome::LockedOut => {
            session::clear(user_id);
            bot.send_message(msg.chat.id, "Too many wrong codes. The code has been revoked.")
                .await?;
        }
        VerifyOutcome::Expired => {
            session::clear(user_id);
            bot.send_message(msg.chat.id, "That code has expired. Follow your link again to request a new one.")
                .await?;
        }
        VerifyOutcome::NoPending => {
            bot.send_message(msg.chat.id, "No code has been issued yet. Wait for the administrator.")
                .await?;
        }
    }
    Ok(())
}

/// Plain text from a user with nothing pending: try it as a secret-folder
/// codeword. Admin text is ignored here, their plain text belongs to the
/// management UI.
async fn handle_codeword(bot: &Bot, msg: &Message, deps: &HandlerDeps, text: &str) -> Result<(), HandlerError> {
    let user = match &msg.from {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;

    let conn = deps.db_pool.get()?;
    if roster::is_admin(&conn, user_id)? || user_id == *config::ADMIN_ID {
        return Ok(());
    }
    let hit = access::check_codeword(&conn, text, SessionProof::default())?;
    drop(conn);

    let (decision, folder) = match hit {
        Some(pair) => pair,
        None => return Ok(()),
    };

    match decision {
        GateDecision::PasswordRequired => {
            session::set(
                user_id,
                Pending::AwaitingPassword { folder_id: folder.id, token: None, attempts: 0 },
            );
            bot.send_message(msg.chat.id, "This folder is password protected. Enter the password:")
                .await?;
        }
        GateDecision::OtpRequired => {
            begin_otp_wait(bot, msg, user_id, user.username.as_deref(), &folder).await?;
        }
        GateDecision::Allow => {
            deliver_folder(bot, msg, deps, &folder, None).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn deliver_folder(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    folder: &FolderRecord,
    link: Option<&LinkRecord>,
) -> Result<(), HandlerError> {
    let user = match &msg.from {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    let requester = Recipient {
        id: user.id.0 as i64,
        username: user.username.clone(),
    };

    match deps.engine.deliver(&requester, folder, link).await? {
        DeliveryResult::AlreadyRedeemed => {
            bot.send_message(msg.chat.id, "This link has already been used.").await?;
        }
        DeliveryResult::Delivered { sent, .. } => {
            log::info!("Delivered folder {} ({} items) to user {}", folder.id, sent, requester.id);
        }
        // The engine already told the user in both of these cases.
        DeliveryResult::Cancelled { .. } | DeliveryResult::EmptyFolder => {}
    }
    Ok(())
}

/// Admin pressed the generate button on an OTP request notice.
async fn handle_otp_generate(bot: &Bot, deps: &HandlerDeps, presser: i64, payload: &str) -> Result<(), HandlerError> {
    let conn = deps.db_pool.get()?;
    let authorized = presser == *config::ADMIN_ID || roster::is_admin(&conn, presser)?;
    if !authorized {
        log::warn!("Unauthorized OTP generate attempt by {}", presser);
        return Ok(());
    }

    let mut parts = payload.splitn(2, ':');
    let folder_id: i64 = match parts.next().and_then(|p| p.parse().ok()) {
        Some(id) => id,
        None => return Ok(()),
    };
    let user_id: i64 = match parts.next().and_then(|p| p.parse().ok()) {
        Some(id) => id,
        None => return Ok(()),
    };

    let folder = match folders::get_folder(&conn, folder_id)? {
        Some(f) => f,
        None => {
            notify_admin_text(bot, "That folder no longer exists.").await;
            return Ok(());
        }
    };

    let (code, expires_at) = crate::access::otp::issue_otp(&conn, &folder, user_id)?;
    drop(conn);

    bot.send_message(
        ChatId(user_id),
        format!("Your one-time code for \"{}\": {}", folder.name, code),
    )
    .await?;
    notify_admin_text(
        bot,
        &format!(
            "Code sent to user {} for \"{}\" (valid until {}).",
            user_id,
            folder.name,
            expires_at.format("%H:%M UTC")
        ),
    )
    .await;
    Ok(())
}
