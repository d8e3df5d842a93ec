//! The delivery engine: streams a folder's content to a requester after
//! the gate has said yes.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::AppResult;
use crate::delivery::cancel::CancelRegistry;
use crate::delivery::ledger;
use crate::delivery::self_destruct::SelfDestructQueue;
use crate::delivery::sender::{ContentSender, MessageHandle};
use crate::storage::folders::{self, ContentItem, FolderRecord};
use crate::storage::links::LinkRecord;
use crate::storage::DbPool;

/// Who is receiving the folder.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: i64,
    pub username: Option<String>,
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// All items went out. `delivery_id` is set when a self-destruct job
    /// was registered for them.
    Delivered { sent: usize, delivery_id: Option<String> },
    /// The requester cancelled mid-stream; `sent` items had already gone
    /// out and stay put.
    Cancelled { sent: usize },
    /// Nothing in the folder; no ledger writes, no single-use consumption.
    EmptyFolder,
    /// Single-use link already claimed by someone else; nothing was sent.
    AlreadyRedeemed,
}

pub struct DeliveryEngine {
    pool: DbPool,
    sender: Arc<dyn ContentSender>,
    self_destruct: Arc<SelfDestructQueue>,
    cancels: Arc<CancelRegistry>,
}

impl DeliveryEngine {
    pub fn new(
        pool: DbPool,
        sender: Arc<dyn ContentSender>,
        self_destruct: Arc<SelfDestructQueue>,
        cancels: Arc<CancelRegistry>,
    ) -> Self {
        Self { pool, sender, self_destruct, cancels }
    }

    pub fn cancels(&self) -> &Arc<CancelRegistry> {
        &self.cancels
    }

    pub fn self_destruct(&self) -> &Arc<SelfDestructQueue> {
        &self.self_destruct
    }

    /// Deliver `folder` to `requester`. `link` is the access link that got
    /// them here, or `None` for OTP/codeword entry.
    ///
    /// The empty check runs before single-use consumption on purpose: a
    /// link to an empty folder stays redeemable until there is something
    /// to redeem it for.
    pub async fn deliver(
        &self,
        requester: &Recipient,
        folder: &FolderRecord,
        link: Option<&LinkRecord>,
    ) -> AppResult<DeliveryResult> {
        let conn = self.pool.get()?;
        let items = folders::list_content(&conn, folder.id)?;

        if items.is_empty() {
            self.sender
                .send_text(requester.id, "This folder is currently empty. Check back later.")
                .await?;
            return Ok(DeliveryResult::EmptyFolder);
        }

        // Claim a single-use link before anything is sent. Losing the
        // claim race means another requester is already being served.
        let mut consumed_here = false;
        if let Some(link) = link {
            if link.single_use {
                match link.used_by {
                    None => {
                        if !ledger::consume_single_use(&conn, &link.token, requester.id)? {
                            log::info!(
                                "User {} lost the redemption race on link {}",
                                requester.id,
                                link.id
                            );
                            return Ok(DeliveryResult::AlreadyRedeemed);
                        }
                        consumed_here = true;
                    }
                    Some(claimant) if claimant == requester.id => {}
                    Some(_) => return Ok(DeliveryResult::AlreadyRedeemed),
                }
            }
        }

        let mut handles: Vec<MessageHandle> = Vec::with_capacity(items.len() + 1);

        let notice = match folder.auto_delete_minutes {
            Some(minutes) => format!(
                "Access granted: \"{}\" ({} items). Messages self-destruct in {} minute(s).",
                folder.name,
                items.len(),
                minutes
            ),
            None => format!("Access granted: \"{}\" ({} items).", folder.name, items.len()),
        };
        handles.push(self.sender.send_text(requester.id, &notice).await?);

        let cancel_flag = self.cancels.arm(requester.id);
        let protect = !folder.forwardable;

        let mut sent = 0usize;
        let mut cancelled = false;
        for item in &items {
            if cancel_flag.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }
            match self.send_item(requester.id, item, protect).await {
                Ok(handle) => {
                    handles.push(handle);
                    sent += 1;
                }
                Err(e) => {
                    // Best effort: one bad item must not sink the rest.
                    log::warn!("Failed to send item {} of folder {}: {}", item.id, folder.id, e);
                }
            }
        }
        self.cancels.disarm(requester.id);

        if cancelled {
            log::info!("Delivery to user {} cancelled after {} items", requester.id, sent);
            if let Ok(handle) = self.sender.send_text(requester.id, "Delivery cancelled.").await {
                handles.push(handle);
            }
        }

        let delivery_id = match folder.auto_delete_minutes {
            Some(minutes) if !handles.is_empty() => {
                let id = Uuid::new_v4().to_string();
                self.self_destruct
                    .schedule(id.clone(), Arc::clone(&self.sender), handles, minutes);
                Some(id)
            }
            _ => None,
        };

        if cancelled {
            // A cancelled delivery neither logs nor counts; the single-use
            // claim, if one was made, stands.
            return Ok(DeliveryResult::Cancelled { sent });
        }

        match link {
            Some(link) => {
                ledger::record_link_access(&conn, link, requester.id, requester.username.as_deref())?;
                if consumed_here {
                    ledger::notify_redemption(
                        self.pool.clone(),
                        Arc::clone(&self.sender),
                        link.id,
                        link.token.clone(),
                        folder.name.clone(),
                        requester.id,
                        requester.username.clone(),
                    );
                }
            }
            None => {
                ledger::record_folder_access(&conn, folder.id, requester.id, requester.username.as_deref())?;
            }
        }

        Ok(DeliveryResult::Delivered { sent, delivery_id })
    }

    async fn send_item(&self, chat_id: i64, item: &ContentItem, protect: bool) -> AppResult<MessageHandle> {
        match item.file_type.as_str() {
            "text" => {
                let text = item.text_content.as_deref().unwrap_or("");
                self.sender.send_text(chat_id, text).await
            }
            "photo" => {
                let file_id = item.file_id.as_deref().unwrap_or_default();
                self.sender.send_photo(chat_id, file_id, protect, true).await
            }
            "video" => {
                let file_id = item.file_id.as_deref().unwrap_or_default();
                self.sender.send_video(chat_id, file_id, protect, true).await
            }
            _ => {
                let file_id = item.file_id.as_deref().unwrap_or_default();
                self.sender.send_document(chat_id, file_id, protect).await
            }
        }
    }
}
