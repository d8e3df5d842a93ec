//! Timed deletion of delivered messages.
//!
//! Each delivery with an auto-delete window registers one job holding the
//! handles it sent. The job sleeps out the window, deletes what it can and
//! unregisters itself. Jobs are keyed by delivery id and individually
//! cancellable; cancelling a delivery mid-stream does not cancel its job.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::delivery::sender::{ContentSender, MessageHandle};

#[derive(Default)]
pub struct SelfDestructQueue {
    jobs: DashMap<String, JoinHandle<()>>,
}

impl SelfDestructQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Schedule deletion of `handles` after `minutes`. Failed deletes are
    /// logged and skipped; messages the user already removed are gone
    /// either way.
    pub fn schedule(
        self: &Arc<Self>,
        delivery_id: String,
        sender: Arc<dyn ContentSender>,
        handles: Vec<MessageHandle>,
        minutes: i64,
    ) {
        let queue = Arc::clone(self);
        let key = delivery_id.clone();
        let job = tokio::spawn(async move {
            sleep(Duration::from_secs(minutes as u64 * 60)).await;
            log::info!("Self-destructing {} messages for delivery {}", handles.len(), key);
            for handle in handles {
                if let Err(e) = sender.delete_message(handle).await {
                    log::warn!("Failed to delete message {} in chat {}: {}", handle.message_id, handle.chat_id, e);
                }
            }
            queue.jobs.remove(&key);
        });
        self.jobs.insert(delivery_id, job);
    }

    /// Abort a scheduled job. Returns `false` when the job already ran or
    /// never existed.
    pub fn cancel(&self, delivery_id: &str) -> bool {
        match self.jobs.remove(delivery_id) {
            Some((_, job)) => {
                job.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }
}
