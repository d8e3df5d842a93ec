//! Per-user cancellation flags for in-flight deliveries.
//!
//! The streaming loop holds a clone of the flag and polls it between
//! items, so a cancel lands within one item of being pressed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Default)]
pub struct CancelRegistry {
    flags: DashMap<i64, Arc<AtomicBool>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh flag for a starting delivery, replacing any stale
    /// one left by a previous delivery to the same user.
    pub fn arm(&self, user_id: i64) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.insert(user_id, flag.clone());
        flag
    }

    /// Request cancellation. Returns `false` when no delivery is in flight.
    pub fn cancel(&self, user_id: i64) -> bool {
        match self.flags.get(&user_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn disarm(&self, user_id: i64) {
        self.flags.remove(&user_id);
    }
}
