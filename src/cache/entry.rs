use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MessageNode;

/// Cache schema version for invalidation on format changes
pub const CACHE_VERSION: u32 = 1;

/// One persisted message plus the time it entered the cache.
///
/// Entries are created on first merge of an id, updated only for the
/// in_progress → complete status upgrade, and never deleted by normal
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub node: MessageNode,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(node: MessageNode) -> Self {
        Self {
            node,
            cached_at: Utc::now(),
        }
    }
}

/// Per-conversation cursor recording how much history is durably cached.
///
/// Only advances past a message id once that message is merged; the store
/// rejects backward movement as a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMarker {
    pub last_message_id: String,
    pub last_seen_time: DateTime<Utc>,
}

/// Outcome counts of one merge call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeResult {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}
