//! Conversation cache: per-conversation message lists with idempotent
//! ordered merge, sync markers, and a catalog of known conversations.
//!
//! Persistence is file-based behind the [`ConversationCache`] interface and
//! versioned; a version mismatch or corrupt file degrades to "nothing cached"
//! rather than an error.

pub mod entry;
pub mod persistence;
pub mod store;

pub use entry::{CacheEntry, MergeResult, SyncMarker};
pub use store::ConversationCache;
