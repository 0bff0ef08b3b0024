//! The conversation cache proper: merge, read, markers, and the catalog.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::Utc;

use super::entry::{CACHE_VERSION, CacheEntry, MergeResult, SyncMarker};
use super::persistence::{self, RecordState};
use crate::models::{CatalogStats, Conversation, ConversationHeader, MessageNode, NodeStatus};

/// File-backed cache of conversation transcripts.
///
/// Mutations for one conversation id are serialized behind a per-id lock;
/// operations on different ids proceed independently. "Not found" is never an
/// error here: reading an unknown conversation yields an empty list and an
/// absent marker.
pub struct ConversationCache {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationCache {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open the cache at the platform default location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(persistence::default_cache_root()?))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    fn load(&self, conversation_id: &str) -> Result<(Vec<CacheEntry>, RecordState)> {
        Ok(persistence::load_record(&self.root, conversation_id)?.unwrap_or_else(|| {
            (
                Vec::new(),
                RecordState {
                    version: CACHE_VERSION,
                    marker: None,
                },
            )
        }))
    }

    /// Merge an ordered message sequence into the stored transcript.
    ///
    /// Per message: unknown id → insert; known id whose stored status is
    /// `in_progress` while the incoming one is `complete` → update in place;
    /// known and otherwise settled → no-op. Stored entries are never
    /// reordered: a message that arrives after its logical successor is
    /// inserted at its tree position, right after the last incoming message
    /// matched so far, not appended at the end. Merging the same sequence
    /// twice reports everything as unchanged the second time.
    pub fn merge(&self, conversation_id: &str, messages: &[MessageNode]) -> Result<MergeResult> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut entries, state) = self.load(conversation_id)?;
        let mut result = MergeResult::default();
        // Position just past the last incoming message we matched or
        // inserted; the next unknown message goes here. Until a stored
        // anchor matches, unknown messages extend the sequence (a streamed
        // reply carries no anchor and must land after cached history).
        let mut insert_at = entries.len();

        for incoming in messages {
            match entries.iter().position(|e| e.node.id == incoming.id) {
                Some(pos) => {
                    let entry = &mut entries[pos];
                    if entry.node.status == NodeStatus::InProgress
                        && incoming.status == NodeStatus::Complete
                    {
                        entry.node = incoming.clone();
                        entry.cached_at = Utc::now();
                        result.updated += 1;
                    } else {
                        result.unchanged += 1;
                    }
                    insert_at = pos + 1;
                }
                None => {
                    entries.insert(insert_at, CacheEntry::new(incoming.clone()));
                    result.inserted += 1;
                    insert_at += 1;
                }
            }
        }

        persistence::save_record(&self.root, conversation_id, &entries, &state)?;
        Ok(result)
    }

    /// Read the cached transcript; empty when nothing is cached yet.
    pub fn read(&self, conversation_id: &str) -> Result<Vec<CacheEntry>> {
        Ok(self.load(conversation_id)?.0)
    }

    pub fn marker(&self, conversation_id: &str) -> Result<Option<SyncMarker>> {
        Ok(self.load(conversation_id)?.1.marker)
    }

    /// Move the sync marker forward. A marker older than the stored one is a
    /// no-op, not an error: out-of-order delta application must not rewind
    /// the cursor.
    pub fn advance_marker(&self, conversation_id: &str, marker: SyncMarker) -> Result<()> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (entries, mut state) = self.load(conversation_id)?;
        let moves_forward = state
            .marker
            .as_ref()
            .is_none_or(|stored| marker.last_seen_time >= stored.last_seen_time);
        if moves_forward {
            state.marker = Some(marker);
            persistence::save_record(&self.root, conversation_id, &entries, &state)?;
        }
        Ok(())
    }

    /// Record or refresh catalog headers for a batch of conversations.
    ///
    /// Existing records keep their `first_seen_at`; title and remote update
    /// time are refreshed from the incoming data.
    pub fn record_catalog(&self, conversations: &[Conversation]) -> Result<CatalogStats> {
        let mut catalog = persistence::load_catalog(&self.root)?;
        let mut stats = CatalogStats::default();
        let now = Utc::now();

        for conversation in conversations {
            match catalog.iter_mut().find(|h| h.id == conversation.id) {
                Some(header) => {
                    header.title = conversation.title.clone().or(header.title.take());
                    header.remote_updated_at = Some(conversation.updated_at);
                    header.last_seen_at = now;
                    stats.refreshed += 1;
                }
                None => {
                    catalog.push(ConversationHeader {
                        id: conversation.id.clone(),
                        title: conversation.title.clone(),
                        remote_updated_at: Some(conversation.updated_at),
                        first_seen_at: now,
                        last_seen_at: now,
                    });
                    stats.added += 1;
                }
            }
        }

        persistence::save_catalog(&self.root, &catalog)?;
        Ok(stats)
    }

    /// All known conversation headers, most recently updated first.
    pub fn catalog(&self) -> Result<Vec<ConversationHeader>> {
        let mut catalog = persistence::load_catalog(&self.root)?;
        catalog.sort_by_key(|h| std::cmp::Reverse(h.remote_updated_at.unwrap_or(h.last_seen_at)));
        Ok(catalog)
    }

    /// Look a conversation up by exact id, falling back to a case-insensitive
    /// title match.
    pub fn find_conversation(&self, needle: &str) -> Result<Option<ConversationHeader>> {
        let catalog = persistence::load_catalog(&self.root)?;
        if let Some(by_id) = catalog.iter().find(|h| h.id == needle) {
            return Ok(Some(by_id.clone()));
        }
        let lowered = needle.to_lowercase();
        Ok(catalog
            .iter()
            .find(|h| {
                h.title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase() == lowered)
            })
            .cloned())
    }
}
