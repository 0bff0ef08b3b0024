//! The synchronizer: orchestrates marker lookup, remote fetch or stream
//! decode, all-or-nothing merge, and the fallback-to-cache policy.

use chrono::{Duration, Utc};

use super::transport::RemoteTransport;
use crate::cache::{ConversationCache, MergeResult, SyncMarker};
use crate::errors::{StaleDataWarning, SyncError, TransportError};
use crate::models::{CatalogStats, MessageNode, NodeStatus, Transcript};
use crate::parsers::{FrameReader, parse_tree_payload};
use crate::resolver;
use crate::stream::StreamDecoder;

/// Cached data younger than this is served without a remote round-trip under
/// [`SyncMode::RemoteIfStale`].
const DEFAULT_STALE_AFTER_SECS: i64 = 300;

/// Where a sync call is allowed to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Serve the cache only; never touch the remote.
    LocalOnly,
    /// Require the remote; an unreachable remote fails the call.
    RemoteOnly,
    /// Round-trip only when the cached marker is absent or older than the
    /// staleness window; fall back to cache if the remote is unreachable.
    RemoteIfStale,
}

/// What one sync call produced.
#[derive(Debug)]
pub struct SyncOutcome {
    pub transcript: Transcript,
    pub merge: MergeResult,
    /// Set when the call fell back to cached data instead of failing.
    pub warning: Option<StaleDataWarning>,
}

/// Drives one conversation at a time from fetch to merged transcript.
///
/// Merge is all-or-nothing per attempt: resolution or decoding must fully
/// succeed before the cache is touched, so a failed attempt never leaves a
/// partially merged conversation behind.
pub struct Synchronizer<T> {
    cache: ConversationCache,
    transport: T,
    stale_after: Duration,
}

impl<T: RemoteTransport> Synchronizer<T> {
    pub fn new(cache: ConversationCache, transport: T) -> Self {
        Self {
            cache,
            transport,
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    /// Synchronize one conversation and return its transcript.
    ///
    /// The returned transcript always equals what an immediate `LocalOnly`
    /// call would return: remote data is served only after it has been
    /// merged and read back.
    pub fn sync(&self, conversation_id: &str, mode: SyncMode) -> Result<SyncOutcome, SyncError> {
        let marker = self
            .cache
            .marker(conversation_id)
            .map_err(|e| self.failed(conversation_id, e))?;

        let fetch_remote = match mode {
            SyncMode::LocalOnly => false,
            SyncMode::RemoteOnly => true,
            SyncMode::RemoteIfStale => marker
                .as_ref()
                .is_none_or(|m| Utc::now() - m.last_seen_time > self.stale_after),
        };

        if !fetch_remote {
            let transcript = self.cached_transcript(conversation_id)?;
            return Ok(SyncOutcome {
                transcript,
                merge: MergeResult::default(),
                warning: None,
            });
        }

        let payload = match self.transport.fetch_tree(conversation_id, marker.as_ref()) {
            Ok(payload) => payload,
            Err(source) => return self.remote_fallback(conversation_id, mode, source),
        };

        // Parse and resolve before any cache mutation.
        let conversation = parse_tree_payload(&payload, conversation_id)
            .map_err(|e| self.failed(conversation_id, e))?;
        let transcript = resolver::resolve(&conversation)
            .map_err(|e| self.failed(conversation_id, anyhow::Error::new(e)))?;

        let merge = self
            .cache
            .merge(conversation_id, transcript.messages())
            .map_err(|e| self.failed(conversation_id, e))?;
        self.cache
            .record_catalog(std::slice::from_ref(&conversation))
            .map_err(|e| self.failed(conversation_id, e))?;
        self.advance_past_newest_complete(conversation_id, transcript.messages())?;

        let transcript = self.cached_transcript(conversation_id)?;
        Ok(SyncOutcome {
            transcript,
            merge,
            warning: None,
        })
    }

    /// Send a prompt and decode the live reply, invoking `on_snapshot` for
    /// every progressively-complete message snapshot.
    ///
    /// Only fully-complete messages are merged, and only after the whole
    /// stream decoded cleanly; a stream failure surfaces as [`SyncError`]
    /// with the cache untouched.
    pub fn stream_reply(
        &self,
        conversation_id: &str,
        prompt: &str,
        mut on_snapshot: impl FnMut(&MessageNode),
    ) -> Result<SyncOutcome, SyncError> {
        let lines = self
            .transport
            .open_stream(conversation_id, prompt)
            .map_err(|source| SyncError::RemoteUnavailable {
                conversation_id: conversation_id.to_string(),
                source,
            })?;

        // Final snapshot per id, in first-completion order.
        let mut completed: Vec<MessageNode> = Vec::new();
        let decoder = StreamDecoder::new(FrameReader::new(lines));
        for item in decoder {
            let snapshot = item.map_err(|e| self.failed(conversation_id, anyhow::Error::new(e)))?;
            on_snapshot(&snapshot);
            if snapshot.status == NodeStatus::Complete {
                completed.push(snapshot);
            }
        }

        let merge = self
            .cache
            .merge(conversation_id, &completed)
            .map_err(|e| self.failed(conversation_id, e))?;
        self.advance_past_newest_complete(conversation_id, &completed)?;

        let transcript = self.cached_transcript(conversation_id)?;
        Ok(SyncOutcome {
            transcript,
            merge,
            warning: None,
        })
    }

    /// Fetch every conversation the transport lists and register it in the
    /// catalog. Unparseable payloads are skipped with a warning so one bad
    /// conversation cannot sink the batch.
    pub fn refresh_catalog(&self) -> Result<CatalogStats, SyncError> {
        let payloads = self
            .transport
            .list_trees()
            .map_err(|source| SyncError::RemoteUnavailable {
                conversation_id: "*".to_string(),
                source,
            })?;

        let mut conversations = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            match parse_tree_payload(payload, "") {
                Ok(conversation) if conversation.id.is_empty() => {
                    eprintln!("Warning: skipping conversation payload without an id");
                }
                Ok(conversation) => conversations.push(conversation),
                Err(e) => eprintln!("Warning: skipping unparseable conversation: {}", e),
            }
        }

        self.cache
            .record_catalog(&conversations)
            .map_err(|e| self.failed("*", e))
    }

    fn cached_transcript(&self, conversation_id: &str) -> Result<Transcript, SyncError> {
        let entries = self
            .cache
            .read(conversation_id)
            .map_err(|e| self.failed(conversation_id, e))?;
        Ok(Transcript::new(
            entries.into_iter().map(|e| e.node).collect(),
        ))
    }

    /// Marker advancement: the newest complete message in the merged batch.
    /// The marker never moves past an in-progress message.
    fn advance_past_newest_complete(
        &self,
        conversation_id: &str,
        messages: &[MessageNode],
    ) -> Result<(), SyncError> {
        let newest_complete = messages
            .iter()
            .rev()
            .find(|m| m.status == NodeStatus::Complete);
        if let Some(message) = newest_complete {
            self.cache
                .advance_marker(
                    conversation_id,
                    SyncMarker {
                        last_message_id: message.id.clone(),
                        last_seen_time: message.created_at,
                    },
                )
                .map_err(|e| self.failed(conversation_id, e))?;
        }
        Ok(())
    }

    fn remote_fallback(
        &self,
        conversation_id: &str,
        mode: SyncMode,
        source: TransportError,
    ) -> Result<SyncOutcome, SyncError> {
        if mode == SyncMode::RemoteOnly {
            return Err(SyncError::RemoteUnavailable {
                conversation_id: conversation_id.to_string(),
                source,
            });
        }
        let transcript = self.cached_transcript(conversation_id)?;
        Ok(SyncOutcome {
            transcript,
            merge: MergeResult::default(),
            warning: Some(StaleDataWarning {
                conversation_id: conversation_id.to_string(),
                reason: source.to_string(),
            }),
        })
    }

    fn failed(&self, conversation_id: &str, source: anyhow::Error) -> SyncError {
        SyncError::Failed {
            conversation_id: conversation_id.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::sync::FileTransport;

    const CONV: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn tree_payload(parts: &[(&str, &str)]) -> String {
        // Linear chain root → ... → tip from (id, text) pairs.
        let mut mapping = serde_json::Map::new();
        let mut prev: Option<&str> = None;
        for (i, (id, text)) in parts.iter().enumerate() {
            let children: Vec<&str> = parts.get(i + 1).map(|(c, _)| *c).into_iter().collect();
            mapping.insert(
                id.to_string(),
                serde_json::json!({
                    "id": id,
                    "message": {
                        "id": id,
                        "author": {"role": if i % 2 == 0 { "user" } else { "assistant" }},
                        "create_time": 1_700_000_000.0 + i as f64,
                        "content": {"content_type": "text", "parts": [text]},
                        "status": "finished_successfully"
                    },
                    "parent": prev,
                    "children": children
                }),
            );
            prev = Some(id);
        }
        serde_json::json!({
            "conversation_id": CONV,
            "title": "Chain",
            "update_time": 1_700_000_100.0,
            "current_node": parts.last().map(|(id, _)| *id),
            "mapping": mapping
        })
        .to_string()
    }

    fn setup(parts: &[(&str, &str)]) -> (TempDir, TempDir, Synchronizer<FileTransport>) {
        let remote = TempDir::new().unwrap();
        fs::write(remote.path().join(format!("{CONV}.json")), tree_payload(parts)).unwrap();
        let cache_dir = TempDir::new().unwrap();
        let sync = Synchronizer::new(
            ConversationCache::new(cache_dir.path().to_path_buf()),
            FileTransport::new(remote.path()),
        );
        (remote, cache_dir, sync)
    }

    fn ids(transcript: &Transcript) -> Vec<String> {
        transcript.messages().iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn test_remote_sync_then_local_round_trip() {
        let (_remote, _cache, sync) = setup(&[("a", "hi"), ("b", "hello")]);

        let remote_view = sync.sync(CONV, SyncMode::RemoteOnly).unwrap();
        assert_eq!(remote_view.merge.inserted, 2);
        assert!(remote_view.warning.is_none());

        let local_view = sync.sync(CONV, SyncMode::LocalOnly).unwrap();
        assert_eq!(ids(&remote_view.transcript), ids(&local_view.transcript));
    }

    #[test]
    fn test_remote_only_fails_when_unreachable() {
        let (_remote, _cache, sync) = setup(&[]);
        fs::remove_file(_remote.path().join(format!("{CONV}.json"))).ok();
        assert!(matches!(
            sync.sync(CONV, SyncMode::RemoteOnly).unwrap_err(),
            SyncError::RemoteUnavailable { .. }
        ));
    }

    #[test]
    fn test_fallback_to_cache_with_warning() {
        let (remote, _cache, sync) = setup(&[("a", "hi")]);
        sync.sync(CONV, SyncMode::RemoteOnly).unwrap();

        // Remote goes away; RemoteIfStale must serve the cache and warn once
        // the marker is stale.
        fs::remove_file(remote.path().join(format!("{CONV}.json"))).unwrap();
        let sync = sync.with_stale_after(Duration::seconds(-1));
        let outcome = sync.sync(CONV, SyncMode::RemoteIfStale).unwrap();
        assert_eq!(ids(&outcome.transcript), vec!["a"]);
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn test_fresh_marker_skips_remote() {
        let (remote, _cache, sync) = setup(&[("a", "hi")]);
        sync.sync(CONV, SyncMode::RemoteOnly).unwrap();
        // Marker timestamps come from message create_time (year 2023), so it
        // reads as stale unless the window is enormous.
        let sync = sync.with_stale_after(Duration::days(10_000));

        fs::remove_file(remote.path().join(format!("{CONV}.json"))).unwrap();
        let outcome = sync.sync(CONV, SyncMode::RemoteIfStale).unwrap();
        // No fallback warning: the remote was never consulted.
        assert!(outcome.warning.is_none());
        assert_eq!(ids(&outcome.transcript), vec!["a"]);
    }

    #[test]
    fn test_malformed_payload_merges_nothing() {
        let (remote, _cache, sync) = setup(&[("a", "hi")]);
        fs::write(
            remote.path().join(format!("{CONV}.json")),
            r#"{"current_node": "x"}"#,
        )
        .unwrap();

        assert!(matches!(
            sync.sync(CONV, SyncMode::RemoteOnly).unwrap_err(),
            SyncError::Failed { .. }
        ));
        let local = sync.sync(CONV, SyncMode::LocalOnly).unwrap();
        assert!(local.transcript.is_empty());
    }

    #[test]
    fn test_sync_advances_marker_to_tip() {
        let (_remote, _cache, sync) = setup(&[("a", "hi"), ("b", "hello")]);
        sync.sync(CONV, SyncMode::RemoteOnly).unwrap();
        let marker = sync.cache().marker(CONV).unwrap().unwrap();
        assert_eq!(marker.last_message_id, "b");
    }

    #[test]
    fn test_stream_reply_merges_completed_messages() {
        let (remote, _cache, sync) = setup(&[("a", "hi")]);
        sync.sync(CONV, SyncMode::RemoteOnly).unwrap();

        fs::write(
            remote.path().join(format!("{CONV}.stream.jsonl")),
            concat!(
                r#"{"kind":"delta","message_id":"b","part":0,"text":"Hel"}"#,
                "\n",
                r#"{"kind":"delta","message_id":"b","part":0,"text":"lo"}"#,
                "\n",
                r#"{"kind":"done","message_id":"b"}"#,
                "\n",
            ),
        )
        .unwrap();

        let mut snapshots = Vec::new();
        let outcome = sync
            .stream_reply(CONV, "say hello", |snapshot| {
                snapshots.push(snapshot.joined_text());
            })
            .unwrap();

        assert_eq!(snapshots, vec!["Hel", "Hello", "Hello"]);
        assert_eq!(outcome.merge.inserted, 1);
        assert_eq!(ids(&outcome.transcript), vec!["a", "b"]);
    }

    #[test]
    fn test_truncated_stream_leaves_cache_untouched() {
        let (remote, _cache, sync) = setup(&[("a", "hi")]);
        sync.sync(CONV, SyncMode::RemoteOnly).unwrap();

        fs::write(
            remote.path().join(format!("{CONV}.stream.jsonl")),
            r#"{"kind":"delta","message_id":"b","part":0,"text":"Hel"}"#,
        )
        .unwrap();

        assert!(matches!(
            sync.stream_reply(CONV, "say hello", |_| {}).unwrap_err(),
            SyncError::Failed { .. }
        ));
        let local = sync.sync(CONV, SyncMode::LocalOnly).unwrap();
        assert_eq!(ids(&local.transcript), vec!["a"]);
    }

    #[test]
    fn test_refresh_catalog_skips_payload_without_id() {
        let (remote, _cache, sync) = setup(&[("a", "hi")]);
        fs::write(
            remote.path().join("noid.json"),
            r#"{"current_node": "m", "mapping": {"m": {"id": "m", "message": null, "parent": null, "children": []}}}"#,
        )
        .unwrap();

        let stats = sync.refresh_catalog().unwrap();
        assert_eq!(stats.added, 1);
        let catalog = sync.cache().catalog().unwrap();
        assert!(catalog.iter().all(|h| !h.id.is_empty()));
    }

    #[test]
    fn test_refresh_catalog_registers_conversations() {
        let (_remote, _cache, sync) = setup(&[("a", "hi")]);
        let stats = sync.refresh_catalog().unwrap();
        assert_eq!(stats.added, 1);
        let catalog = sync.cache().catalog().unwrap();
        assert_eq!(catalog[0].id, CONV);
        assert_eq!(catalog[0].title.as_deref(), Some("Chain"));
    }
}
