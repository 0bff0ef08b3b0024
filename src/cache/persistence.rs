//! Cache persistence: load/save with atomic writes
//!
//! Each conversation gets its own subdirectory holding a JSON state file
//! (schema version + sync marker) and a bincode message file. The catalog of
//! known conversations lives at the cache root. All writes go through a temp
//! file + rename so a crash mid-write never leaves a torn file behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bincode::config;
use serde::{Deserialize, Serialize};

use super::entry::{CACHE_VERSION, CacheEntry, SyncMarker};
use crate::models::ConversationHeader;

const STATE_FILENAME: &str = "conversation-state.json";
const MESSAGES_FILENAME: &str = "messages.bin";
const CATALOG_FILENAME: &str = "catalog.json";

/// Per-conversation state persisted alongside the message file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordState {
    pub version: u32,
    #[serde(default)]
    pub marker: Option<SyncMarker>,
}

/// Default platform cache root for this tool.
pub fn default_cache_root() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Failed to get platform cache directory")?;
    Ok(base.join("chatgpt-history-sync"))
}

/// Compute hash of a conversation id for cache subdirectory isolation.
/// Returns first 12 characters of the hex digest; ids are opaque strings, so
/// hashing also keeps path separators and dot segments out of the filesystem.
fn conversation_dir_name(conversation_id: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    conversation_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())[..12].to_string()
}

/// Directory for one conversation's files, created on demand.
fn conversation_dir(root: &Path, conversation_id: &str) -> Result<PathBuf> {
    let dir = root.join(conversation_dir_name(conversation_id));
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create conversation cache directory")?;
    }
    Ok(dir)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = path.with_extension("tmp");
    fs::write(&temp, bytes).context("Failed to write cache temp file")?;
    fs::rename(&temp, path).context("Failed to rename cache temp file")?;
    Ok(())
}

/// Load one conversation's entries and state.
/// Returns None if nothing is cached, the file is corrupted, or the schema
/// version changed (caller treats all three as "nothing cached yet").
pub fn load_record(
    root: &Path,
    conversation_id: &str,
) -> Result<Option<(Vec<CacheEntry>, RecordState)>> {
    let dir = root.join(conversation_dir_name(conversation_id));
    let state_path = dir.join(STATE_FILENAME);
    let messages_path = dir.join(MESSAGES_FILENAME);

    if !state_path.exists() || !messages_path.exists() {
        return Ok(None);
    }

    let state_json = fs::read_to_string(&state_path).context("Failed to read cache state file")?;
    let state: RecordState = match serde_json::from_str(&state_json) {
        Ok(state) => state,
        Err(e) => {
            eprintln!(
                "Warning: discarding corrupt cache state for {}: {}",
                conversation_id, e
            );
            return Ok(None);
        }
    };

    if state.version != CACHE_VERSION {
        eprintln!(
            "Cache version mismatch for {} (expected {}, found {}), refetching",
            conversation_id, CACHE_VERSION, state.version
        );
        return Ok(None);
    }

    let message_bytes = fs::read(&messages_path).context("Failed to read cache message file")?;
    let entries: Vec<CacheEntry> =
        match bincode::serde::decode_from_slice(&message_bytes, config::standard()) {
            Ok((entries, _)) => entries,
            Err(e) => {
                eprintln!(
                    "Warning: discarding corrupt cache messages for {}: {}",
                    conversation_id, e
                );
                return Ok(None);
            }
        };

    Ok(Some((entries, state)))
}

/// Save one conversation's entries and state atomically.
pub fn save_record(
    root: &Path,
    conversation_id: &str,
    entries: &[CacheEntry],
    state: &RecordState,
) -> Result<()> {
    let dir = conversation_dir(root, conversation_id)?;

    let state_json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    write_atomic(&dir.join(STATE_FILENAME), state_json.as_bytes())?;

    let message_bytes = bincode::serde::encode_to_vec(entries, config::standard())
        .context("Failed to serialize cache messages")?;
    write_atomic(&dir.join(MESSAGES_FILENAME), &message_bytes)?;

    Ok(())
}

/// Load the catalog of known conversations; missing or corrupt files yield an
/// empty catalog.
pub fn load_catalog(root: &Path) -> Result<Vec<ConversationHeader>> {
    let path = root.join(CATALOG_FILENAME);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = fs::read_to_string(&path).context("Failed to read catalog file")?;
    match serde_json::from_str(&json) {
        Ok(headers) => Ok(headers),
        Err(e) => {
            eprintln!("Warning: discarding corrupt catalog: {}", e);
            Ok(Vec::new())
        }
    }
}

/// Save the catalog atomically.
pub fn save_catalog(root: &Path, headers: &[ConversationHeader]) -> Result<()> {
    if !root.exists() {
        fs::create_dir_all(root).context("Failed to create cache root directory")?;
    }
    let json = serde_json::to_string_pretty(headers).context("Failed to serialize catalog")?;
    write_atomic(&root.join(CATALOG_FILENAME), json.as_bytes())
}
