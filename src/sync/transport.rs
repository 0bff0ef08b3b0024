//! The remote boundary: a transport trait the synchronizer drives, a session
//! credential handle, and a directory-backed transport for imports, replay,
//! and tests.
//!
//! Timeout and retry policy live inside transport implementations; the
//! synchronizer only ever sees "unreachable".

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cache::SyncMarker;
use crate::errors::TransportError;

/// Environment variable holding the captured session token.
pub const SESSION_TOKEN_VAR: &str = "CHATGPT_SESSION_TOKEN";

const TOKEN_FILENAME: &str = "session-token";

/// Boxed line source backing one reply stream.
pub type LineSource = Box<dyn Iterator<Item = Result<String, TransportError>>>;

/// What the synchronizer needs from a remote conversation source.
///
/// `fetch_tree` returns the raw conversation-tree payload; passing the marker
/// lets a transport that supports delta queries return only what changed, but
/// returning the full tree is always correct (the cache merge is idempotent).
pub trait RemoteTransport {
    fn fetch_tree(
        &self,
        conversation_id: &str,
        since: Option<&SyncMarker>,
    ) -> Result<String, TransportError>;

    /// Open a live reply stream for a new prompt; yields raw stream lines.
    fn open_stream(&self, conversation_id: &str, prompt: &str)
    -> Result<LineSource, TransportError>;

    /// Raw tree payloads for every conversation this source knows about.
    fn list_trees(&self) -> Result<Vec<String>, TransportError>;
}

/// A captured session credential.
///
/// The token comes from the environment or from a config file; it is a bearer
/// secret, so it is never logged and `Debug` is not derived.
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Load the token from `CHATGPT_SESSION_TOKEN`, falling back to the
    /// config file under the user's config directory.
    pub fn load() -> Result<Self> {
        if let Ok(token) = env::var(SESSION_TOKEN_VAR) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                return Ok(Self::new(token));
            }
        }

        let path = Self::token_path()?;
        let raw = fs::read_to_string(&path).with_context(|| {
            format!(
                "No session token: set {} or create {}",
                SESSION_TOKEN_VAR,
                path.display()
            )
        })?;
        let token = raw.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("Session token file {} is empty", path.display());
        }
        Ok(Self::new(token))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn token_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Failed to get platform config directory")?;
        Ok(base.join("chatgpt-history-sync").join(TOKEN_FILENAME))
    }
}

/// Directory-backed transport.
///
/// Layout: `<dir>/<conversation_id>.json` holds a conversation-tree payload,
/// `<dir>/<conversation_id>.stream.jsonl` holds reply-stream lines for
/// replay. Used by the import/replay commands and throughout the tests; a
/// network transport slots in behind the same trait.
pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn tree_path(&self, conversation_id: &str) -> PathBuf {
        self.dir.join(format!("{conversation_id}.json"))
    }

    fn stream_path(&self, conversation_id: &str) -> PathBuf {
        self.dir.join(format!("{conversation_id}.stream.jsonl"))
    }
}

impl RemoteTransport for FileTransport {
    fn fetch_tree(
        &self,
        conversation_id: &str,
        _since: Option<&SyncMarker>,
    ) -> Result<String, TransportError> {
        // Full trees only; the idempotent merge makes that correct.
        let path = self.tree_path(conversation_id);
        if !path.exists() {
            return Err(TransportError::NotFound(conversation_id.to_string()));
        }
        fs::read_to_string(&path).map_err(|e| TransportError::Unreachable(e.to_string()))
    }

    fn open_stream(
        &self,
        conversation_id: &str,
        _prompt: &str,
    ) -> Result<LineSource, TransportError> {
        let path = self.stream_path(conversation_id);
        if !path.exists() {
            return Err(TransportError::NotFound(conversation_id.to_string()));
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let lines: Vec<Result<String, TransportError>> =
            raw.lines().map(|l| Ok(l.to_string())).collect();
        Ok(Box::new(lines.into_iter()))
    }

    fn list_trees(&self) -> Result<Vec<String>, TransportError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let mut payloads = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TransportError::Unreachable(e.to_string()))?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(payload) => payloads.push(payload),
                Err(e) => eprintln!(
                    "Warning: skipping unreadable payload {}: {}",
                    path.display(),
                    e
                ),
            }
        }
        Ok(payloads)
    }
}
