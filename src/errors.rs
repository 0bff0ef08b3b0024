//! Error taxonomy for the history engine.
//!
//! Resolver and decoder errors are local to one sync attempt and are never
//! retried here; retry policy belongs to the caller or the transport. The
//! cache never errors for "not found" — it returns empty results instead.

use thiserror::Error;

/// Failures while resolving a conversation tree into a transcript.
///
/// All variants are fatal to that call: malformed input will not fix itself.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// `current_node_id` (or an ancestor reference) points at a node that is
    /// not present in the conversation's node map.
    #[error("dangling node pointer '{node_id}' in conversation {conversation_id}")]
    DanglingPointer {
        conversation_id: String,
        node_id: String,
    },

    /// Parent traversal exceeded the node count, which can only happen when
    /// the parent links form a cycle.
    #[error("parent cycle detected in conversation {conversation_id} after {steps} steps")]
    CyclicTree {
        conversation_id: String,
        steps: usize,
    },

    /// Structural invariant broken, e.g. the walk terminated on a node that
    /// is not the map's unique root.
    #[error("malformed tree in conversation {conversation_id}: {reason}")]
    MalformedTree {
        conversation_id: String,
        reason: String,
    },
}

/// Failures while decoding a live reply stream.
///
/// Both terminal variants carry whatever partial content had accumulated for
/// the affected message; partial work is never discarded silently.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The server reported an error sentinel mid-stream.
    #[error("stream interrupted for message {message_id}: {reason}")]
    Interrupted {
        message_id: String,
        reason: String,
        partial: String,
    },

    /// The stream closed without a terminal sentinel for an in-progress
    /// message.
    #[error("stream truncated with message {message_id} still in progress")]
    Truncated { message_id: String, partial: String },

    /// The frame source itself failed (transport-level).
    #[error("frame source failed")]
    Source(#[from] TransportError),
}

/// Transport-level failure. The synchronizer treats every variant uniformly
/// as "remote unreachable"; distinguishing them matters only for display.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("remote rejected the session credential")]
    AuthRejected,

    #[error("conversation {0} not found on the remote")]
    NotFound(String),

    #[error("remote unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected remote payload: {0}")]
    BadPayload(String),
}

/// Failures surfaced by [`crate::sync::Synchronizer::sync`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// `SyncMode::RemoteOnly` and the remote could not be reached.
    #[error("remote unavailable for conversation {conversation_id}")]
    RemoteUnavailable {
        conversation_id: String,
        #[source]
        source: TransportError,
    },

    /// The remote payload was malformed; nothing was merged.
    #[error("sync failed for conversation {conversation_id}")]
    Failed {
        conversation_id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Non-fatal signal that a sync call fell back to cached data.
///
/// Accompanies a successful result; it is not an error.
#[derive(Debug, Clone)]
pub struct StaleDataWarning {
    pub conversation_id: String,
    pub reason: String,
}

impl std::fmt::Display for StaleDataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "serving cached history for {}: {}",
            self.conversation_id, self.reason
        )
    }
}
