use serde::{Deserialize, Serialize};

use crate::models::MessageNode;

/// One unit pushed by the remote during an active reply.
///
/// Serialized form is the replay-file/JSONL binding (`kind`-tagged); the live
/// event-stream binding lives in [`crate::parsers::frames`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Partial text to append to one content part of an in-progress message.
    Delta {
        message_id: String,
        #[serde(default)]
        part: usize,
        text: String,
    },
    /// Wholesale snapshot replacing everything accumulated so far. The
    /// remote replays these to correct earlier content.
    Replace { message: MessageNode },
    /// Terminal sentinel: the message is complete.
    Done { message_id: String },
    /// Terminal sentinel: the server aborted this message.
    Error { message_id: String, reason: String },
}

impl StreamFrame {
    /// The message this frame applies to.
    pub fn message_id(&self) -> &str {
        match self {
            StreamFrame::Delta { message_id, .. }
            | StreamFrame::Done { message_id }
            | StreamFrame::Error { message_id, .. } => message_id,
            StreamFrame::Replace { message } => &message.id,
        }
    }
}
