use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::MessageNode;

/// The ordered, hidden-node-filtered sequence of messages on a conversation's
/// active branch, root first.
///
/// Tree order is authoritative: branches can be created out of chronological
/// order when a user edits history, so a transcript is never timestamp-sorted.
/// Display layers consume this type only; they never see tree structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<MessageNode>,
}

impl Transcript {
    pub fn new(messages: Vec<MessageNode>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[MessageNode] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<MessageNode> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn newest(&self) -> Option<&MessageNode> {
        self.messages.last()
    }

    /// Timestamp of the newest message, if any.
    pub fn newest_time(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.created_at)
    }

    /// Slice by 1-based display positions, `end = None` meaning "to the end".
    /// Out-of-range requests yield an empty slice rather than an error.
    pub fn slice_lines(&self, start: usize, end: Option<usize>) -> &[MessageNode] {
        if start == 0 {
            return &[];
        }
        let from = start - 1;
        if from >= self.messages.len() {
            return &[];
        }
        let to = end.map_or(self.messages.len(), |e| e.min(self.messages.len()));
        if to <= from {
            return &[];
        }
        &self.messages[from..to]
    }

    /// Messages after the one with `marker_id`, or the whole transcript when
    /// the marker is unknown (a fresh reader has seen nothing yet).
    pub fn since_message(&self, marker_id: &str) -> &[MessageNode] {
        match self.messages.iter().position(|m| m.id == marker_id) {
            Some(pos) => &self.messages[pos + 1..],
            None => &self.messages,
        }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a MessageNode;
    type IntoIter = std::slice::Iter<'a, MessageNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{ContentPart, NodeStatus, Role};

    fn msg(id: &str) -> MessageNode {
        MessageNode {
            id: id.to_string(),
            parent_id: None,
            children_ids: Vec::new(),
            role: Role::User,
            content: vec![ContentPart::new(id)],
            created_at: Utc::now(),
            status: NodeStatus::Complete,
        }
    }

    fn transcript(ids: &[&str]) -> Transcript {
        Transcript::new(ids.iter().map(|i| msg(i)).collect())
    }

    #[test]
    fn test_slice_lines_basic() {
        let t = transcript(&["a", "b", "c", "d"]);
        let sliced = t.slice_lines(2, Some(3));
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced[0].id, "b");
        assert_eq!(sliced[1].id, "c");
    }

    #[test]
    fn test_slice_lines_open_ended() {
        let t = transcript(&["a", "b", "c"]);
        let sliced = t.slice_lines(2, None);
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced[0].id, "b");
    }

    #[test]
    fn test_slice_lines_out_of_range() {
        let t = transcript(&["a"]);
        assert!(t.slice_lines(5, None).is_empty());
        assert!(t.slice_lines(0, Some(1)).is_empty());
    }

    #[test]
    fn test_since_message_known_marker() {
        let t = transcript(&["a", "b", "c"]);
        let rest = t.since_message("a");
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].id, "b");
    }

    #[test]
    fn test_since_message_at_tip_is_empty() {
        let t = transcript(&["a", "b"]);
        assert!(t.since_message("b").is_empty());
    }

    #[test]
    fn test_since_message_unknown_marker_returns_all() {
        let t = transcript(&["a", "b"]);
        assert_eq!(t.since_message("zzz").len(), 2);
    }
}
