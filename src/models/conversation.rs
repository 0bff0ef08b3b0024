use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author role attached to a message node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Display label, capitalized the way the transcript prints authors.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
            Role::Tool => "Tool",
        }
    }
}

/// Lifecycle state of a message node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    InProgress,
    Complete,
    Errored,
}

/// One text part of a message. Replies can stream several parts in parallel,
/// so parts keep their position even when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    pub text: String,
}

impl ContentPart {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One node of the remote message tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    pub created_at: DateTime<Utc>,
    pub status: NodeStatus,
}

impl MessageNode {
    /// Concatenate the node's text parts with newlines between them, the way
    /// a reader sees the message.
    pub fn joined_text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect();
        parts.join("\n")
    }

    /// Hidden nodes carry no visible text (system scaffolding, tool-internal
    /// plumbing, bare branch points). The resolver drops them.
    pub fn is_hidden(&self) -> bool {
        self.content.iter().all(|p| p.text.trim().is_empty())
    }
}

/// A conversation as the remote models it: a flat id → node arena plus a
/// pointer at the tip of the active branch.
///
/// The arena representation keeps traversal and cycle detection simple bounds
/// checks over a fixed collection; nodes never hold live references to each
/// other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub current_node_id: String,
    pub node_map: HashMap<String, MessageNode>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn node(&self, id: &str) -> Option<&MessageNode> {
        self.node_map.get(id)
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}
