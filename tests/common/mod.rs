//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Builder for a directory of conversation payloads acting as the remote
/// source (the layout `FileTransport` reads).
pub struct RemoteDirBuilder {
    temp_dir: TempDir,
}

impl RemoteDirBuilder {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write one conversation-tree payload file
    pub fn with_conversation(self, payload: &ConversationPayloadBuilder) -> Self {
        let path = self.temp_dir.path().join(format!("{}.json", payload.id));
        fs::write(path, payload.to_json()).expect("Failed to write conversation payload");
        self
    }

    /// Write a recorded reply stream for a conversation
    pub fn with_stream(self, conversation_id: &str, lines: &[&str]) -> Self {
        let path = self
            .temp_dir
            .path()
            .join(format!("{conversation_id}.stream.jsonl"));
        fs::write(path, lines.join("\n")).expect("Failed to write stream file");
        self
    }

    pub fn build(self) -> TempDir {
        self.temp_dir
    }
}

/// Builds the remote's conversation-tree JSON: a linear chain of messages
/// under a hidden root node, `current_node` at the tip.
pub struct ConversationPayloadBuilder {
    pub id: String,
    title: Option<String>,
    update_time: f64,
    messages: Vec<MessageSpec>,
}

struct MessageSpec {
    id: String,
    role: String,
    text: String,
    status: String,
    create_time: f64,
}

impl ConversationPayloadBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: None,
            update_time: 1_700_000_000.0,
            messages: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_message(mut self, id: &str, role: &str, text: &str) -> Self {
        let create_time = 1_700_000_000.0 + self.messages.len() as f64 * 10.0;
        self.messages.push(MessageSpec {
            id: id.to_string(),
            role: role.to_string(),
            text: text.to_string(),
            status: "finished_successfully".to_string(),
            create_time,
        });
        self
    }

    pub fn with_in_progress_message(mut self, id: &str, role: &str, text: &str) -> Self {
        self = self.with_message(id, role, text);
        if let Some(last) = self.messages.last_mut() {
            last.status = "in_progress".to_string();
        }
        self
    }

    pub fn to_json(&self) -> String {
        let mut mapping = serde_json::Map::new();

        let first_child: Vec<&str> = self
            .messages
            .first()
            .map(|m| m.id.as_str())
            .into_iter()
            .collect();
        mapping.insert(
            "root".to_string(),
            serde_json::json!({
                "id": "root",
                "message": null,
                "parent": null,
                "children": first_child
            }),
        );

        for (i, message) in self.messages.iter().enumerate() {
            let parent = if i == 0 {
                "root"
            } else {
                self.messages[i - 1].id.as_str()
            };
            let children: Vec<&str> = self
                .messages
                .get(i + 1)
                .map(|m| m.id.as_str())
                .into_iter()
                .collect();
            mapping.insert(
                message.id.clone(),
                serde_json::json!({
                    "id": message.id,
                    "message": {
                        "id": message.id,
                        "author": {"role": message.role},
                        "create_time": message.create_time,
                        "content": {"content_type": "text", "parts": [message.text]},
                        "status": message.status
                    },
                    "parent": parent,
                    "children": children
                }),
            );
        }

        let current = self
            .messages
            .last()
            .map(|m| m.id.as_str())
            .unwrap_or("root");

        serde_json::json!({
            "conversation_id": self.id,
            "title": self.title,
            "update_time": self.update_time,
            "current_node": current,
            "mapping": mapping
        })
        .to_string()
    }
}
