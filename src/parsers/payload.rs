use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::deserializers::epoch_to_datetime;
use crate::models::{Conversation, ContentPart, MessageNode, NodeStatus, Role};

/// Parse a raw conversation-tree payload into a [`Conversation`].
///
/// The remote's shape: a `mapping` of node id → `{ message, parent, children }`
/// where `message` may be null for structural nodes, plus `current_node`
/// pointing at the tip of the active branch. Junk nodes degrade to hidden
/// (empty-content) entries; unreachable parents are tolerated here — whether
/// the tree is legal is the resolver's call.
///
/// `expected_id` is used when the payload omits `conversation_id` (the
/// per-conversation endpoint does not repeat it).
pub fn parse_tree_payload(raw: &str, expected_id: &str) -> Result<Conversation> {
    let value: Value =
        serde_json::from_str(raw).context("Failed to parse conversation payload as JSON")?;

    let mapping = value
        .get("mapping")
        .and_then(Value::as_object)
        .context("Conversation payload has no 'mapping' object")?;

    let current_node_id = value
        .get("current_node")
        .and_then(Value::as_str)
        .context("Conversation payload has no 'current_node' pointer")?
        .to_string();

    let mut node_map = HashMap::with_capacity(mapping.len());
    for (node_id, raw_node) in mapping {
        let Some(node) = parse_node(node_id, raw_node) else {
            eprintln!("Warning: skipping unusable mapping entry '{}'", node_id);
            continue;
        };
        node_map.insert(node_id.clone(), node);
    }

    if node_map.is_empty() {
        bail!("Conversation payload mapping contained no usable nodes");
    }

    let id = value
        .get("conversation_id")
        .and_then(Value::as_str)
        .unwrap_or(expected_id)
        .to_string();

    let title = value
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let updated_at = value
        .get("update_time")
        .and_then(Value::as_f64)
        .and_then(epoch_to_datetime)
        .unwrap_or_else(Utc::now);

    Ok(Conversation {
        id,
        title,
        current_node_id,
        node_map,
        updated_at,
    })
}

/// Build one node from a mapping entry. Returns `None` only when the entry is
/// not even an object; nodes without a message payload become hidden nodes so
/// the branch structure survives.
fn parse_node(node_id: &str, raw: &Value) -> Option<MessageNode> {
    let obj = raw.as_object()?;

    let parent_id = obj
        .get("parent")
        .and_then(Value::as_str)
        .map(str::to_string);

    let children_ids: Vec<String> = obj
        .get("children")
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let message = obj.get("message").and_then(Value::as_object);

    let role = message
        .and_then(|m| m.get("author"))
        .and_then(|a| a.get("role"))
        .and_then(Value::as_str)
        .map(parse_role)
        .unwrap_or(Role::System);

    let content = message
        .and_then(|m| m.get("content"))
        .map(parse_content_parts)
        .unwrap_or_default();

    let created_at = message
        .and_then(|m| m.get("create_time"))
        .and_then(Value::as_f64)
        .and_then(epoch_to_datetime)
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).expect("epoch is valid"));

    let status = message
        .and_then(|m| m.get("status"))
        .and_then(Value::as_str)
        .map(parse_status)
        .unwrap_or(NodeStatus::Complete);

    Some(MessageNode {
        id: node_id.to_string(),
        parent_id,
        children_ids,
        role,
        content,
        created_at,
        status,
    })
}

/// Build a node from a bare wire `message` object (no mapping entry around
/// it), as pushed during a live stream. Requires a message id.
pub(crate) fn node_from_message_value(message: &Value) -> Option<MessageNode> {
    let obj = message.as_object()?;
    let id = obj.get("id").and_then(Value::as_str)?.to_string();

    let role = obj
        .get("author")
        .and_then(|a| a.get("role"))
        .and_then(Value::as_str)
        .map(parse_role)
        .unwrap_or(Role::Assistant);

    let content = obj.get("content").map(parse_content_parts).unwrap_or_default();

    let created_at = obj
        .get("create_time")
        .and_then(Value::as_f64)
        .and_then(epoch_to_datetime)
        .unwrap_or_else(Utc::now);

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .map(parse_status)
        .unwrap_or(NodeStatus::InProgress);

    Some(MessageNode {
        id,
        parent_id: None,
        children_ids: Vec::new(),
        role,
        content,
        created_at,
        status,
    })
}

fn parse_role(raw: &str) -> Role {
    match raw {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::System,
    }
}

fn parse_status(raw: &str) -> NodeStatus {
    match raw {
        "in_progress" => NodeStatus::InProgress,
        "finished_with_error" | "errored" => NodeStatus::Errored,
        // "finished_successfully" and anything the remote invents later
        _ => NodeStatus::Complete,
    }
}

/// Extract text parts from a message `content` object. Non-text parts
/// (images, multimodal blobs) contribute nothing; purely structural messages
/// end up with no parts and are hidden downstream.
fn parse_content_parts(content: &Value) -> Vec<ContentPart> {
    let Some(parts) = content.get("parts").and_then(Value::as_array) else {
        return Vec::new();
    };

    parts
        .iter()
        .filter_map(|part| match part {
            Value::String(text) => Some(ContentPart::new(text.clone())),
            Value::Object(obj) => obj
                .get("text")
                .and_then(Value::as_str)
                .map(ContentPart::new),
            _ => None,
        })
        .collect()
}
