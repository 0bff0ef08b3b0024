//! Data models for remote conversation trees and their local projections.
//!
//! - [`MessageNode`] / [`Conversation`] - the remote message-tree shape,
//!   stored as a flat id → node arena rather than linked pointers
//! - [`Transcript`] - the ordered, hidden-node-filtered view of one branch
//! - [`ConversationHeader`] - catalog record for a known conversation
//!
//! These models use serde for serialization (JSON and the binary cache
//! format alike); wire-side quirks such as fractional epoch timestamps are
//! normalized in `crate::parsers` before a model is ever constructed.

pub mod catalog;
pub mod conversation;
pub mod transcript;

pub use catalog::{CatalogStats, ConversationHeader};
pub use conversation::{Conversation, ContentPart, MessageNode, NodeStatus, Role};
pub use transcript::Transcript;
