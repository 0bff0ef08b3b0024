//! chatgpt-history-sync - Read and continue ChatGPT conversations locally
//!
//! This library reconstructs linear transcripts from the message trees a chat
//! service stores, decodes incrementally-streamed replies into discrete
//! messages, and reconciles a local cache with the remote source of truth so
//! repeated reads need not round-trip to the network. It supports:
//!
//! - Resolving a conversation's active branch into an ordered [`Transcript`]
//! - Pull-based decoding of reply streams into progressive message snapshots
//! - An idempotent, order-preserving message cache with per-conversation
//!   sync markers
//! - A synchronizer that decides local vs. remote and falls back to cached
//!   data with a warning when the remote is unreachable
//!
//! # Example
//!
//! ```no_run
//! use chatgpt_history_sync::cache::ConversationCache;
//! use chatgpt_history_sync::sync::{FileTransport, SyncMode, Synchronizer};
//!
//! let cache = ConversationCache::open_default()?;
//! let synchronizer = Synchronizer::new(cache, FileTransport::new("exports"));
//! let outcome = synchronizer.sync("conversation-id", SyncMode::RemoteIfStale)?;
//! for message in &outcome.transcript {
//!     println!("{}: {}", message.role.label(), message.joined_text());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod models;
pub mod parsers;
pub mod resolver;
pub mod stream;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use cache::ConversationCache;
pub use models::{Conversation, MessageNode, Transcript};
pub use parsers::parse_tree_payload;
pub use resolver::resolve;
pub use stream::{StreamDecoder, StreamFrame};
pub use sync::{SyncMode, Synchronizer};
