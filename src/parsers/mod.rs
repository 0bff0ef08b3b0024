//! Parsers binding the remote service's wire shapes to the engine's models.
//!
//! # Error Handling Strategy
//!
//! Payload parsing follows a **graceful degradation** approach:
//!
//! - **Node-level junk**: mapping entries without a usable message payload
//!   become hidden (empty-content) nodes instead of failing the parse; the
//!   resolver decides what is visible.
//! - **Structural failures**: a payload missing its `mapping` or
//!   `current_node` is rejected outright — there is nothing to degrade to.
//! - **Frame-level junk**: unrecognizable stream lines are skipped with a
//!   stderr warning so one garbled line cannot kill a live reply.
//!
//! No wire format is prescribed by the engine itself beyond the
//! [`StreamFrame`](crate::stream::StreamFrame) and
//! [`MessageNode`](crate::models::MessageNode) shapes; these parsers bind
//! them to the event-stream framing the service actually uses.

pub mod deserializers;
pub mod frames;
pub mod payload;

pub use frames::FrameReader;
pub use payload::parse_tree_payload;
