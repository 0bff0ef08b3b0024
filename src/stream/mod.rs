//! Streaming-reply decoding.
//!
//! A live reply arrives as a sequence of [`StreamFrame`]s; the
//! [`StreamDecoder`] turns them into progressively-complete
//! [`MessageNode`](crate::models::MessageNode) snapshots that a caller pulls
//! one at a time. There is no background iteration: the decoder advances only
//! when the caller asks for the next snapshot, and abandoning it mid-stream
//! is always safe.

pub mod decoder;
pub mod frame;

pub use decoder::StreamDecoder;
pub use frame::StreamFrame;
