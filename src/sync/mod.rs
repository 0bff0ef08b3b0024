//! Delta synchronization: decide local vs. remote, fetch, merge, serve.

pub mod synchronizer;
pub mod transport;

pub use synchronizer::{SyncMode, SyncOutcome, Synchronizer};
pub use transport::{FileTransport, LineSource, RemoteTransport, Session};
