//! Active-branch resolution: conversation tree → linear transcript.

pub mod tree;

pub use tree::resolve;
