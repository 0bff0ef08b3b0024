use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog record for a conversation the cache has heard about, whether or
/// not its messages have been fetched yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHeader {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Last update time the remote reported, if it reported one.
    #[serde(default)]
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl ConversationHeader {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(no title)")
    }
}

/// How many catalog records a batch update added or refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub added: usize,
    pub refreshed: usize,
}
