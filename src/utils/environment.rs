use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable overriding the export directory.
pub const EXPORT_DIR_VAR: &str = "CHATGPT_HISTORY_EXPORT_DIR";

/// Directory exports land in: the override variable if set, otherwise
/// `<documents>/chatgpt-history` with a home-relative fallback.
pub fn default_export_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var(EXPORT_DIR_VAR) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    if let Some(documents) = dirs::document_dir() {
        return Ok(documents.join("chatgpt-history"));
    }
    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join("chatgpt-history"))
}
