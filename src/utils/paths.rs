use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::Transcript;

// Keeps export filenames comfortably under filesystem limits
const MAX_SLUG_LEN: usize = 80;

/// Turn a conversation title into a filesystem-safe slug.
///
/// Alphanumerics are lowercased, everything else collapses into single
/// hyphens, and the result is capped; an untitled conversation slugs to
/// "untitled".
pub fn slugify_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_hyphen = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Export filename stem: slugified title plus a short id suffix so two
/// conversations with the same title never collide.
pub fn export_basename(title: Option<&str>, conversation_id: &str) -> String {
    let slug = slugify_title(title.unwrap_or(""));
    let key: String = conversation_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();
    if key.is_empty() {
        slug
    } else {
        format!("{slug}__{key}")
    }
}

/// Write a transcript as pretty-printed JSON under `dir`, returning the path.
pub fn write_export(
    dir: &Path,
    conversation_id: &str,
    title: Option<&str>,
    transcript: &Transcript,
) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).context("Failed to create export directory")?;
    }
    let path = dir.join(format!("{}.json", export_basename(title, conversation_id)));
    let json =
        serde_json::to_string_pretty(transcript).context("Failed to serialize transcript")?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write export file: {}", path.display()))?;
    Ok(path)
}
