use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use super::view::{format_message, parse_line_range};
use crate::cache::ConversationCache;
use crate::models::Transcript;
use crate::parsers::deserializers::validate_conversation_id;
use crate::sync::{FileTransport, SyncMode, SyncOutcome, Synchronizer};
use crate::utils::{default_export_dir, write_export};

#[derive(Parser)]
#[command(name = "chatgpt-history-sync")]
#[command(version = "0.1.0")]
#[command(about = "Read and continue ChatGPT conversations from a local cache", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Cache directory override (defaults to the platform cache location)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List conversations known to the local catalog
    List,

    /// Show a conversation transcript (by id or title)
    Show {
        conversation: String,

        /// Message range to display: N, N-M, N-, or N+
        #[arg(long)]
        lines: Option<String>,

        /// Show only messages merged after the last recorded marker
        #[arg(long)]
        since_last_update: bool,

        /// Where to fetch from
        #[arg(long, value_enum, default_value_t = FetchMode::Auto)]
        mode: FetchMode,

        /// Directory of exported conversation payloads acting as the remote
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Import conversation payloads from a directory into the cache
    Import { source: PathBuf },

    /// Replay a recorded reply stream into a conversation, printing it live
    Reply {
        conversation: String,
        prompt: String,

        /// Directory holding the recorded stream
        #[arg(long)]
        source: PathBuf,
    },

    /// Export a cached transcript as pretty-printed JSON
    Export {
        conversation: String,

        /// Output directory (defaults to the documents export directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show cache statistics
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Cache only; never consult the source
    Local,
    /// Require the source; fail if it is unreachable
    Remote,
    /// Consult the source only when cached data is stale
    Auto,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let cache = match &cli.cache_dir {
        Some(dir) => ConversationCache::new(dir.clone()),
        None => ConversationCache::open_default()?,
    };

    match cli.command {
        Some(Commands::List) => list_conversations(&cache),
        Some(Commands::Show {
            conversation,
            lines,
            since_last_update,
            mode,
            source,
        }) => show_conversation(cache, &conversation, lines, since_last_update, mode, source),
        Some(Commands::Import { source }) => import_conversations(cache, source),
        Some(Commands::Reply {
            conversation,
            prompt,
            source,
        }) => reply(cache, &conversation, &prompt, source),
        Some(Commands::Export { conversation, out }) => export_conversation(&cache, &conversation, out),
        Some(Commands::Stats) => show_stats(&cache),
        None => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

/// Map a user-supplied id or title onto a catalog id; an unknown needle is
/// taken as a raw conversation id.
fn resolve_conversation_id(cache: &ConversationCache, needle: &str) -> Result<String> {
    if let Some(header) = cache.find_conversation(needle)? {
        return Ok(header.id);
    }
    if let Err(reason) = validate_conversation_id(needle) {
        eprintln!("Warning: '{}' matches no cached title and {}", needle, reason);
    }
    Ok(needle.to_string())
}

fn list_conversations(cache: &ConversationCache) -> Result<()> {
    let catalog = cache.catalog()?;
    if catalog.is_empty() {
        println!("No conversations cached yet. Run 'import' first.");
        return Ok(());
    }

    println!("{} conversation(s):", catalog.len());
    for header in &catalog {
        let updated = header
            .remote_updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {}  {}  (updated {})", header.id, header.display_title(), updated);
    }
    Ok(())
}

fn show_conversation(
    cache: ConversationCache,
    conversation: &str,
    lines: Option<String>,
    since_last_update: bool,
    mode: FetchMode,
    source: Option<PathBuf>,
) -> Result<()> {
    let conversation_id = resolve_conversation_id(&cache, conversation)?;

    // Capture the marker before syncing; the sync itself advances it.
    let previous_marker = cache.marker(&conversation_id)?;

    let sync_mode = match (mode, &source) {
        (FetchMode::Local, _) | (_, None) => SyncMode::LocalOnly,
        (FetchMode::Remote, Some(_)) => SyncMode::RemoteOnly,
        (FetchMode::Auto, Some(_)) => SyncMode::RemoteIfStale,
    };
    if mode == FetchMode::Remote && source.is_none() {
        bail!("--mode remote requires --source");
    }

    let transport = FileTransport::new(source.unwrap_or_default());
    let synchronizer = Synchronizer::new(cache, transport);
    let outcome = synchronizer.sync(&conversation_id, sync_mode)?;
    print_warning(&outcome);

    let transcript = &outcome.transcript;
    if transcript.is_empty() {
        println!("No messages cached for {}", conversation_id);
        return Ok(());
    }

    let window: Vec<(usize, _)> = if since_last_update {
        let marker_id = previous_marker
            .map(|m| m.last_message_id)
            .unwrap_or_default();
        position_numbered(transcript, transcript.since_message(&marker_id))
    } else if let Some(raw) = lines {
        let range = parse_line_range(&raw)?;
        position_numbered(transcript, transcript.slice_lines(range.start, range.end))
    } else {
        transcript.messages().iter().enumerate().map(|(i, m)| (i + 1, m)).collect()
    };

    if window.is_empty() {
        println!("Nothing new to show.");
        return Ok(());
    }
    for (position, message) in window {
        println!("{}", format_message(position, message));
    }
    Ok(())
}

/// Pair each message in `slice` with its 1-based position in the transcript.
fn position_numbered<'a>(
    transcript: &'a Transcript,
    slice: &'a [crate::models::MessageNode],
) -> Vec<(usize, &'a crate::models::MessageNode)> {
    let offset = slice
        .first()
        .and_then(|first| transcript.messages().iter().position(|m| m.id == first.id))
        .unwrap_or(0);
    slice.iter().enumerate().map(|(i, m)| (offset + i + 1, m)).collect()
}

fn import_conversations(cache: ConversationCache, source: PathBuf) -> Result<()> {
    let synchronizer = Synchronizer::new(cache, FileTransport::new(source));
    let stats = synchronizer.refresh_catalog()?;
    println!("Catalog updated: {} added, {} refreshed", stats.added, stats.refreshed);

    let catalog = synchronizer.cache().catalog()?;
    let mut synced = 0usize;
    for header in &catalog {
        match synchronizer.sync(&header.id, SyncMode::RemoteOnly) {
            Ok(outcome) => {
                synced += 1;
                println!(
                    "  {}: {} new, {} updated",
                    header.display_title(),
                    outcome.merge.inserted,
                    outcome.merge.updated
                );
            }
            Err(e) => eprintln!("Warning: failed to sync {}: {}", header.id, e),
        }
    }
    println!("Synced {}/{} conversation(s)", synced, catalog.len());
    Ok(())
}

fn reply(
    cache: ConversationCache,
    conversation: &str,
    prompt: &str,
    source: PathBuf,
) -> Result<()> {
    let conversation_id = resolve_conversation_id(&cache, conversation)?;
    let synchronizer = Synchronizer::new(cache, FileTransport::new(source));

    let mut printed = String::new();
    let outcome = synchronizer.stream_reply(&conversation_id, prompt, |snapshot| {
        // Print only what grew since the last snapshot. A replacement that
        // rewrites earlier content restarts the line instead of slicing into
        // the middle of it.
        let text = snapshot.joined_text();
        match text.strip_prefix(printed.as_str()) {
            Some(suffix) => print!("{}", suffix),
            None => print!("\n{}", text),
        }
        printed = text;
    })?;
    println!();
    println!(
        "Reply merged: {} new message(s), transcript now {} message(s)",
        outcome.merge.inserted,
        outcome.transcript.len()
    );
    Ok(())
}

fn export_conversation(
    cache: &ConversationCache,
    conversation: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let conversation_id = resolve_conversation_id(cache, conversation)?;
    let entries = cache.read(&conversation_id)?;
    if entries.is_empty() {
        bail!("Nothing cached for '{}'", conversation);
    }
    let transcript = Transcript::new(entries.into_iter().map(|e| e.node).collect());

    let title = cache
        .find_conversation(&conversation_id)?
        .and_then(|h| h.title);
    let dir = match out {
        Some(dir) => dir,
        None => default_export_dir()?,
    };
    let path = write_export(&dir, &conversation_id, title.as_deref(), &transcript)
        .context("Export failed")?;
    println!("Exported {} message(s) to {}", transcript.len(), path.display());
    Ok(())
}

fn show_stats(cache: &ConversationCache) -> Result<()> {
    let catalog = cache.catalog()?;
    let mut total_messages = 0usize;
    let mut with_marker = 0usize;
    for header in &catalog {
        total_messages += cache.read(&header.id)?.len();
        if cache.marker(&header.id)?.is_some() {
            with_marker += 1;
        }
    }

    println!("ChatGPT History Cache Statistics");
    println!("================================");
    println!("Conversations: {}", catalog.len());
    println!("Cached messages: {}", total_messages);
    println!("With sync marker: {}", with_marker);
    println!("Cache directory: {}", cache.root().display());
    Ok(())
}

fn print_warning(outcome: &SyncOutcome) {
    if let Some(warning) = &outcome.warning {
        eprintln!("Warning: {}", warning);
    }
}
