//! Notes and substring search.
//!
//! Notes are appended to `notes.md` under the state directory using the same
//! `---` block framing as the audit log, so one reader serves both. Nothing in
//! the notes file is ever rewritten.

use crate::core::audit::{AuditLog, FileAuditLog, RECORD_SEPARATOR, RawBlocks};
use crate::core::error::ModewardError;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

const NOTE_TAG: &str = "[note]";

fn matches(blocks: impl Iterator<Item = String>, text: &str) -> Vec<String> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    blocks
        .filter(|block| block.to_lowercase().contains(&needle))
        .collect()
}

/// Raw blocks whose text contains `text`, case-insensitively, in log order.
/// A blank query matches nothing.
pub fn query(log: &dyn AuditLog, text: &str) -> Result<Vec<String>, ModewardError> {
    Ok(matches(log.blocks()?, text))
}

/// Every note in write order. A missing notes file holds no notes.
pub fn read_notes(path: &Path) -> Result<Vec<String>, ModewardError> {
    match File::open(path) {
        Ok(f) => Ok(RawBlocks::new(BufReader::new(f)).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn query_notes(path: &Path, text: &str) -> Result<Vec<String>, ModewardError> {
    Ok(matches(read_notes(path)?.into_iter(), text))
}

/// Audit blocks first, then notes.
pub fn search(log: &dyn AuditLog, notes: &Path, text: &str) -> Result<Vec<String>, ModewardError> {
    let mut hits = query(log, text)?;
    hits.extend(query_notes(notes, text)?);
    Ok(hits)
}

/// Append one timestamped note. Returns the block as written.
pub fn write_note(path: &Path, note: &str) -> Result<String, ModewardError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(ModewardError::InvalidInput("note must not be empty".to_string()));
    }
    // A bare separator line would split the note in two on read.
    let body: Vec<&str> = note
        .lines()
        .map(|line| {
            if line.trim_end() == RECORD_SEPARATOR {
                "- - -"
            } else {
                line
            }
        })
        .collect();
    let block = format!(
        "{}\n**{}** {}\n\n{}\n\n",
        RECORD_SEPARATOR,
        time::now_iso(),
        NOTE_TAG,
        body.join("\n")
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(block.as_bytes())?;
    tracing::debug!(path = %path.display(), bytes = block.len(), "note appended");
    Ok(block)
}

#[derive(Parser, Debug)]
#[clap(name = "memory", about = "Write notes and search notes and the audit log")]
pub struct MemoryCli {
    #[clap(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// Print every audit block and note containing the query text.
    Query {
        text: String,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Append a timestamped note.
    Write { note: String },
}

pub fn run_memory_cli(store: &Store, cli: MemoryCli) -> Result<(), ModewardError> {
    match cli.command {
        MemoryCommand::Query { text, format } => {
            let log = FileAuditLog::new(&store.audit_log_path());
            let hits = search(&log, &store.notes_path(), &text)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for hit in &hits {
                    println!("---\n{}\n", hit);
                }
                println!("{} match(es)", hits.len());
            }
        }
        MemoryCommand::Write { note } => {
            let block = write_note(&store.notes_path(), &note)?;
            println!(
                "Note appended to {} ({} bytes)",
                store.notes_path().display(),
                block.len()
            );
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "memory",
        "version": "0.3.0",
        "description": "Append-only notes and case-insensitive search over notes and audit blocks",
        "commands": [
            { "name": "query", "parameters": ["text", "format"] },
            { "name": "write", "parameters": ["note"] }
        ],
        "reads": ["audit.log", "notes.md"],
        "storage": ["notes.md"]
    })
}
