//! Append-only audit log.
//!
//! Every privileged action writes exactly one immutable entry. On disk the log
//! is UTF-8 text; each entry is a block introduced by a literal `---` line,
//! followed by a timestamp header and `KEY: value` body lines:
//!
//! ```text
//! ---
//! **2026-03-01T12:00:00.000123Z** [audit]
//!
//! EVENT: OVERRIDE_REJECTED
//! TARGET_MODE: administrative
//! OUTCOME: invalid token
//! ```
//!
//! The `---` line is also the record boundary used by the reader. Timestamps
//! are strictly increasing per log file: appends are serialized behind one
//! process-wide lock, and an entry stamped at or before the last written one
//! is moved 1µs past it.

use crate::core::error::ModewardError;
use crate::core::mode::Mode;
use crate::core::time;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

pub const RECORD_SEPARATOR: &str = "---";
const HEADER_TAG: &str = "[audit]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    OverrideApplied,
    OverrideRejected,
    ModeTransition,
    ProposalValidated,
    ConstraintAudit,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::OverrideApplied => "OVERRIDE_APPLIED",
            AuditKind::OverrideRejected => "OVERRIDE_REJECTED",
            AuditKind::ModeTransition => "MODE_TRANSITION",
            AuditKind::ProposalValidated => "PROPOSAL_VALIDATED",
            AuditKind::ConstraintAudit => "CONSTRAINT_AUDIT",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditKind {
    type Err = ModewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OVERRIDE_APPLIED" => Ok(AuditKind::OverrideApplied),
            "OVERRIDE_REJECTED" => Ok(AuditKind::OverrideRejected),
            "MODE_TRANSITION" => Ok(AuditKind::ModeTransition),
            "PROPOSAL_VALIDATED" => Ok(AuditKind::ProposalValidated),
            "CONSTRAINT_AUDIT" => Ok(AuditKind::ConstraintAudit),
            other => Err(ModewardError::InvalidInput(format!(
                "unknown audit event kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    pub target_mode: Option<Mode>,
    pub subject: Option<String>,
    pub outcome: String,
}

impl AuditEntry {
    pub fn new(kind: AuditKind, outcome: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            target_mode: None,
            subject: None,
            outcome: outcome.to_string(),
        }
    }

    pub fn with_target(mut self, mode: Mode) -> Self {
        self.target_mode = Some(mode);
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Render as one on-disk block, separator line included.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}\n**{}** {}\n\nEVENT: {}\n",
            RECORD_SEPARATOR,
            time::iso(&self.timestamp),
            HEADER_TAG,
            self.kind
        );
        if let Some(mode) = self.target_mode {
            out.push_str(&format!("TARGET_MODE: {}\n", mode));
        }
        if let Some(subject) = &self.subject {
            out.push_str(&format!("SUBJECT: {}\n", single_line(subject)));
        }
        out.push_str(&format!("OUTCOME: {}\n\n", single_line(&self.outcome)));
        out
    }

    /// Parse the text of one block (without its `---` line).
    pub fn parse_block(block: &str) -> Result<Self, ModewardError> {
        let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
        let header = lines
            .next()
            .ok_or_else(|| ModewardError::ValidationError("empty audit block".to_string()))?;
        let raw_ts = header
            .strip_prefix("**")
            .and_then(|rest| rest.split("**").next())
            .ok_or_else(|| {
                ModewardError::ValidationError(format!("bad audit header '{}'", header))
            })?;
        let timestamp = time::parse_iso(raw_ts).ok_or_else(|| {
            ModewardError::ValidationError(format!("bad audit timestamp '{}'", raw_ts))
        })?;

        let mut fields = BTreeMap::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let kind = fields
            .get("EVENT")
            .ok_or_else(|| ModewardError::ValidationError("audit block without EVENT".to_string()))?
            .parse::<AuditKind>()?;
        let target_mode = match fields.get("TARGET_MODE") {
            Some(raw) => Some(raw.parse::<Mode>()?),
            None => None,
        };

        Ok(Self {
            timestamp,
            kind,
            target_mode,
            subject: fields.get("SUBJECT").cloned(),
            outcome: fields.get("OUTCOME").cloned().unwrap_or_default(),
        })
    }
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub type EntryIter<'a> = Box<dyn Iterator<Item = AuditEntry> + 'a>;
pub type BlockIter<'a> = Box<dyn Iterator<Item = String> + 'a>;

/// Append-only record store. Entries are never edited or deleted.
pub trait AuditLog {
    /// Append one entry; returns it as written (timestamp possibly adjusted).
    fn append(&self, entry: AuditEntry) -> Result<AuditEntry, ModewardError>;

    /// Lazily iterate parsed entries in log order.
    fn entries(&self) -> Result<EntryIter<'_>, ModewardError>;

    /// Lazily iterate the raw text of every block in log order.
    fn blocks(&self) -> Result<BlockIter<'_>, ModewardError>;

    fn len(&self) -> Result<usize, ModewardError> {
        Ok(self.entries()?.count())
    }

    fn is_empty(&self) -> Result<bool, ModewardError> {
        Ok(self.entries()?.next().is_none())
    }
}

fn next_timestamp(candidate: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match last {
        Some(prev) if candidate <= prev => prev + Duration::microseconds(1),
        // Sub-microsecond precision is not representable on disk.
        _ => DateTime::from_timestamp_micros(candidate.timestamp_micros()).unwrap_or(candidate),
    }
}

/// Serializes appends process-wide and remembers the last timestamp written
/// to each log path.
static APPENDS: Mutex<BTreeMap<PathBuf, DateTime<Utc>>> = Mutex::new(BTreeMap::new());

/// One key per physical file, however the caller spelled the path. The log
/// itself may not exist yet, so the parent directory is resolved instead.
fn cache_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|p| p.join(name)),
        _ => None,
    };
    resolved.unwrap_or(absolute)
}

/// File-backed log.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn last_on_disk(&self) -> Result<Option<DateTime<Utc>>, ModewardError> {
        Ok(self.entries()?.last().map(|e| e.timestamp))
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, ModewardError> {
        let mut last_written = APPENDS.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let key = cache_key(&self.path);
        let last = match last_written.get(&key) {
            Some(ts) => Some(*ts),
            None => self.last_on_disk()?,
        };
        entry.timestamp = next_timestamp(entry.timestamp, last);

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(entry.render().as_bytes())?;
        f.flush()?;

        last_written.insert(key, entry.timestamp);
        tracing::debug!(
            path = %self.path.display(),
            kind = %entry.kind,
            ts = %time::iso(&entry.timestamp),
            "audit entry appended"
        );
        Ok(entry)
    }

    fn entries(&self) -> Result<EntryIter<'_>, ModewardError> {
        Ok(Box::new(parse_blocks(self.blocks()?)))
    }

    fn blocks(&self) -> Result<BlockIter<'_>, ModewardError> {
        match File::open(&self.path) {
            Ok(f) => Ok(Box::new(RawBlocks::new(BufReader::new(f)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Box::new(std::iter::empty())),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process log with the same ordering guarantees.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, ModewardError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entry.timestamp = next_timestamp(entry.timestamp, entries.last().map(|e| e.timestamp));
        entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Result<EntryIter<'_>, ModewardError> {
        Ok(Box::new(self.snapshot().into_iter()))
    }

    fn blocks(&self) -> Result<BlockIter<'_>, ModewardError> {
        Ok(Box::new(self.snapshot().into_iter().map(|e| {
            e.render()
                .trim_start_matches(RECORD_SEPARATOR)
                .trim()
                .to_string()
        })))
    }
}

/// Append for reporting paths. A failed write is logged and returned as
/// `false`; the caller's result stands either way.
pub fn append_or_log(log: &dyn AuditLog, entry: AuditEntry) -> bool {
    let kind = entry.kind;
    match log.append(entry) {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(%kind, error = %e, "audit append failed");
            false
        }
    }
}

/// The last `limit` entries, oldest first.
pub fn tail(log: &dyn AuditLog, limit: usize) -> Result<Vec<AuditEntry>, ModewardError> {
    let mut window = VecDeque::with_capacity(limit.min(1024));
    for entry in log.entries()? {
        if limit == 0 {
            break;
        }
        if window.len() == limit {
            window.pop_front();
        }
        window.push_back(entry);
    }
    Ok(window.into())
}

fn parse_blocks<'a>(blocks: BlockIter<'a>) -> impl Iterator<Item = AuditEntry> + 'a {
    blocks.filter_map(|block| match AuditEntry::parse_block(&block) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed audit block");
            None
        }
    })
}

/// Splits a reader into `---`-delimited blocks, one line at a time. Text
/// before the first separator is not part of any record and is skipped.
pub struct RawBlocks<R: BufRead> {
    lines: Lines<R>,
    current: Option<Vec<String>>,
    done: bool,
}

impl<R: BufRead> RawBlocks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            current: None,
            done: false,
        }
    }

    fn finish(block: Vec<String>) -> Option<String> {
        let text = block.join("\n").trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}

impl<R: BufRead> Iterator for RawBlocks<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while !self.done {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if line.trim_end() == RECORD_SEPARATOR {
                        if let Some(done_block) = self.current.replace(Vec::new()) {
                            if let Some(text) = Self::finish(done_block) {
                                return Some(text);
                            }
                        }
                    } else if let Some(block) = self.current.as_mut() {
                        block.push(line);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "audit log read interrupted");
                    self.done = true;
                }
                None => self.done = true,
            }
        }
        self.current.take().and_then(Self::finish)
    }
}
