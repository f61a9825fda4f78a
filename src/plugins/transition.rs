//! Mode detection.
//!
//! Incoming text is classified against an ordered rule table. Precedence is
//! fixed: administrative phrases, then companion phrases, then task keywords.
//! The first rule with a matching pattern wins; no match keeps the current
//! mode. Matching is substring containment on lower-cased text, nothing more.

use crate::core::audit::{AuditEntry, AuditKind, AuditLog, FileAuditLog};
use crate::core::config::Settings;
use crate::core::error::ModewardError;
use crate::core::mode::Mode;
use crate::core::store::Store;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Phrase and keyword sets per target mode, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModePhrases {
    pub administrative: Vec<String>,
    pub companion: Vec<String>,
    pub operational: Vec<String>,
}

impl Default for ModePhrases {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            administrative: owned(&["enter administrative mode", "admin mode"]),
            companion: owned(&["companion mode", "switch to companion"]),
            operational: owned(&[
                "code",
                "debug",
                "analyze",
                "plan",
                "budget",
                "architecture",
                "refactor",
                "profile",
                "optimize",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeRule {
    pub target: Mode,
    /// Lower-cased, non-empty patterns.
    pub patterns: Vec<String>,
}

/// Ordered rule table. Construction always lays rules out as
/// administrative → companion → operational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeRules {
    rules: Vec<ModeRule>,
}

impl Default for ModeRules {
    fn default() -> Self {
        Self::from_phrases(&ModePhrases::default())
    }
}

impl ModeRules {
    pub fn from_phrases(phrases: &ModePhrases) -> Self {
        let normalize = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|p| p.trim().to_lowercase())
                // An empty pattern would match every input.
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            rules: vec![
                ModeRule {
                    target: Mode::Administrative,
                    patterns: normalize(&phrases.administrative),
                },
                ModeRule {
                    target: Mode::Companion,
                    patterns: normalize(&phrases.companion),
                },
                ModeRule {
                    target: Mode::Operational,
                    patterns: normalize(&phrases.operational),
                },
            ],
        }
    }

    pub fn rules(&self) -> &[ModeRule] {
        &self.rules
    }

    /// First matching rule and the pattern that matched it.
    pub fn matched(&self, text: &str) -> Option<(Mode, &str)> {
        let lower = text.to_lowercase();
        self.rules.iter().find_map(|rule| {
            rule.patterns
                .iter()
                .find(|p| lower.contains(p.as_str()))
                .map(|p| (rule.target, p.as_str()))
        })
    }

    /// Total and side-effect free: always returns one of the three modes.
    pub fn detect(&self, text: &str, current: Mode) -> Mode {
        self.matched(text).map(|(mode, _)| mode).unwrap_or(current)
    }

    pub fn evaluate(&self, request: TransitionRequest) -> Transition {
        match self.matched(&request.text) {
            Some((to, pattern)) => Transition {
                from: request.current,
                to,
                trigger: Trigger::Detected {
                    pattern: pattern.to_string(),
                },
            },
            None => Transition {
                from: request.current,
                to: request.current,
                trigger: Trigger::NoMatch,
            },
        }
    }
}

/// Input text plus the caller's current mode; consumed by evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub text: String,
    pub current: Mode,
}

impl TransitionRequest {
    pub fn new(text: &str, current: Mode) -> Self {
        Self {
            text: text.to_string(),
            current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Detected { pattern: String },
    NoMatch,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
    pub trigger: Trigger,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Write a `MODE_TRANSITION` entry for a detected change. Override
/// transitions are already recorded by the gateway's `OVERRIDE_APPLIED`
/// entry and are not written twice.
pub fn record_transition(
    log: &dyn AuditLog,
    transition: &Transition,
) -> Result<Option<AuditEntry>, ModewardError> {
    let pattern = match &transition.trigger {
        Trigger::Detected { pattern } if transition.changed() => pattern,
        _ => return Ok(None),
    };
    let outcome = format!("detected '{}'", pattern);
    let entry = AuditEntry::new(AuditKind::ModeTransition, &outcome)
        .with_target(transition.to)
        .with_subject(&format!("from {}", transition.from));
    log.append(entry).map(Some)
}

/// Audit a detected change, then persist it. A change that cannot be
/// audited is not persisted. Returns whether the mode file was written.
pub fn apply_transition(
    log: &dyn AuditLog,
    mode_file: &ModeFile,
    transition: &Transition,
) -> Result<bool, ModewardError> {
    if !transition.changed() {
        return Ok(false);
    }
    if let Err(e) = record_transition(log, transition) {
        tracing::error!(from = %transition.from, to = %transition.to, error = %e, "transition not audited; mode left unchanged");
        return Err(e);
    }
    mode_file.save(transition.to)?;
    tracing::info!(from = %transition.from, to = %transition.to, "mode transition applied");
    Ok(true)
}

/// Caller-owned persistence of the current mode.
#[derive(Debug, Clone)]
pub struct ModeFile {
    path: PathBuf,
}

impl ModeFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// `Ok(None)` when nothing has been persisted yet.
    pub fn read(&self) -> Result<Option<Mode>, ModewardError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw.trim().parse::<Mode>().map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Missing or unreadable state falls back to the default mode.
    pub fn load(&self) -> Mode {
        match self.read() {
            Ok(mode) => mode.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "mode file unusable, using default");
                Mode::default()
            }
        }
    }

    pub fn save(&self, mode: Mode) -> Result<(), ModewardError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", mode))?;
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[clap(name = "mode", about = "Inspect and drive mode detection")]
pub struct ModeCli {
    #[clap(subcommand)]
    pub command: ModeCommand,
}

#[derive(Subcommand, Debug)]
pub enum ModeCommand {
    /// Print the current mode.
    Show,
    /// Classify text against the rule table.
    Detect {
        text: String,
        /// Persist (and audit) the resulting mode.
        #[clap(long)]
        apply: bool,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Print the ordered rule table.
    Rules,
}

pub fn run_mode_cli(store: &Store, settings: &Settings, cli: ModeCli) -> Result<(), ModewardError> {
    let mode_file = ModeFile::new(&store.mode_path());
    let rules = ModeRules::from_phrases(&settings.modes);
    match cli.command {
        ModeCommand::Show => println!("{}", mode_file.load()),
        ModeCommand::Detect {
            text,
            apply,
            format,
        } => {
            let transition = rules.evaluate(TransitionRequest::new(&text, mode_file.load()));
            if apply {
                apply_transition(
                    &FileAuditLog::new(&store.audit_log_path()),
                    &mode_file,
                    &transition,
                )?;
            }
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&transition)?);
            } else if transition.changed() {
                println!("{} -> {}", transition.from, transition.to);
            } else {
                println!("{} (unchanged)", transition.to);
            }
        }
        ModeCommand::Rules => {
            for (i, rule) in rules.rules().iter().enumerate() {
                println!("{}. {}: {}", i + 1, rule.target, rule.patterns.join(", "));
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "mode",
        "version": "0.3.0",
        "description": "Keyword-driven mode detection with fixed precedence",
        "commands": [
            { "name": "show", "parameters": [] },
            { "name": "detect", "parameters": ["text", "apply", "format"] },
            { "name": "rules", "parameters": [] }
        ],
        "storage": ["mode", "audit.log"]
    })
}
