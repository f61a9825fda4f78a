//! Proposal generation.
//!
//! Turns a free-text task description into a structured [`Proposal`]. The
//! phase skeleton and validation gates are templates; only the title and the
//! resource list depend on the description. Resources are inferred from an
//! ordered keyword table.

use crate::core::audit::{self, AuditEntry, AuditKind, AuditLog, FileAuditLog};
use crate::core::config::Settings;
use crate::core::error::ModewardError;
use crate::core::output;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::validation::{self, ValidationReport};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use ulid::Ulid;

pub const TITLE_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub steps: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub title: String,
    pub phases: Vec<Phase>,
    pub resources: Vec<String>,
    pub validation_gates: Vec<String>,
    pub generated_at: String,
}

/// Description keyword → resource requirement.
pub struct ResourceRule {
    pub keywords: &'static [&'static str],
    pub resource: &'static str,
}

pub const BASE_RESOURCES: [&str; 2] = ["repository_access", "test_runner"];

pub const RESOURCE_RULES: &[ResourceRule] = &[
    ResourceRule {
        keywords: &["database", "sqlite", "postgres", "mysql"],
        resource: "database_access",
    },
    ResourceRule {
        keywords: &["api", "http", "rest", "endpoint"],
        resource: "network_access",
    },
    ResourceRule {
        keywords: &["file", "read", "write", "disk"],
        resource: "filesystem_access",
    },
];

pub fn generate(description: &str) -> Result<Proposal, ModewardError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ModewardError::InvalidInput(
            "task description must not be empty".to_string(),
        ));
    }
    let title = extract_title(description);
    Ok(Proposal {
        phases: build_phases(),
        resources: infer_resources(description),
        validation_gates: build_validation_gates(&title),
        title,
        generated_at: time::now_iso(),
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// First sentence (split on `.`, `!`, `?` or newline), at most 80 chars.
pub fn extract_title(description: &str) -> String {
    let first = description
        .split(['.', '!', '?', '\n'])
        .next()
        .unwrap_or_default()
        .trim();
    if first.is_empty() {
        truncate_chars(description, TITLE_MAX_CHARS)
    } else {
        truncate_chars(first, TITLE_MAX_CHARS)
    }
}

pub fn infer_resources(description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    let mut resources: Vec<String> = BASE_RESOURCES.iter().map(|s| s.to_string()).collect();
    for rule in RESOURCE_RULES {
        if rule.keywords.iter().any(|kw| lower.contains(kw)) {
            resources.push(rule.resource.to_string());
        }
    }
    resources
}

fn phase(name: &str, steps: &[&str], outputs: &[&str]) -> Phase {
    Phase {
        name: name.to_string(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
    }
}

fn build_phases() -> Vec<Phase> {
    vec![
        phase(
            "Analysis",
            &[
                "Review task description and clarify scope.",
                "Identify dependencies and constraints.",
                "Document assumptions.",
            ],
            &["scope_document"],
        ),
        phase(
            "Execution",
            &[
                "Implement the changes described in the task.",
                "Write or update tests covering new behaviour.",
                "Commit with a descriptive message.",
            ],
            &["implementation", "tests"],
        ),
        phase(
            "Validation",
            &[
                "Run the relevant test suite.",
                "Confirm all validation gates pass.",
                "Peer-review or self-review the diff.",
            ],
            &["validation_report"],
        ),
    ]
}

fn build_validation_gates(title: &str) -> Vec<String> {
    vec![
        format!("All tests pass after implementing: {}", title),
        "No regressions in existing test suite.".to_string(),
        "Output matches expected schema.".to_string(),
        "No security-policy violations detected.".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub proposal: Proposal,
    pub report: ValidationReport,
    /// Whether the `PROPOSAL_VALIDATED` entry reached the log.
    pub audited: bool,
}

/// Generate, validate and audit in one pass. An audit failure is logged and
/// flagged in the output; the proposal is still returned.
pub fn run_pipeline(description: &str, log: &dyn AuditLog) -> Result<PipelineOutput, ModewardError> {
    let proposal = generate(description)?;
    let report = validation::validate_proposal(&proposal)?;
    let audited = record_validation(log, Some(&proposal.title), &report);
    Ok(PipelineOutput {
        proposal,
        report,
        audited,
    })
}

pub fn validation_entry(title: Option<&str>, report: &ValidationReport) -> AuditEntry {
    let outcome = if report.valid {
        format!("valid ({} warning(s))", report.warnings.len())
    } else {
        format!("invalid ({} error(s))", report.errors.len())
    };
    let entry = AuditEntry::new(AuditKind::ProposalValidated, &outcome);
    match title {
        Some(title) => entry.with_subject(title),
        None => entry,
    }
}

/// Best-effort `PROPOSAL_VALIDATED` append; `false` when the write failed.
pub fn record_validation(log: &dyn AuditLog, title: Option<&str>, report: &ValidationReport) -> bool {
    audit::append_or_log(log, validation_entry(title, report))
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= 48 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "proposal".to_string()
    } else {
        slug.to_string()
    }
}

pub fn render_markdown(proposal: &Proposal) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", proposal.title);
    let _ = writeln!(md, "Generated: {}\n", proposal.generated_at);
    let _ = writeln!(md, "## Phases\n");
    for (i, phase) in proposal.phases.iter().enumerate() {
        let _ = writeln!(md, "### {}. {}\n", i + 1, phase.name);
        for step in &phase.steps {
            let _ = writeln!(md, "- {}", step);
        }
        let _ = writeln!(md, "\nOutputs: {}\n", phase.outputs.join(", "));
    }
    let _ = writeln!(md, "## Resources\n");
    for resource in &proposal.resources {
        let _ = writeln!(md, "- {}", resource);
    }
    let _ = writeln!(md, "\n## Validation gates\n");
    for gate in &proposal.validation_gates {
        let _ = writeln!(md, "- [ ] {}", gate);
    }
    md
}

/// Persist a proposal as Markdown under `dir`; never overwrites.
pub fn save_proposal(dir: &Path, proposal: &Proposal) -> Result<PathBuf, ModewardError> {
    std::fs::create_dir_all(dir)?;
    let file_name = format!(
        "{}-{}-{}.md",
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ"),
        slugify(&proposal.title),
        Ulid::new().to_string().to_lowercase()
    );
    let path = dir.join(file_name);
    std::fs::write(&path, render_markdown(proposal))?;
    Ok(path)
}

/// Configuration sections a change may be proposed for. Proposals only
/// name a section; they never carry a path.
pub const CONFIG_TARGETS: [&str; 5] = [
    "core-identity",
    "operational-baseline",
    "companion-mode",
    "guardrails",
    "state-machine",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChange {
    pub target: String,
    pub rationale: String,
    pub content: String,
}

impl ConfigChange {
    pub fn new(target: &str, rationale: &str, content: &str) -> Result<Self, ModewardError> {
        if !CONFIG_TARGETS.contains(&target) {
            return Err(ModewardError::InvalidInput(format!(
                "unknown proposal target '{}'; allowed: {}",
                target,
                CONFIG_TARGETS.join(", ")
            )));
        }
        if rationale.trim().is_empty() {
            return Err(ModewardError::InvalidInput("rationale must not be empty".to_string()));
        }
        if content.trim().is_empty() {
            return Err(ModewardError::InvalidInput(
                "proposed content must not be empty".to_string(),
            ));
        }
        Ok(Self {
            target: target.to_string(),
            rationale: rationale.trim().to_string(),
            content: content.trim().to_string(),
        })
    }

    pub fn render_markdown(&self, proposed_at: &str) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Config change proposal: {}\n", self.target);
        let _ = writeln!(md, "**Status**: PENDING OPERATOR REVIEW");
        let _ = writeln!(md, "**Proposed at**: {}", proposed_at);
        let _ = writeln!(md, "**Target**: `{}`\n", self.target);
        let _ = writeln!(md, "## Rationale\n\n{}\n", self.rationale);
        let _ = writeln!(md, "## Proposed content\n\n{}\n", self.content);
        let _ = writeln!(md, "---");
        let _ = writeln!(
            md,
            "*Not applied. An operator must review and apply this change by hand.*"
        );
        md
    }
}

/// Stage a change for operator review under `dir`. Nothing is applied.
pub fn propose_config_change(dir: &Path, change: &ConfigChange) -> Result<PathBuf, ModewardError> {
    std::fs::create_dir_all(dir)?;
    let now = chrono::Utc::now();
    let file_name = format!(
        "{}-{}-{}.md",
        now.format("%Y%m%dT%H%M%SZ"),
        change.target,
        Ulid::new().to_string().to_lowercase()
    );
    let path = dir.join(file_name);
    std::fs::write(&path, change.render_markdown(&time::iso(&now)))?;
    tracing::info!(target_section = %change.target, path = %path.display(), "config change staged for review");
    Ok(path)
}

pub fn count_saved(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
                .count()
        })
        .unwrap_or(0)
}

#[derive(Parser, Debug)]
#[clap(name = "proposal", about = "Generate and validate structured work proposals")]
pub struct ProposalCli {
    #[clap(subcommand)]
    pub command: ProposalCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProposalCommand {
    /// Generate a proposal from a task description, validate and audit it.
    Generate {
        description: String,
        /// Persist the proposal under the state directory.
        #[clap(long)]
        save: bool,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Stage a configuration change for operator review.
    Propose {
        /// One of: core-identity, operational-baseline, companion-mode,
        /// guardrails, state-machine.
        #[clap(long)]
        target: String,
        #[clap(long)]
        rationale: String,
        #[clap(long)]
        content: String,
    },
    /// Validate a proposal JSON document (stdin when no file is given).
    Validate {
        #[clap(long)]
        file: Option<PathBuf>,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}

fn print_report(report: &ValidationReport) {
    println!(
        "Validation: {}",
        output::status_tag(if report.valid { "VALID" } else { "INVALID" })
    );
    for e in &report.errors {
        println!("  [{}] {}", output::status_tag("ERROR"), e);
    }
    for w in &report.warnings {
        println!("  [{}] {}", output::status_tag("WARN"), w);
    }
}

pub fn run_proposal_cli(
    store: &Store,
    _settings: &Settings,
    cli: ProposalCli,
) -> Result<(), ModewardError> {
    let log = FileAuditLog::new(&store.audit_log_path());
    match cli.command {
        ProposalCommand::Generate {
            description,
            save,
            format,
        } => {
            let PipelineOutput {
                proposal,
                report,
                audited,
            } = run_pipeline(&description, &log)?;
            let saved = if save {
                Some(save_proposal(&store.proposals_dir(), &proposal)?)
            } else {
                None
            };
            if format == "json" {
                let out = serde_json::json!({
                    "proposal": proposal,
                    "report": report,
                    "audited": audited,
                    "saved_to": saved.as_ref().map(|p| p.display().to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", render_markdown(&proposal));
                println!();
                print_report(&report);
                if let Some(path) = saved {
                    println!("Saved: {}", path.display());
                }
            }
        }
        ProposalCommand::Propose {
            target,
            rationale,
            content,
        } => {
            let change = ConfigChange::new(&target, &rationale, &content)?;
            let path = propose_config_change(&store.proposals_dir(), &change)?;
            println!("Proposal written to {}; awaiting operator review", path.display());
        }
        ProposalCommand::Validate { file, format } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let doc: serde_json::Value = serde_json::from_str(&raw)?;
            let report = validation::validate(&doc);
            record_validation(&log, doc.get("title").and_then(|t| t.as_str()), &report);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if !report.valid {
                return Err(ModewardError::ValidationError(output::preview_messages(
                    &report.errors,
                    3,
                    80,
                )));
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "proposal",
        "version": "0.3.0",
        "description": "Proposal generator and schema validator",
        "commands": [
            { "name": "generate", "parameters": ["description", "save", "format"] },
            { "name": "propose", "parameters": ["target", "rationale", "content"] },
            { "name": "validate", "parameters": ["file", "format"] }
        ],
        "config_targets": CONFIG_TARGETS,
        "proposal_fields": ["title", "phases", "resources", "validation_gates", "generated_at"],
        "phase_fields": ["name", "steps", "outputs"],
        "storage": ["proposals/*.md", "audit.log"]
    })
}
