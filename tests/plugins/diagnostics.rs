use modeward::core::audit::{AuditEntry, AuditKind, AuditLog, FileAuditLog};
use modeward::core::config::Settings;
use modeward::core::error::ModewardError;
use modeward::core::mode::Mode;
use modeward::core::store::Store;
use modeward::plugins::constraints::ComplianceStatus;
use modeward::plugins::diagnostics::{self, ModeStability, ToolAvailability};
use modeward::plugins::doctor::{self, CheckStatus};
use modeward::plugins::memory;
use modeward::plugins::proposal;
use modeward::plugins::transition::ModeFile;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn wired_workspace(root: &Path) {
    write(
        root,
        "agents/agent.yaml",
        "name: atlas\nstates:\n  operational: {}\n  companion: {}\n  administrative: {}\nmemory:\n  backend: markdown\nconstraints:\n  - no_cross_state_context_leakage\n  - no_emotional_output_in_operational_state\n  - no_system_commands_outside_administrative_state\n  - no_explicit_content\n",
    );
    write(root, "ai/guardrails.ts", "export const BANNED_PATTERNS = [];\n");
    write(root, "channels/rest.yaml", "adapter: rest\nport: 8080\nallowed_states: [operational, administrative]\n");
    write(root, "channels/cli.yaml", "adapter: cli\nallowed_modes: [operational, companion, administrative]\n");
    for tool in Settings::default().diagnostics.expected_tools {
        write(root, &format!("tools/{}.py", tool), "# tool\n");
    }
}

#[test]
fn empty_workspace_snapshot_degrades_quietly() {
    let tmp = tempdir().unwrap();
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);

    let report = diagnostics::collect(&store, &settings);
    assert_eq!(report.mode, Mode::Operational);
    assert_eq!(report.mode_stability, ModeStability::Stable);
    assert!(!report.audit_log.exists);
    assert_eq!(report.audit_log.entries, 0);
    assert_eq!(report.proposals.count, 0);
    assert!(report.channels.is_empty());
    assert_eq!(report.tools.len(), 7);
    assert!(report.tools.values().all(|t| *t == ToolAvailability::Missing));
    assert!(report.constraints.drift_detected);
    assert!(report
        .constraints
        .constraints
        .iter()
        .all(|c| c.status == ComplianceStatus::Unverifiable));
}

#[test]
fn wired_workspace_snapshot() {
    let tmp = tempdir().unwrap();
    wired_workspace(tmp.path());
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);

    ModeFile::new(&store.mode_path()).save(Mode::Administrative).unwrap();
    let log = FileAuditLog::new(&store.audit_log_path());
    log.append(AuditEntry::new(AuditKind::OverrideApplied, "authorized").with_target(Mode::Administrative))
        .unwrap();
    let p = proposal::generate("Refactor the parser").unwrap();
    proposal::save_proposal(&store.proposals_dir(), &p).unwrap();

    let report = diagnostics::collect(&store, &settings);
    assert_eq!(report.mode, Mode::Administrative);
    assert!(report.audit_log.exists);
    assert!(report.audit_log.bytes > 0);
    assert_eq!(report.audit_log.entries, 1);
    assert_eq!(report.proposals.count, 1);
    assert!(report.tools.values().all(|t| *t == ToolAvailability::Available));
    assert_eq!(report.channels.len(), 2);
    assert_eq!(report.channels[0].name, "cli");
    assert_eq!(report.channels[1].allowed_modes, vec![Mode::Operational, Mode::Administrative]);
    assert!(!report.constraints.drift_detected);

    // Diagnostics never writes.
    assert_eq!(log.len().unwrap(), 1);
}

#[test]
fn corrupt_mode_file_is_degraded() {
    let tmp = tempdir().unwrap();
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    write(tmp.path(), ".modeward/mode", "hibernating\n");

    let report = diagnostics::collect(&store, &settings);
    assert_eq!(report.mode, Mode::Operational);
    assert_eq!(report.mode_stability, ModeStability::Degraded);
}

#[test]
fn doctor_passes_on_wired_workspace() {
    let tmp = tempdir().unwrap();
    wired_workspace(tmp.path());
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);

    let report = doctor::run_preflight(&store, &settings);
    assert_eq!(report.failed, 0, "{:?}", report.checks);
    // Only the missing reference digest warns.
    assert_eq!(report.warnings, 1);
    assert_eq!(report.status_of("override-digest"), Some(CheckStatus::Warn));
    assert_eq!(report.status_of("mode-coverage:companion"), Some(CheckStatus::Pass));
}

#[test]
fn doctor_flags_broken_wiring() {
    let tmp = tempdir().unwrap();
    write(tmp.path(), "agents/agent.yaml", "name: atlas\nmodes: [operational, companion]\n");
    write(tmp.path(), "channels/rest.yaml", "port: 8080\n");
    write(tmp.path(), "channels/bad.yaml", "adapter: [unclosed\n");
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);

    let report = doctor::run_preflight(&store, &settings);
    assert_eq!(report.status_of("config:agents/agent.yaml"), Some(CheckStatus::Fail));
    assert_eq!(report.status_of("channel:rest"), Some(CheckStatus::Fail));
    assert_eq!(report.status_of("channel:bad"), Some(CheckStatus::Fail));
    assert_eq!(report.status_of("mode-coverage:companion"), Some(CheckStatus::Warn));
    assert_eq!(report.status_of("mode-coverage:administrative"), None);
    assert_eq!(report.status_of("tool:memory_query"), Some(CheckStatus::Fail));
}

#[test]
fn memory_query_reads_the_audit_log() {
    let tmp = tempdir().unwrap();
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let log = FileAuditLog::new(&store.audit_log_path());
    log.append(AuditEntry::new(AuditKind::ProposalValidated, "valid").with_subject("Migrate the Database"))
        .unwrap();
    log.append(AuditEntry::new(AuditKind::ProposalValidated, "valid").with_subject("Expose an API"))
        .unwrap();

    let hits = memory::query(&log, "database").unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].contains("SUBJECT: Migrate the Database"));
    assert_eq!(memory::query(&log, "PROPOSAL_VALIDATED").unwrap().len(), 2);
    assert!(memory::query(&log, "").unwrap().is_empty());
}

#[test]
fn notes_are_appended_and_searched_with_the_audit_log() {
    let tmp = tempdir().unwrap();
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let log = FileAuditLog::new(&store.audit_log_path());
    log.append(AuditEntry::new(AuditKind::ProposalValidated, "valid").with_subject("Tune the cache"))
        .unwrap();

    memory::write_note(&store.notes_path(), "Operator prefers short answers").unwrap();
    memory::write_note(&store.notes_path(), "Cache warmup takes ten minutes").unwrap();

    let notes = memory::read_notes(&store.notes_path()).unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes[0].contains("[note]"));
    assert!(notes[1].ends_with("Cache warmup takes ten minutes"));

    let hits = memory::search(&log, &store.notes_path(), "CACHE").unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].contains("SUBJECT: Tune the cache"));
    assert!(hits[1].contains("Cache warmup"));
    assert_eq!(memory::query_notes(&store.notes_path(), "short answers").unwrap().len(), 1);
}

#[test]
fn blank_note_is_rejected() {
    let tmp = tempdir().unwrap();
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    for note in ["", "   ", "\n\t"] {
        assert!(matches!(
            memory::write_note(&store.notes_path(), note),
            Err(ModewardError::InvalidInput(_))
        ));
    }
    assert!(!store.notes_path().exists());
    assert!(memory::read_notes(&store.notes_path()).unwrap().is_empty());
}
