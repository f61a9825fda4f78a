use modeward::core::audit::{AuditEntry, AuditKind, AuditLog, BlockIter, EntryIter, MemoryAuditLog};
use modeward::core::config::Settings;
use modeward::core::error::ModewardError;
use modeward::core::store::Store;
use modeward::plugins::constraints::{
    ComplianceEngine, ComplianceStatus, ConstraintSpec, audit_and_record, default_registry,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FULL_AGENT: &str = "\
name: atlas
modes: [operational, companion, administrative]
memory:
  backend: markdown
constraints:
  - no_cross_state_context_leakage
  - no_emotional_output_in_operational_state
  - no_system_commands_outside_administrative_state
  - no_explicit_content
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn full_configuration_has_no_drift() {
    let tmp = tempdir().unwrap();
    write(tmp.path(), "agents/agent.yaml", FULL_AGENT);
    write(tmp.path(), "ai/guardrails.ts", "export const BANNED_PATTERNS = [];\n");

    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let report = ComplianceEngine::from_settings(&store, &settings).audit();

    assert!(!report.drift_detected, "{:?}", report.constraints);
    assert_eq!(report.summary, "All constraints active.");
    let names: Vec<&str> = report.constraints.iter().map(|c| c.name.as_str()).collect();
    let expected: Vec<String> = default_registry().into_iter().map(|c| c.name).collect();
    assert_eq!(names, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn missing_configuration_makes_everything_unverifiable() {
    let tmp = tempdir().unwrap();
    write(tmp.path(), "ai/guardrails.ts", "BANNED_PATTERNS");

    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let report = ComplianceEngine::from_settings(&store, &settings).audit();

    assert!(report.drift_detected);
    assert_eq!(report.constraints.len(), 4);
    assert!(report
        .constraints
        .iter()
        .all(|c| c.status == ComplianceStatus::Unverifiable));
    assert_eq!(report.summary, "4 constraint(s) require attention.");
}

#[test]
fn absent_name_is_drift() {
    let tmp = tempdir().unwrap();
    write(
        tmp.path(),
        "agents/agent.yaml",
        &FULL_AGENT.replace("  - no_emotional_output_in_operational_state\n", ""),
    );
    write(tmp.path(), "ai/guardrails.ts", "BANNED_PATTERNS");

    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let report = ComplianceEngine::from_settings(&store, &settings).audit();

    assert!(report.drift_detected);
    assert_eq!(
        report.status_of("no_emotional_output_in_operational_state"),
        Some(ComplianceStatus::Drift)
    );
    assert_eq!(
        report.status_of("no_cross_state_context_leakage"),
        Some(ComplianceStatus::Active)
    );
    assert_eq!(report.summary, "1 constraint(s) require attention.");
}

#[test]
fn delegated_constraint_needs_artifact_and_marker() {
    let tmp = tempdir().unwrap();
    write(tmp.path(), "agents/agent.yaml", FULL_AGENT);

    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let engine = ComplianceEngine::from_settings(&store, &settings);

    let report = engine.audit();
    assert_eq!(
        report.status_of("no_explicit_content"),
        Some(ComplianceStatus::Unverifiable)
    );

    write(tmp.path(), "ai/guardrails.ts", "// patterns live elsewhere\n");
    assert_eq!(
        engine.audit().status_of("no_explicit_content"),
        Some(ComplianceStatus::Unverifiable)
    );

    write(tmp.path(), "ai/guardrails.ts", "const BANNED_PATTERNS = [/x/];\n");
    assert_eq!(
        engine.audit().status_of("no_explicit_content"),
        Some(ComplianceStatus::Active)
    );
}

#[test]
fn status_is_recomputed_on_every_audit() {
    let tmp = tempdir().unwrap();
    let registry = vec![ConstraintSpec::direct("stay_calm")];
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let engine = ComplianceEngine::new(&store, &registry, Path::new("agent.yaml"));

    assert_eq!(engine.audit().status_of("stay_calm"), Some(ComplianceStatus::Unverifiable));

    write(tmp.path(), "agent.yaml", "constraints: []\n");
    assert_eq!(engine.audit().status_of("stay_calm"), Some(ComplianceStatus::Drift));

    write(tmp.path(), "agent.yaml", "constraints: [stay_calm]\n");
    let report = engine.audit();
    assert_eq!(report.status_of("stay_calm"), Some(ComplianceStatus::Active));
    assert!(!report.drift_detected);
}

struct BrokenLog;

impl AuditLog for BrokenLog {
    fn append(&self, _entry: AuditEntry) -> Result<AuditEntry, ModewardError> {
        Err(ModewardError::IoError(std::io::Error::other("disk full")))
    }

    fn entries(&self) -> Result<EntryIter<'_>, ModewardError> {
        Ok(Box::new(std::iter::empty()))
    }

    fn blocks(&self) -> Result<BlockIter<'_>, ModewardError> {
        Ok(Box::new(std::iter::empty()))
    }
}

#[test]
fn audit_is_recorded_once() {
    let tmp = tempdir().unwrap();
    write(tmp.path(), "agents/agent.yaml", FULL_AGENT);
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);
    let log = MemoryAuditLog::new();

    let (report, audited) = audit_and_record(&ComplianceEngine::from_settings(&store, &settings), &log);
    assert!(audited);
    let entries = log.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, AuditKind::ConstraintAudit);
    assert_eq!(entries[0].outcome, report.summary);
}

#[test]
fn report_survives_an_unwritable_log() {
    let tmp = tempdir().unwrap();
    write(tmp.path(), "agents/agent.yaml", FULL_AGENT);
    write(tmp.path(), "ai/guardrails.ts", "BANNED_PATTERNS");
    let settings = Settings::default();
    let store = Store::new(tmp.path(), &settings);

    let (report, audited) =
        audit_and_record(&ComplianceEngine::from_settings(&store, &settings), &BrokenLog);
    assert!(!audited);
    assert!(!report.drift_detected);
    assert_eq!(report.constraints.len(), 4);
}
