use modeward::core::audit::{AuditEntry, AuditKind, AuditLog, BlockIter, EntryIter, MemoryAuditLog};
use modeward::core::config::Settings;
use modeward::core::error::ModewardError;
use modeward::core::mode::Mode;
use modeward::plugins::override_gate::{
    CredentialConfig, OverrideGateway, OverrideStatus, digest_token,
};
use modeward::plugins::transition::Trigger;

const TOKEN: &str = "correct horse battery staple";

fn configured() -> CredentialConfig {
    CredentialConfig::new(Some(&digest_token(TOKEN)))
}

#[test]
fn correct_credential_is_authorized_and_audited_once() {
    let log = MemoryAuditLog::new();
    let gateway = OverrideGateway::new(configured(), &log);

    let response = gateway.request_override("administrative", TOKEN);
    assert_eq!(response.status, OverrideStatus::Ok);
    assert!(response.message.contains("administrative"));

    let entries = log.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, AuditKind::OverrideApplied);
    assert_eq!(entries[0].target_mode, Some(Mode::Administrative));
}

#[test]
fn wrong_credential_is_rejected_and_audited_once() {
    let log = MemoryAuditLog::new();
    let gateway = OverrideGateway::new(configured(), &log);

    let response = gateway.request_override("companion", "not the token");
    assert_eq!(response.status, OverrideStatus::Error);
    assert!(response.into_grant().is_none());

    let entries = log.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, AuditKind::OverrideRejected);
    assert_eq!(entries[0].target_mode, Some(Mode::Companion));
    assert_eq!(entries[0].outcome, "invalid token");
    assert!(entries[0].subject.is_none());
}

#[test]
fn unknown_mode_writes_nothing() {
    let log = MemoryAuditLog::new();
    let gateway = OverrideGateway::new(configured(), &log);

    for target in ["sleeping", "Administrative", "", " operational"] {
        let response = gateway.request_override(target, TOKEN);
        assert_eq!(response.status, OverrideStatus::Error, "{:?}", target);
    }
    assert!(log.is_empty().unwrap());
}

#[test]
fn fail_closed_rejects_even_the_previously_valid_token() {
    let log = MemoryAuditLog::new();
    let gateway = OverrideGateway::new(CredentialConfig::fail_closed(), &log);

    for credential in [TOKEN, "", digest_token(TOKEN).as_str()] {
        let response = gateway.request_override("administrative", credential);
        assert_eq!(response.status, OverrideStatus::Error);
    }
    let entries = log.snapshot();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.kind == AuditKind::OverrideRejected));
    assert!(entries.iter().all(|e| e.outcome == "invalid token"));
}

#[test]
fn settings_without_digest_are_fail_closed() {
    let mut settings = Settings::default();
    assert!(!settings.credentials().is_configured());

    settings.apply_token_hash_env(Some(String::new()));
    assert!(!settings.credentials().is_configured());

    settings.apply_token_hash_env(Some(digest_token(TOKEN)));
    let log = MemoryAuditLog::new();
    let gateway = OverrideGateway::new(settings.credentials(), &log);
    assert!(gateway.request_override("operational", TOKEN).is_ok());
}

#[test]
fn grant_is_applied_by_the_caller() {
    let log = MemoryAuditLog::new();
    let gateway = OverrideGateway::new(configured(), &log);
    let grant = gateway
        .request_override("companion", TOKEN)
        .into_grant()
        .expect("grant");

    let transition = grant.apply(Mode::Operational);
    assert_eq!(transition.from, Mode::Operational);
    assert_eq!(transition.to, Mode::Companion);
    assert_eq!(transition.trigger, Trigger::Override);
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
fn unauditable_override_is_denied() {
    let gateway = OverrideGateway::new(configured(), &BrokenLog);
    let response = gateway.request_override("administrative", TOKEN);
    assert_eq!(response.status, OverrideStatus::Error);
    assert!(response.into_grant().is_none());
}
