//! Authenticated override gateway.
//!
//! The only path to force a mode outside detection. A request names a target
//! mode and carries a credential; the credential's SHA-256 digest is compared
//! in constant time against the configured reference digest. With no
//! reference digest configured every credential is rejected.
//!
//! Every request naming a valid mode writes exactly one audit entry
//! (`OVERRIDE_APPLIED` or `OVERRIDE_REJECTED`). Requests naming an unknown
//! mode write none. The gateway authorizes; it never changes the mode. A
//! successful response carries a single-use [`OverrideGrant`] that the caller
//! applies to its own mode value.

use crate::core::audit::{AuditEntry, AuditKind, AuditLog, FileAuditLog};
use crate::core::config::Settings;
use crate::core::error::ModewardError;
use crate::core::mode::Mode;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::transition::{ModeFile, Transition, Trigger};
use clap::Parser;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const TOKEN_ENV: &str = "MODEWARD_ADMIN_TOKEN";

/// Lower-case hex SHA-256 of a token, the form reference digests are stored in.
pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reference digest injected at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialConfig {
    reference_digest: Option<String>,
}

impl CredentialConfig {
    /// Blank digests are treated as not configured.
    pub fn new(reference_digest: Option<&str>) -> Self {
        let reference_digest = reference_digest
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty());
        if let Some(d) = &reference_digest {
            if d.len() != 64 || !d.chars().all(|c| c.is_ascii_hexdigit()) {
                tracing::warn!("reference digest is not a SHA-256 hex string; no credential can match");
            }
        }
        Self { reference_digest }
    }

    pub fn fail_closed() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.reference_digest.is_some()
    }

    fn verify(&self, credential: &str) -> bool {
        match &self.reference_digest {
            Some(reference) => digest_token(credential)
                .as_bytes()
                .ct_eq(reference.as_bytes())
                .into(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideStatus {
    Ok,
    Error,
}

/// Authorization to move to `target`. Not cloneable; consumed on apply.
#[derive(Debug, PartialEq, Eq)]
pub struct OverrideGrant {
    target: Mode,
}

impl OverrideGrant {
    pub fn target(&self) -> Mode {
        self.target
    }

    pub fn apply(self, current: Mode) -> Transition {
        Transition {
            from: current,
            to: self.target,
            trigger: Trigger::Override,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OverrideResponse {
    pub status: OverrideStatus,
    pub message: String,
    #[serde(skip)]
    grant: Option<OverrideGrant>,
}

impl OverrideResponse {
    fn error(message: String) -> Self {
        Self {
            status: OverrideStatus::Error,
            message,
            grant: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OverrideStatus::Ok
    }

    pub fn into_grant(self) -> Option<OverrideGrant> {
        self.grant
    }
}

/// Outcome recorded for every credential mismatch, fail-closed included.
pub const REJECTED_OUTCOME: &str = "invalid token";
pub const FAIL_CLOSED_SUBJECT: &str = "no reference digest configured";

pub struct OverrideGateway<'a> {
    credentials: CredentialConfig,
    log: &'a dyn AuditLog,
}

impl<'a> OverrideGateway<'a> {
    pub fn new(credentials: CredentialConfig, log: &'a dyn AuditLog) -> Self {
        Self { credentials, log }
    }

    pub fn request_override(&self, target: &str, credential: &str) -> OverrideResponse {
        let mode = match target.parse::<Mode>() {
            Ok(mode) => mode,
            Err(e) => return OverrideResponse::error(e.to_string()),
        };

        if !self.credentials.verify(credential) {
            let fail_closed = !self.credentials.is_configured();
            tracing::warn!(target_mode = %mode, fail_closed, "override rejected");
            let mut entry =
                AuditEntry::new(AuditKind::OverrideRejected, REJECTED_OUTCOME).with_target(mode);
            if fail_closed {
                entry = entry.with_subject(FAIL_CLOSED_SUBJECT);
            }
            if let Err(e) = self.log.append(entry) {
                tracing::error!(error = %e, "failed to audit rejected override");
            }
            return OverrideResponse::error("Authentication failed. Override rejected.".to_string());
        }

        let entry = AuditEntry::new(AuditKind::OverrideApplied, "authorized").with_target(mode);
        if let Err(e) = self.log.append(entry) {
            // An override that cannot be audited is not granted.
            tracing::error!(error = %e, target_mode = %mode, "failed to audit override; denying");
            return OverrideResponse::error(format!(
                "Override to '{}' could not be audited and was not granted.",
                mode
            ));
        }

        tracing::info!(target_mode = %mode, "override authorized");
        OverrideResponse {
            status: OverrideStatus::Ok,
            message: format!("Mode override to '{}' authorized and logged.", mode),
            grant: Some(OverrideGrant { target: mode }),
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "override", about = "Force a mode change with an operator token")]
pub struct OverrideCli {
    /// Target mode: operational, companion or administrative.
    pub mode: String,
    /// Operator token.
    #[clap(long, env = "MODEWARD_ADMIN_TOKEN", hide_env_values = true)]
    pub token: String,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

pub fn run_override_cli(
    store: &Store,
    settings: &Settings,
    cli: OverrideCli,
) -> Result<(), ModewardError> {
    let log = FileAuditLog::new(&store.audit_log_path());
    let gateway = OverrideGateway::new(settings.credentials(), &log);
    let response = gateway.request_override(&cli.mode, &cli.token);

    if cli.format == "json" {
        let status = if response.is_ok() { "ok" } else { "error" };
        let envelope = time::command_envelope(
            "override",
            status,
            serde_json::json!({ "target": cli.mode, "message": response.message }),
        );
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", response.message);
    }

    if !response.is_ok() {
        return Err(ModewardError::InvalidInput(response.message));
    }
    if let Some(grant) = response.into_grant() {
        let mode_file = ModeFile::new(&store.mode_path());
        let transition = grant.apply(mode_file.load());
        mode_file.save(transition.to)?;
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "override",
        "version": "0.3.0",
        "description": "Authenticated, fail-closed mode override gateway",
        "commands": [
            { "name": "override", "parameters": ["mode", "token", "format"] }
        ],
        "storage": ["audit.log", "mode"]
    })
}
