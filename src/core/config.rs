//! `modeward.toml` settings.
//!
//! Every field is defaulted, so a workspace without a config file runs on the
//! built-in phrase tables, constraint registry and tool scopes. The reference
//! digest for overrides may also come from `MODEWARD_ADMIN_TOKEN_HASH`; this is
//! the only place the process environment is consulted.

use crate::core::error::ModewardError;
use crate::core::mode::ToolScopes;
use crate::plugins::constraints::{ConstraintSpec, default_registry};
use crate::plugins::override_gate::CredentialConfig;
use crate::plugins::transition::ModePhrases;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "modeward.toml";
pub const TOKEN_HASH_ENV: &str = "MODEWARD_ADMIN_TOKEN_HASH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    #[serde(rename = "override")]
    pub override_: OverrideSettings,
    pub modes: ModePhrases,
    pub constraints: Vec<ConstraintSpec>,
    pub diagnostics: DiagnosticsSettings,
    pub scopes: ToolScopes,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathSettings::default(),
            override_: OverrideSettings::default(),
            modes: ModePhrases::default(),
            constraints: default_registry(),
            diagnostics: DiagnosticsSettings::default(),
            scopes: ToolScopes::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub agent_config: PathBuf,
    pub channels_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            agent_config: PathBuf::from("agents/agent.yaml"),
            channels_dir: PathBuf::from("channels"),
            tools_dir: PathBuf::from("tools"),
            state_dir: PathBuf::from(".modeward"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideSettings {
    /// SHA-256 hex digest of the operator token. Never the raw secret.
    pub token_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub expected_tools: Vec<String>,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            expected_tools: [
                "memory_query",
                "proposal_generator",
                "validation_workflow",
                "gentle_suggestion",
                "system_diagnostics",
                "state_override",
                "constraint_audit",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Settings {
    /// Load `<root>/modeward.toml` (defaults when absent) and apply the
    /// environment override for the reference digest.
    pub fn load(root: &Path) -> Result<Self, ModewardError> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml(&content)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        settings.apply_token_hash_env(std::env::var(TOKEN_HASH_ENV).ok());
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, ModewardError> {
        let settings: Settings = toml::from_str(content)?;
        settings.check()?;
        Ok(settings)
    }

    /// An env value, when present, replaces the file value. Blank values are
    /// kept as-is and later treated as "not configured".
    pub fn apply_token_hash_env(&mut self, value: Option<String>) {
        if let Some(v) = value {
            self.override_.token_hash = Some(v);
        }
    }

    pub fn credentials(&self) -> CredentialConfig {
        CredentialConfig::new(self.override_.token_hash.as_deref())
    }

    fn check(&self) -> Result<(), ModewardError> {
        let mut seen = std::collections::HashSet::new();
        for spec in &self.constraints {
            if spec.name.trim().is_empty() {
                return Err(ModewardError::ConfigError(
                    "constraint with empty name".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ModewardError::ConfigError(format!(
                    "duplicate constraint '{}'",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}
