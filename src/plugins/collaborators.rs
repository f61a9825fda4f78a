//! Read-only views of collaborator documents.
//!
//! The agent configuration (`agents/agent.yaml`) and channel configurations
//! (`channels/*.yaml`) belong to other components. modeward parses just
//! enough of them to run preflight checks and report diagnostics, and never
//! writes them.

use crate::core::error::ModewardError;
use crate::core::mode::Mode;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

pub const AGENT_REQUIRED_KEYS: [&str; 4] = ["name", "modes", "memory", "constraints"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemorySection {
    pub backend: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentDocument {
    pub name: Option<String>,
    #[serde(alias = "states")]
    pub modes: Option<Value>,
    pub memory: Option<MemorySection>,
    pub constraints: Option<Value>,
    pub tools: Option<Value>,
}

/// Names from a YAML list of strings, a list of `{name: ..}` maps, or the
/// keys of a map.
fn names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Mapping(m) => m.get("name").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
        Some(Value::Mapping(map)) => map
            .keys()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

impl AgentDocument {
    pub fn parse(text: &str) -> Result<Self, ModewardError> {
        // An empty document deserializes as null.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ModewardError> {
        if !path.exists() {
            return Err(ModewardError::NotFound(path.display().to_string()));
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        let present = [
            self.name.is_some(),
            self.modes.is_some(),
            self.memory.is_some(),
            self.constraints.is_some(),
        ];
        AGENT_REQUIRED_KEYS
            .iter()
            .zip(present)
            .filter(|(_, p)| !p)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn mode_names(&self) -> Vec<String> {
        names(self.modes.as_ref())
    }

    pub fn memory_backend(&self) -> Option<&str> {
        self.memory.as_ref().and_then(|m| m.backend.as_deref())
    }

    pub fn constraint_names(&self) -> Vec<String> {
        names(self.constraints.as_ref())
    }

    pub fn tool_names(&self) -> Vec<String> {
        names(self.tools.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelDocument {
    pub adapter: Option<String>,
    pub port: Option<u16>,
    #[serde(default, alias = "allowed_states")]
    pub allowed_modes: Option<Vec<String>>,
}

impl ChannelDocument {
    pub fn parse(text: &str) -> Result<Self, ModewardError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.adapter.is_none() {
            missing.push("adapter");
        }
        if self.allowed_modes.is_none() {
            missing.push("allowed_modes");
        }
        missing
    }

    /// Allowed modes that name a real mode; anything else is ignored.
    pub fn modes(&self) -> Vec<Mode> {
        self.allowed_modes
            .iter()
            .flatten()
            .filter_map(|m| m.parse().ok())
            .collect()
    }
}

/// One channel document as found on disk.
#[derive(Debug)]
pub struct ChannelEntry {
    pub name: String,
    pub path: PathBuf,
    pub document: Result<ChannelDocument, ModewardError>,
}

/// Every `*.yaml` / `*.yml` file in `dir`, sorted by name. A missing
/// directory yields no channels.
pub fn load_channels(dir: &Path) -> Vec<ChannelEntry> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut channels: Vec<ChannelEntry> = read
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .map(|path| {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let document = std::fs::read_to_string(&path)
                .map_err(ModewardError::from)
                .and_then(|text| ChannelDocument::parse(&text));
            if let Err(e) = &document {
                tracing::warn!(path = %path.display(), error = %e, "unreadable channel document");
            }
            ChannelEntry {
                name,
                path,
                document,
            }
        })
        .collect();
    channels.sort_by(|a, b| a.name.cmp(&b.name));
    channels
}
