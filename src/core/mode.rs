//! The agent's operating mode and the tools each mode permits.

use crate::core::error::ModewardError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Exactly one mode is active at any instant. The value is owned by the
/// caller; detection and override only ever compute a new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Operational,
    Companion,
    Administrative,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Operational, Mode::Companion, Mode::Administrative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Operational => "operational",
            Mode::Companion => "companion",
            Mode::Administrative => "administrative",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ModewardError;

    /// Exact, case-sensitive match on the lower-case wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operational" => Ok(Mode::Operational),
            "companion" => Ok(Mode::Companion),
            "administrative" => Ok(Mode::Administrative),
            other => Err(ModewardError::UnknownMode(other.to_string())),
        }
    }
}

/// Mode → allowed tool names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolScopes {
    pub operational: Vec<String>,
    pub companion: Vec<String>,
    pub administrative: Vec<String>,
}

impl Default for ToolScopes {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            operational: owned(&[
                "memory_query",
                "write_memory",
                "proposal_generator",
                "validation_workflow",
                "propose_config_change",
            ]),
            companion: owned(&["memory_query", "write_memory", "gentle_suggestion"]),
            administrative: owned(&[
                "memory_query",
                "write_memory",
                "system_diagnostics",
                "state_override",
                "constraint_audit",
                "propose_config_change",
            ]),
        }
    }
}

impl ToolScopes {
    pub fn tools_for(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Operational => &self.operational,
            Mode::Companion => &self.companion,
            Mode::Administrative => &self.administrative,
        }
    }

    pub fn permits(&self, mode: Mode, tool: &str) -> bool {
        self.tools_for(mode).iter().any(|t| t == tool)
    }

    /// Which modes permit each known tool, for reporting.
    pub fn by_tool(&self) -> BTreeMap<String, Vec<Mode>> {
        let mut out: BTreeMap<String, Vec<Mode>> = BTreeMap::new();
        for mode in Mode::ALL {
            for tool in self.tools_for(mode) {
                out.entry(tool.clone()).or_default().push(mode);
            }
        }
        out
    }
}
