//! Proposal validation.
//!
//! Works on the JSON wire form rather than the typed [`Proposal`], since the
//! point is to catch documents that are missing fields or carry the wrong
//! types. Every check runs; errors are fatal, warnings never affect validity.
//!
//! [`Proposal`]: crate::plugins::proposal::Proposal

use crate::core::error::ModewardError;
use crate::core::time;
use crate::plugins::proposal::Proposal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const PHASE_REQUIRED_KEYS: [&str; 3] = ["name", "steps", "outputs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Text,
    Sequence,
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Sequence => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::Text => value.is_string(),
            FieldType::Sequence => value.is_array(),
        }
    }
}

struct FieldRule {
    name: &'static str,
    ty: FieldType,
    non_empty: bool,
}

const REQUIRED_FIELDS: [FieldRule; 4] = [
    FieldRule { name: "title", ty: FieldType::Text, non_empty: true },
    FieldRule { name: "phases", ty: FieldType::Sequence, non_empty: true },
    FieldRule { name: "resources", ty: FieldType::Sequence, non_empty: false },
    FieldRule { name: "validation_gates", ty: FieldType::Sequence, non_empty: false },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validated_at: String,
}

impl ValidationReport {
    fn new(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            validated_at: time::now_iso(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

pub fn validate(proposal: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let empty = Map::new();
    let fields = match proposal.as_object() {
        Some(map) => map,
        None => {
            errors.push(format!(
                "Proposal must be an object, got {}",
                type_name(proposal)
            ));
            &empty
        }
    };

    check_required_fields(fields, &mut errors);
    if let Some(Value::Array(phases)) = fields.get("phases") {
        check_phases(phases, &mut errors, &mut warnings);
    }
    if let Some(Value::Array(resources)) = fields.get("resources") {
        if resources.is_empty() {
            warnings.push("No resources listed; verify no dependencies are missing".to_string());
        }
    }
    if let Some(Value::Array(gates)) = fields.get("validation_gates") {
        if gates.is_empty() {
            warnings.push(
                "No validation gates defined; consider adding test criteria".to_string(),
            );
        }
    }

    ValidationReport::new(errors, warnings)
}

pub fn validate_proposal(proposal: &Proposal) -> Result<ValidationReport, ModewardError> {
    Ok(validate(&serde_json::to_value(proposal)?))
}

fn check_required_fields(fields: &Map<String, Value>, errors: &mut Vec<String>) {
    for rule in &REQUIRED_FIELDS {
        match fields.get(rule.name) {
            None => errors.push(format!("Missing required field: '{}'", rule.name)),
            Some(value) if !rule.ty.matches(value) => errors.push(format!(
                "Field '{}' must be {}, got {}",
                rule.name,
                rule.ty.name(),
                type_name(value)
            )),
            Some(value) if rule.non_empty && is_empty(value) => {
                errors.push(format!("Field '{}' must not be empty", rule.name))
            }
            Some(_) => {}
        }
    }
}

fn check_phases(phases: &[Value], errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    for (i, phase) in phases.iter().enumerate() {
        let Some(phase) = phase.as_object() else {
            errors.push(format!("Phase[{}] must be an object, got {}", i, type_name(phase)));
            continue;
        };

        let missing: Vec<&str> = PHASE_REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| !phase.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            errors.push(format!("Phase[{}] missing keys: {}", i, missing.join(", ")));
        }

        for (key, ty) in [
            ("name", FieldType::Text),
            ("steps", FieldType::Sequence),
            ("outputs", FieldType::Sequence),
        ] {
            if let Some(value) = phase.get(key) {
                if !ty.matches(value) {
                    errors.push(format!(
                        "Phase[{}] field '{}' must be {}, got {}",
                        i,
                        key,
                        ty.name(),
                        type_name(value)
                    ));
                }
            }
        }

        if let Some(Value::Array(steps)) = phase.get("steps") {
            if steps.is_empty() {
                let name = phase.get("name").and_then(Value::as_str).unwrap_or("?");
                warnings.push(format!("Phase[{}] ('{}') has no steps", i, name));
            }
        }
    }
}
