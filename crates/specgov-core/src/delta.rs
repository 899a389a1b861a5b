use crate::error::{Result, SpecError};
use crate::io;
use crate::paths;
use crate::types::{KnownIds, STATUS_APPLIED, STATUS_PROPOSED};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const CHANGE_ADD: &str = "add";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A named changeset under `specs/deltas/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub id: String,
    pub title: String,
    pub status: String,
    pub changes: Vec<DeltaChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<Compatibility>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaChange {
    #[serde(rename = "type")]
    pub change_type: String,
    pub target: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    pub claim: String,
    pub rationale: String,
}

impl Delta {
    pub fn is_pending(&self) -> bool {
        self.status == STATUS_PROPOSED || self.status == STATUS_APPLIED
    }

    /// Build a delta from a loaded document without failing on missing or
    /// mistyped fields; they read as empty. Non-object changes are dropped.
    pub fn from_value(doc: &Value) -> Delta {
        let text = |v: &Value, key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let changes = doc
            .get("changes")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|c| c.is_object())
                    .map(|c| DeltaChange {
                        change_type: text(c, "type"),
                        target: text(c, "target"),
                        description: text(c, "description"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let compatibility = doc.get("compatibility").filter(|c| c.is_object()).map(|c| {
            Compatibility {
                claim: text(c, "claim"),
                rationale: text(c, "rationale"),
            }
        });
        Delta {
            id: text(doc, "id"),
            title: text(doc, "title"),
            status: text(doc, "status"),
            changes,
            compatibility,
        }
    }
}

pub fn load_delta(path: &Path) -> Result<Delta> {
    Ok(Delta::from_value(&io::load_yaml_value(path)?))
}

/// Delta files whose status is `proposed` or `applied`, in file-name order.
pub fn find_pending_deltas(root: &Path) -> Result<Vec<PathBuf>> {
    let mut pending = Vec::new();
    for path in paths::sorted_files(&paths::deltas_dir(root), "yaml")? {
        if load_delta(&path)?.is_pending() {
            pending.push(path);
        }
    }
    Ok(pending)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Every change of a delta must target a known requirement ID. Returns the
/// number of changes checked.
pub fn validate_delta(root: &Path, path: &Path, doc: &Value, known: &KnownIds) -> Result<usize> {
    let shown = paths::rel(root, path);
    let Some(changes) = doc.get("changes").and_then(Value::as_array) else {
        return Err(SpecError::SchemaViolation(format!(
            "{shown}\n  - changes: changes must be a list"
        )));
    };

    for (i, change) in changes.iter().enumerate() {
        if !change.is_object() {
            return Err(SpecError::SchemaViolation(format!(
                "{shown}\n  - changes/{i}: changes[{i}] must be an object"
            )));
        }
        let Some(target) = change.get("target").and_then(Value::as_str) else {
            return Err(SpecError::SchemaViolation(format!(
                "{shown}\n  - changes/{i}/target: changes[{i}].target must be a string"
            )));
        };
        if !known.contains(target) {
            return Err(SpecError::UnknownReference {
                file: shown,
                field: format!("changes[{i}].target"),
                id: target.to_string(),
            });
        }
    }

    Ok(changes.len())
}
