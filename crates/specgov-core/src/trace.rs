use crate::error::{Result, SpecError};
use crate::io;
use crate::paths;
use crate::types::{KnownIds, LinkType, SpecKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Typed trace-link document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLink {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl TraceLink {
    pub fn new(from: &str, to: &str, link_type: LinkType) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            link_type: link_type.as_str().to_string(),
            rationale: None,
        }
    }
}

/// `trace-links.yaml` as written by the ingest pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLinks {
    #[serde(default)]
    pub links: Vec<TraceLink>,
}

impl TraceLinks {
    /// Read the trace-link file leniently. A missing or empty file has no
    /// links.
    pub fn load(root: &Path) -> Result<TraceLinks> {
        let path = paths::trace_links_path(root);
        if !path.is_file() {
            return Ok(TraceLinks::default());
        }
        let value = io::load_yaml_value(&path)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_yaml(&paths::trace_links_path(root), self)
    }

    /// BR IDs a capability satisfies.
    pub fn satisfied_by(&self, cap_id: &str) -> Vec<String> {
        self.links
            .iter()
            .filter(|l| {
                l.from == cap_id && l.link_type == LinkType::Satisfies.as_str() && l.to.starts_with("BR-")
            })
            .map(|l| l.to.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Graph validation
// ---------------------------------------------------------------------------

/// Check the trace-link graph against the known IDs and enforce the
/// coverage gates. Without a trace-link file there is no graph to check and
/// the gates are skipped. Returns the number of links checked.
pub fn validate_trace_links(
    root: &Path,
    trace: Option<(&Path, &Value)>,
    known: &KnownIds,
) -> Result<usize> {
    let Some((path, doc)) = trace else {
        tracing::debug!("no trace-links.yaml, skipping graph checks");
        return Ok(0);
    };

    let mut realized: HashMap<&str, usize> = HashMap::new();
    let mut satisfied: HashMap<&str, usize> = HashMap::new();
    let mut count = 0;

    let shown = paths::rel(root, path);
    let Some(links) = doc.get("links").and_then(Value::as_array) else {
        return Err(SpecError::SchemaViolation(format!(
            "{shown}\n  - links: 'links' must be a list"
        )));
    };

    for (i, link) in links.iter().enumerate() {
        let Some(obj) = link.as_object() else {
            return Err(SpecError::SchemaViolation(format!(
                "{shown}\n  - links/{i}: links[{i}] must be an object"
            )));
        };
        let field = |name: &str| obj.get(name).and_then(Value::as_str);
        let (Some(src), Some(dst), Some(typ)) = (field("from"), field("to"), field("type"))
        else {
            return Err(SpecError::SchemaViolation(format!(
                "{shown}\n  - links/{i}: links[{i}] must contain string from/to/type"
            )));
        };
        let link_type: LinkType = typ.parse().map_err(|e: String| {
            SpecError::SchemaViolation(format!("{shown}\n  - links/{i}/type: {e}"))
        })?;

        if !known.contains(src) {
            return Err(SpecError::UnknownReference {
                file: shown,
                field: format!("links[{i}].from"),
                id: src.to_string(),
            });
        }
        if !known.contains(dst) {
            return Err(SpecError::UnknownReference {
                file: shown,
                field: format!("links[{i}].to"),
                id: dst.to_string(),
            });
        }

        match link_type {
            LinkType::Realizes if src.starts_with("BV-") && dst.starts_with("CAP-") => {
                *realized.entry(dst).or_default() += 1;
            }
            LinkType::Satisfies if src.starts_with("CAP-") && dst.starts_with("BR-") => {
                *satisfied.entry(dst).or_default() += 1;
            }
            _ => {}
        }
        count += 1;
    }

    for cap in known.of(SpecKind::Cap) {
        if realized.get(cap.as_str()).copied().unwrap_or(0) < 1 {
            return Err(SpecError::CoverageGap(format!(
                "{cap} must realize at least one BV-* via trace-links.yaml"
            )));
        }
    }
    for br in known.of(SpecKind::Br) {
        if satisfied.get(br.as_str()).copied().unwrap_or(0) < 1 {
            return Err(SpecError::CoverageGap(format!(
                "{br} must be satisfied by at least one CAP-* via trace-links.yaml"
            )));
        }
    }

    tracing::debug!(links = count, "trace links ok");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn known() -> KnownIds {
        let mut ids = KnownIds::default();
        ids.insert(SpecKind::Bv, "BV-0001");
        ids.insert(SpecKind::Cap, "CAP-0001");
        ids.insert(SpecKind::Br, "BR-0001");
        ids
    }

    fn path() -> PathBuf {
        PathBuf::from("/p/specs/requirements/trace-links.yaml")
    }

    fn check(doc: Value, ids: &KnownIds) -> Result<usize> {
        let p = path();
        validate_trace_links(Path::new("/p"), Some((&p, &doc)), ids)
    }

    fn full_links() -> Value {
        json!({"links": [
            {"from": "BV-0001", "to": "CAP-0001", "type": "realizes"},
            {"from": "CAP-0001", "to": "BR-0001", "type": "satisfies"}
        ]})
    }

    #[test]
    fn covered_graph_passes() {
        assert_eq!(check(full_links(), &known()).unwrap(), 2);
    }

    #[test]
    fn unknown_endpoint_fails() {
        let doc = json!({"links": [
            {"from": "BV-0001", "to": "CAP-0009", "type": "realizes"}
        ]});
        let err = check(doc, &known()).unwrap_err();
        assert!(matches!(err, SpecError::UnknownReference { .. }));
        let msg = err.to_string();
        assert!(msg.contains("links[0].to"));
        assert!(msg.contains("CAP-0009"));
    }

    #[test]
    fn removing_sole_realization_fails() {
        let doc = json!({"links": [
            {"from": "CAP-0001", "to": "BR-0001", "type": "satisfies"}
        ]});
        let err = check(doc, &known()).unwrap_err();
        assert!(matches!(err, SpecError::CoverageGap(_)));
        assert!(err.to_string().contains("CAP-0001 must realize"));
    }

    #[test]
    fn removing_sole_satisfaction_fails() {
        let doc = json!({"links": [
            {"from": "BV-0001", "to": "CAP-0001", "type": "realizes"}
        ]});
        let err = check(doc, &known()).unwrap_err();
        assert!(err.to_string().contains("BR-0001 must be satisfied"));
    }

    #[test]
    fn wrong_direction_does_not_count() {
        let doc = json!({"links": [
            {"from": "CAP-0001", "to": "BV-0001", "type": "realizes"},
            {"from": "CAP-0001", "to": "BR-0001", "type": "satisfies"}
        ]});
        assert!(check(doc, &known()).is_err());
    }

    #[test]
    fn unknown_link_type_fails() {
        let doc = json!({"links": [
            {"from": "BV-0001", "to": "CAP-0001", "type": "depends_on"}
        ]});
        let err = check(doc, &known()).unwrap_err();
        assert!(matches!(err, SpecError::SchemaViolation(_)));
    }

    #[test]
    fn malformed_entries_fail() {
        assert!(check(json!({}), &known()).is_err());
        assert!(check(json!({"links": ["BV-0001"]}), &known()).is_err());
        assert!(check(json!({"links": [{"from": "BV-0001", "to": 3, "type": "realizes"}]}), &known()).is_err());
    }

    #[test]
    fn missing_trace_file_skips_graph_checks() {
        assert_eq!(validate_trace_links(Path::new("/p"), None, &known()).unwrap(), 0);
    }

    #[test]
    fn empty_trace_file_still_gates_coverage() {
        let err = check(json!({"links": []}), &known()).unwrap_err();
        assert!(matches!(err, SpecError::CoverageGap(_)));
        assert!(err.to_string().contains("CAP-0001"));
    }

    #[test]
    fn typed_links_satisfied_by() {
        let links: TraceLinks = serde_json::from_value(full_links()).unwrap();
        assert_eq!(links.satisfied_by("CAP-0001"), vec!["BR-0001"]);
        assert!(links.satisfied_by("CAP-0002").is_empty());
    }
}
