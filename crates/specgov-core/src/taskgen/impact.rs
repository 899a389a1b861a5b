use crate::delta::{Delta, DeltaChange};
use crate::error::Result;
use crate::io;
use crate::markdown::{find_domain_id, parse_domain_section, DomainSection};
use crate::paths;
use crate::trace::TraceLinks;
use crate::types::{DomainRefKind, SpecKind};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CMD_REF_RE: OnceLock<Regex> = OnceLock::new();
static EVT_REF_RE: OnceLock<Regex> = OnceLock::new();

fn cmd_ref_re() -> &'static Regex {
    CMD_REF_RE.get_or_init(|| Regex::new(r"CMD-\d{4}").expect("valid regex"))
}

fn evt_ref_re() -> &'static Regex {
    EVT_REF_RE.get_or_init(|| Regex::new(r"EVT-\d{4}").expect("valid regex"))
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A requirement document loaded for a delta target.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedArtifact {
    pub id: String,
    pub kind: SpecKind,
    pub data: Map<String, Value>,
    #[serde(skip)]
    pub path: PathBuf,
    /// Command IDs named by `trace.domain.commands` (CAP only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_cmds: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_evts: Vec<String>,
}

impl ResolvedArtifact {
    pub fn text(&self, key: &str) -> &str {
        self.data.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

/// One delta change with everything a task writer needs to know about it.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactEntry {
    pub change: DeltaChange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ResolvedArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cmd_specs: Vec<DomainSection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evt_specs: Vec<DomainSection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub br_specs: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
    pub status_only: bool,
}

/// A change that only moves a status along (`Status proposed → approved`)
/// has no code impact.
pub fn is_status_only(change: &DeltaChange) -> bool {
    change.description.to_lowercase().contains("status") && change.description.contains('→')
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Load the requirement file behind `target_id`. `None` when the ID is not a
/// requirement ID or the file does not exist.
pub fn resolve_requirement(root: &Path, target_id: &str) -> Result<Option<ResolvedArtifact>> {
    let Some(kind) = SpecKind::from_id(target_id) else {
        return Ok(None);
    };
    let Some(path) = paths::requirement_path(root, kind, target_id) else {
        return Ok(None);
    };
    if !path.is_file() {
        return Ok(None);
    }
    let data = match io::load_yaml_value(&path)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let (related_cmds, related_evts) = if kind == SpecKind::Cap {
        let domain = data.get("trace").and_then(|t| t.get("domain"));
        let refs = |key: &str, re: &Regex| -> Vec<String> {
            domain
                .and_then(|d| d.get(key))
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .filter_map(|link| re.find(link).map(|m| m.as_str().to_string()))
                .collect()
        };
        (refs("commands", cmd_ref_re()), refs("events", evt_ref_re()))
    } else {
        (Vec::new(), Vec::new())
    };

    let artifact = ResolvedArtifact {
        id: target_id.to_string(),
        kind,
        data,
        path,
        related_cmds,
        related_evts,
    };
    Ok(Some(artifact))
}

/// Domain markdown read once per analysis.
struct DomainDocs {
    commands: String,
    events: String,
}

impl DomainDocs {
    fn read(root: &Path) -> Result<DomainDocs> {
        let read = |p: PathBuf| -> Result<String> {
            if p.is_file() {
                Ok(std::fs::read_to_string(p)?)
            } else {
                Ok(String::new())
            }
        };
        Ok(DomainDocs {
            commands: read(paths::commands_md(root))?,
            events: read(paths::events_md(root))?,
        })
    }

    fn command(&self, id: &str) -> DomainSection {
        parse_domain_section(&self.commands, id, DomainRefKind::Command)
    }

    fn event(&self, id: &str) -> DomainSection {
        parse_domain_section(&self.events, id, DomainRefKind::Event)
    }

    fn domain_of_command(&self, id: &str) -> Option<String> {
        self.command(id).domain.as_deref().and_then(find_domain_id)
    }
}

/// The DOM ID behind a requirement: the domain of its first command, or for
/// a business rule the domain of a command mentioned in its `notes`.
fn find_domain(artifact: &ResolvedArtifact, docs: &DomainDocs) -> Option<String> {
    if let Some(dom) = artifact
        .related_cmds
        .first()
        .and_then(|cmd| docs.domain_of_command(cmd))
    {
        return Some(dom);
    }
    if artifact.kind == SpecKind::Br {
        let cmd = cmd_ref_re().find(artifact.text("notes"))?;
        return docs.domain_of_command(cmd.as_str());
    }
    None
}

fn middleware_hints(artifact: &ResolvedArtifact) -> Vec<String> {
    let mut hints = Vec::new();
    match artifact.kind {
        SpecKind::Cap if artifact.text("title").to_uppercase().contains("JWT") => {
            hints.push("mw.auth".to_string());
        }
        SpecKind::Nfr => {
            let statement = artifact.text("statement").to_lowercase();
            if statement.contains("trace") || statement.contains("correlation") {
                hints.push("mw.trace".to_string());
            }
            if statement.contains("error") || statement.contains("problem") {
                hints.push("mw.error".to_string());
            }
        }
        _ => {}
    }
    hints
}

/// Resolve every change of `delta` to its artifact and surrounding context.
pub fn analyze_impact(root: &Path, delta: &Delta) -> Result<Vec<ImpactEntry>> {
    let docs = DomainDocs::read(root)?;
    let trace = TraceLinks::load(root)?;

    let mut impacts = Vec::with_capacity(delta.changes.len());
    for change in &delta.changes {
        let artifact = resolve_requirement(root, &change.target)?;
        let mut entry = ImpactEntry {
            change: change.clone(),
            artifact: None,
            domain: None,
            cmd_specs: Vec::new(),
            evt_specs: Vec::new(),
            br_specs: Vec::new(),
            middleware: Vec::new(),
            status_only: is_status_only(change),
        };

        if let Some(artifact) = artifact {
            entry.domain = find_domain(&artifact, &docs);
            if artifact.kind == SpecKind::Cap {
                entry.cmd_specs = artifact.related_cmds.iter().map(|id| docs.command(id)).collect();
                entry.evt_specs = artifact.related_evts.iter().map(|id| docs.event(id)).collect();

                let mut br_ids = trace.satisfied_by(&artifact.id);
                br_ids.sort();
                br_ids.dedup();
                for br in br_ids {
                    if let Some(resolved) = resolve_requirement(root, &br)? {
                        entry.br_specs.push(resolved.data);
                    }
                }
            }
            entry.middleware = middleware_hints(&artifact);
            entry.artifact = Some(artifact);
        } else {
            tracing::debug!(target_id = %change.target, "delta target has no requirement file");
        }
        impacts.push(entry);
    }

    let status_only = impacts.iter().filter(|i| i.status_only).count();
    tracing::info!(
        code = impacts.len() - status_only,
        status_only,
        "impact analysis"
    );
    Ok(impacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use tempfile::TempDir;

    fn change(target: &str, description: &str) -> DeltaChange {
        DeltaChange {
            change_type: "amend".to_string(),
            target: target.to_string(),
            description: description.to_string(),
        }
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fixtures::write_baseline(dir.path());
        fixtures::write_domain_docs(dir.path());
        fixtures::write(
            dir.path(),
            "specs/requirements/capabilities/CAP-0001.yaml",
            "id: CAP-0001\ntitle: Checkout with JWT session\nstatus: implemented\ntrace:\n  domain:\n    commands: [\"specs/domain/commands.md#CMD-0001\"]\n    events: [\"specs/domain/events.md#EVT-0001\"]\n",
        );
        dir
    }

    #[test]
    fn status_only_detection() {
        assert!(is_status_only(&change("BV-0001", "Status proposed → approved")));
        assert!(is_status_only(&change("BV-0001", "STATUS moved: draft → final")));
        assert!(!is_status_only(&change("BV-0001", "Status proposed -> approved")));
        assert!(!is_status_only(&change("CAP-0001", "New checkout flow → v2")));
    }

    #[test]
    fn resolves_cap_with_commands_events_and_rules() {
        let dir = tree();
        let delta = Delta {
            id: "DELTA-2026-03-14-001".to_string(),
            changes: vec![change("CAP-0001", "Add checkout")],
            ..Default::default()
        };
        let impacts = analyze_impact(dir.path(), &delta).unwrap();
        let cap = &impacts[0];
        assert!(!cap.status_only);
        assert_eq!(cap.domain.as_deref(), Some("DOM-0001"));
        assert_eq!(cap.cmd_specs[0].name.as_deref(), Some("Place order"));
        assert_eq!(cap.cmd_specs[0].error_codes, vec!["ORDER.EMPTY_CART"]);
        assert_eq!(cap.evt_specs[0].consumers.as_deref(), Some("Billing"));
        assert_eq!(cap.br_specs.len(), 1);
        assert_eq!(cap.br_specs[0]["id"], "BR-0001");
        assert_eq!(cap.middleware, vec!["mw.auth"]);
        assert_eq!(cap.artifact.as_ref().unwrap().related_cmds, vec!["CMD-0001"]);
    }

    #[test]
    fn br_domain_comes_from_notes() {
        let dir = tree();
        fixtures::write(
            dir.path(),
            "specs/requirements/business-rules/BR-0001.yaml",
            "id: BR-0001\ntitle: Cart must not be empty\nstatus: proposed\nnotes: Enforced by CMD-0001 on submit\n",
        );
        let art = resolve_requirement(dir.path(), "BR-0001").unwrap().unwrap();
        let docs = DomainDocs::read(dir.path()).unwrap();
        assert_eq!(find_domain(&art, &docs).as_deref(), Some("DOM-0001"));
    }

    #[test]
    fn nfr_statement_hints_middleware() {
        let dir = tree();
        fixtures::write(
            dir.path(),
            "specs/requirements/nfr/NFR-0001.yaml",
            "id: NFR-0001\ntitle: Observability\nstatus: proposed\nstatement: Every error carries a correlation id\n",
        );
        let art = resolve_requirement(dir.path(), "NFR-0001").unwrap().unwrap();
        assert_eq!(middleware_hints(&art), vec!["mw.trace", "mw.error"]);
    }

    #[test]
    fn unknown_targets_resolve_to_nothing() {
        let dir = tree();
        assert!(resolve_requirement(dir.path(), "CMD-0001").unwrap().is_none());
        assert!(resolve_requirement(dir.path(), "BV-0042").unwrap().is_none());
        assert!(resolve_requirement(dir.path(), "nonsense").unwrap().is_none());

        let delta = Delta {
            changes: vec![change("BV-0042", "Status proposed → approved")],
            ..Default::default()
        };
        let impacts = analyze_impact(dir.path(), &delta).unwrap();
        assert!(impacts[0].artifact.is_none());
        assert!(impacts[0].status_only);
    }
}
