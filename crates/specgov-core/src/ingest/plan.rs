use crate::error::{Result, SpecError};
use crate::identity::{domain_ref_pattern, id_pattern};
use crate::trace::TraceLink;
use crate::types::{DomainRefKind, SpecKind};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_DELTA_TITLE: &str = "Requirements ingestion";

/// Kinds of artifact an ingestion plan may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArtifactKind {
    #[serde(rename = "BV")]
    Bv,
    #[serde(rename = "CAP")]
    Cap,
    #[serde(rename = "BR")]
    Br,
    #[serde(rename = "NFR")]
    Nfr,
    #[serde(rename = "CMD")]
    Cmd,
    #[serde(rename = "EVT")]
    Evt,
}

impl ArtifactKind {
    pub fn parse(s: &str) -> Option<ArtifactKind> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BV" => Some(ArtifactKind::Bv),
            "CAP" => Some(ArtifactKind::Cap),
            "BR" => Some(ArtifactKind::Br),
            "NFR" => Some(ArtifactKind::Nfr),
            "CMD" => Some(ArtifactKind::Cmd),
            "EVT" => Some(ArtifactKind::Evt),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Bv => "BV",
            ArtifactKind::Cap => "CAP",
            ArtifactKind::Br => "BR",
            ArtifactKind::Nfr => "NFR",
            ArtifactKind::Cmd => "CMD",
            ArtifactKind::Evt => "EVT",
        }
    }

    /// Requirement kind for governed artifacts; `None` for CMD/EVT, which
    /// live in markdown and are not delta-tracked.
    pub fn spec_kind(self) -> Option<SpecKind> {
        match self {
            ArtifactKind::Bv => Some(SpecKind::Bv),
            ArtifactKind::Cap => Some(SpecKind::Cap),
            ArtifactKind::Br => Some(SpecKind::Br),
            ArtifactKind::Nfr => Some(SpecKind::Nfr),
            ArtifactKind::Cmd | ArtifactKind::Evt => None,
        }
    }

    pub fn is_governed(self) -> bool {
        self.spec_kind().is_some()
    }

    /// Whether `id` has the shape of an ID of this kind. IDs become file
    /// names and markdown anchors, so nothing else is accepted.
    pub fn accepts_id(self, id: &str) -> bool {
        let re = match self {
            ArtifactKind::Cmd => Some(domain_ref_pattern(DomainRefKind::Command)),
            ArtifactKind::Evt => Some(domain_ref_pattern(DomainRefKind::Event)),
            kind => kind.spec_kind().and_then(id_pattern),
        };
        re.is_some_and(|re| re.is_match(id))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedArtifact {
    pub kind: ArtifactKind,
    pub id: String,
    pub data: Map<String, Value>,
}

impl PlannedArtifact {
    /// `title`, else `name`, else empty.
    pub fn label(&self) -> &str {
        ["title", "name"]
            .iter()
            .find_map(|k| self.data.get(*k).and_then(Value::as_str))
            .unwrap_or("")
    }
}

/// Artifacts, trace links and delta metadata proposed by the LLM.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionPlan {
    pub artifacts: Vec<PlannedArtifact>,
    pub trace_links: Vec<TraceLink>,
    pub delta_title: String,
    pub delta_rationale: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_input: String,
}

impl IngestionPlan {
    pub fn governed(&self) -> impl Iterator<Item = &PlannedArtifact> {
        self.artifacts.iter().filter(|a| a.kind.is_governed())
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parse an LLM answer into a plan. Artifacts of unknown kind are skipped
/// with a warning; artifacts without a well-formed `id` are rejected.
pub fn parse_plan(response: &str) -> Result<IngestionPlan> {
    let value = llm_client::extract_json(response)?;
    let Some(root) = value.as_object() else {
        return Err(SpecError::Plan("expected a JSON object".to_string()));
    };

    let mut plan = IngestionPlan::default();

    let artifacts = root.get("artifacts").and_then(Value::as_array);
    for (i, art) in artifacts.into_iter().flatten().enumerate() {
        let raw_kind = art.get("kind").and_then(Value::as_str).unwrap_or_default();
        let Some(kind) = ArtifactKind::parse(raw_kind) else {
            tracing::warn!(kind = raw_kind, "unknown artifact kind, skipping");
            continue;
        };
        let Some(data) = art.get("data").and_then(Value::as_object) else {
            return Err(SpecError::Plan(format!("artifacts[{i}] ({kind}) has no data object")));
        };
        let id = text(data, "id");
        if id.is_empty() {
            return Err(SpecError::Plan(format!("artifacts[{i}] ({kind}) has no id")));
        }
        if !kind.accepts_id(&id) {
            return Err(SpecError::Plan(format!(
                "artifacts[{i}] ({kind}) has malformed id '{id}'"
            )));
        }
        plan.artifacts.push(PlannedArtifact {
            kind,
            id,
            data: data.clone(),
        });
    }

    let links = root.get("trace_links").and_then(Value::as_array);
    for link in links.into_iter().flatten().filter_map(Value::as_object) {
        let rationale = text(link, "rationale");
        plan.trace_links.push(TraceLink {
            from: text(link, "from"),
            to: text(link, "to"),
            link_type: text(link, "type"),
            rationale: (!rationale.is_empty()).then_some(rationale),
        });
    }

    plan.delta_title = match root.get("delta_title").and_then(Value::as_str) {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => DEFAULT_DELTA_TITLE.to_string(),
    };
    plan.delta_rationale = text(root, "delta_rationale");

    Ok(plan)
}
