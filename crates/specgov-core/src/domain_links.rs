use crate::error::{Result, SpecError};
use crate::paths;
use crate::types::{DomainRefKind, STATUS_IMPLEMENTED};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

static FRAGMENT_RE: OnceLock<Regex> = OnceLock::new();

fn fragment_re() -> &'static Regex {
    FRAGMENT_RE.get_or_init(|| {
        Regex::new(r"^(specs/domain/.+\.(md|yaml))#((CMD|EVT)-\d{4})$").expect("valid regex")
    })
}

/// A parsed `specs/domain/<file>#<CMD|EVT>-####` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainLink {
    /// Root-relative target file.
    pub target: String,
    /// Anchor ID, e.g. `CMD-0001`.
    pub fragment: String,
    pub kind: DomainRefKind,
}

impl DomainLink {
    pub fn parse(link: &str) -> Option<DomainLink> {
        let caps = fragment_re().captures(link)?;
        let kind = match &caps[4] {
            "CMD" => DomainRefKind::Command,
            _ => DomainRefKind::Event,
        };
        Some(DomainLink {
            target: caps[1].to_string(),
            fragment: caps[3].to_string(),
            kind,
        })
    }
}

/// `trace.domain.commands` and `trace.domain.events` of a CAP document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainTrace {
    pub commands: Vec<String>,
    pub events: Vec<String>,
}

impl DomainTrace {
    /// Read the trace lists from a CAP document. Absent keys are empty;
    /// anything other than a list of strings is a schema violation.
    pub fn from_doc(shown: &str, doc: &Value) -> Result<DomainTrace> {
        let domain = match doc.get("trace") {
            None | Some(Value::Null) => return Ok(DomainTrace::default()),
            Some(Value::Object(trace)) => trace.get("domain"),
            Some(_) => {
                return Err(SpecError::SchemaViolation(format!(
                    "{shown}\n  - trace: must be an object"
                )))
            }
        };
        let domain = match domain {
            None | Some(Value::Null) => return Ok(DomainTrace::default()),
            Some(Value::Object(d)) => d,
            Some(_) => {
                return Err(SpecError::SchemaViolation(format!(
                    "{shown}\n  - trace/domain: must be an object"
                )))
            }
        };
        Ok(DomainTrace {
            commands: string_list(shown, domain.get("commands"))?,
            events: string_list(shown, domain.get("events"))?,
        })
    }

    pub fn links(&self) -> impl Iterator<Item = &String> {
        self.commands.iter().chain(self.events.iter())
    }
}

fn string_list(shown: &str, value: Option<&Value>) -> Result<Vec<String>> {
    let not_list = || {
        SpecError::SchemaViolation(format!(
            "{shown}\n  - trace/domain: trace.domain.commands/events must be a list of strings"
        ))
    };
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(not_list))
            .collect(),
        Some(_) => Err(not_list()),
    }
}

/// Check the domain trace links of one CAP document: coverage for
/// implemented capabilities, then every link must resolve to an anchor in
/// an existing markdown file under `specs/domain/`.
pub fn validate_domain_links(root: &Path, cap_path: &Path, doc: &Value) -> Result<DomainTrace> {
    let shown = paths::rel(root, cap_path);
    if !doc.is_object() {
        return Err(SpecError::SchemaViolation(format!(
            "{shown}\n  - <root>: expected object"
        )));
    }
    let trace = DomainTrace::from_doc(&shown, doc)?;

    if doc.get("status").and_then(Value::as_str) == Some(STATUS_IMPLEMENTED) {
        if trace.commands.is_empty() {
            return Err(SpecError::CoverageGap(format!(
                "{shown}: status=implemented requires trace.domain.commands"
            )));
        }
        if trace.events.is_empty() {
            return Err(SpecError::CoverageGap(format!(
                "{shown}: status=implemented requires trace.domain.events"
            )));
        }
    }

    for raw in trace.links() {
        let Some(link) = DomainLink::parse(raw) else {
            return Err(SpecError::DanglingLink(format!(
                "{shown}: invalid domain trace link '{raw}' (expected specs/domain/<file>.md#CMD-#### or #EVT-####)"
            )));
        };
        let target = root.join(&link.target);
        if !target.exists() {
            return Err(SpecError::DanglingLink(format!(
                "{shown}: domain trace target does not exist: {}",
                link.target
            )));
        }
        if link.target.ends_with(".md") {
            let text = std::fs::read_to_string(&target)?;
            if !has_anchor(&text, &link.fragment) {
                return Err(SpecError::DanglingLink(format!(
                    "{shown}: anchor '{frag}' not found in {target} (expected <a id=\"{frag}\"></a> or any element with id=\"{frag}\")",
                    frag = link.fragment,
                    target = link.target,
                )));
            }
        } else {
            return Err(SpecError::DanglingLink(format!(
                "{shown}: only markdown domain targets are supported (YAML targets not yet supported): {}",
                link.target
            )));
        }
    }

    Ok(trace)
}

/// Literal `id="<fragment>"` anywhere in the text.
pub fn has_anchor(text: &str, fragment: &str) -> bool {
    text.contains(&format!("id=\"{fragment}\""))
}
