//! Command and event sections in `specs/domain/*.md`.
//!
//! A section starts at an anchor and runs until the next anchor of the
//! same prefix:
//!
//! ```text
//! <a id="CMD-0001"></a>
//! ### CMD-0001: Place order
//!
//! - **Intent**: Customer submits a cart
//! - **Domain**: Orders (DOM-0001)
//! - **Payload**:
//!   - `cart_id` (uuid, required) — cart to check out
//! - **Error codes**: `ORDER.EMPTY`
//! ```

use crate::types::DomainRefKind;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::OnceLock;

static PAYLOAD_RE: OnceLock<Regex> = OnceLock::new();
static ERROR_CODES_RE: OnceLock<Regex> = OnceLock::new();
static DOM_REF_RE: OnceLock<Regex> = OnceLock::new();

fn payload_re() -> &'static Regex {
    PAYLOAD_RE.get_or_init(|| Regex::new(r"  - `(\w+)` \(([^)]+)\) — (.+)").expect("valid regex"))
}

fn error_codes_re() -> &'static Regex {
    ERROR_CODES_RE.get_or_init(|| Regex::new(r"\*\*Error codes\*\*:\s*(.+)").expect("valid regex"))
}

fn dom_ref_re() -> &'static Regex {
    DOM_REF_RE.get_or_init(|| Regex::new(r"DOM-\d{4}").expect("valid regex"))
}

/// Anchor IDs with the given prefix (`id="CMD-0001"`) found in `text`.
pub fn extract_md_ids(text: &str, kind: DomainRefKind) -> BTreeSet<String> {
    let re = Regex::new(&format!(r#"id="({}-\d{{4}})""#, kind.prefix()))
        .expect("prefix is a fixed identifier");
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// First `DOM-####` mentioned in `text`.
pub fn find_domain_id(text: &str) -> Option<String> {
    dom_ref_re().find(text).map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadField {
    pub name: String,
    pub type_info: String,
    pub description: String,
}

/// Fields read back from a command or event section. A section that cannot
/// be found carries only its ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainSection {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invariants: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumers: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<PayloadField>,
}

fn bold_field(section: &str, label: &str) -> Option<String> {
    let re = Regex::new(&format!(r"\*\*{}\*\*:\s*(.+)", regex::escape(label))).ok()?;
    re.captures(section).map(|c| c[1].trim().to_string())
}

pub fn parse_domain_section(text: &str, section_id: &str, kind: DomainRefKind) -> DomainSection {
    let mut out = DomainSection {
        id: section_id.to_string(),
        ..Default::default()
    };
    let anchor = format!("id=\"{section_id}\"");
    let Some(idx) = text.find(&anchor) else {
        return out;
    };
    let rest = &text[idx + anchor.len()..];
    let next = format!("<a id=\"{}-", kind.prefix());
    let section = match rest.find(&next) {
        Some(end) => &rest[..end],
        None => rest,
    };
    out.raw = Some(section.trim().to_string());

    out.name = Regex::new(&format!(r"### {}: (.+)", regex::escape(section_id)))
        .ok()
        .and_then(|re| re.captures(section).map(|c| c[1].trim().to_string()));
    out.intent = bold_field(section, "Intent");
    out.fact = bold_field(section, "Fact");
    out.domain = bold_field(section, "Domain");
    out.aggregate = bold_field(section, "Aggregate");
    out.invariants = bold_field(section, "Invariants");
    out.emits = bold_field(section, "Emits");
    out.triggered_by = bold_field(section, "Triggered by");
    out.consumers = bold_field(section, "Consumers");

    if let Some(c) = error_codes_re().captures(section) {
        out.error_codes = c[1]
            .split(',')
            .map(|code| code.trim().trim_matches('`').to_string())
            .filter(|code| !code.is_empty())
            .collect();
    }
    out.payload = payload_re()
        .captures_iter(section)
        .map(|c| PayloadField {
            name: c[1].to_string(),
            type_info: c[2].to_string(),
            description: c[3].trim().to_string(),
        })
        .collect();
    out
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// String form of a plan field; non-string scalars are rendered as JSON.
fn field(data: &Map<String, Value>, key: &str, default: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn payload_items(data: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    data.get("payload")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

pub fn format_cmd_markdown(data: &Map<String, Value>) -> String {
    let id = field(data, "id", "");
    let mut lines = vec![
        format!("<a id=\"{id}\"></a>"),
        format!("### {id}: {}", field(data, "name", "Unnamed Command")),
        String::new(),
        format!("- **Intent**: {}", field(data, "intent", "N/A")),
        format!("- **Domain**: {}", field(data, "domain", "N/A")),
        format!("- **Aggregate**: {}", field(data, "aggregate", "N/A")),
        "- **Payload**:".to_string(),
    ];
    for p in payload_items(data) {
        let marker = if p.get("required").and_then(Value::as_bool).unwrap_or(false) {
            "required"
        } else {
            "optional"
        };
        lines.push(format!(
            "  - `{}` ({}, {marker}) — {}",
            field(p, "name", "field"),
            field(p, "type", "string"),
            field(p, "description", "")
        ));
    }
    lines.push(format!("- **Invariants**: {}", field(data, "invariants", "N/A")));
    lines.push(format!("- **Emits**: {}", field(data, "emits", "N/A")));
    let codes: Vec<String> = data
        .get("error_codes")
        .and_then(Value::as_array)
        .map(|codes| {
            codes
                .iter()
                .map(|c| format!("`{}`", c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string())))
                .collect()
        })
        .unwrap_or_default();
    if !codes.is_empty() {
        lines.push(format!("- **Error codes**: {}", codes.join(", ")));
    }
    lines.push(String::new());
    lines.join("\n")
}

pub fn format_evt_markdown(data: &Map<String, Value>) -> String {
    let id = field(data, "id", "");
    let mut lines = vec![
        format!("<a id=\"{id}\"></a>"),
        format!("### {id}: {}", field(data, "name", "Unnamed Event")),
        String::new(),
        format!("- **Fact**: {}", field(data, "fact", "N/A")),
        format!("- **Domain**: {}", field(data, "domain", "N/A")),
        format!("- **Aggregate**: {}", field(data, "aggregate", "N/A")),
        format!("- **Triggered by**: {}", field(data, "triggered_by", "N/A")),
        "- **Payload**:".to_string(),
    ];
    for p in payload_items(data) {
        lines.push(format!(
            "  - `{}` ({}) — {}",
            field(p, "name", "field"),
            field(p, "type", "string"),
            field(p, "description", "")
        ));
    }
    lines.push(format!("- **Consumers**: {}", field(data, "consumers", "N/A")));
    lines.push(String::new());
    lines.join("\n")
}
