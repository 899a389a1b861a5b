use crate::error::{Result, SpecError};
use crate::paths;
use crate::types::{DomainRefKind, SpecKind};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ID patterns
// ---------------------------------------------------------------------------

static BV_RE: OnceLock<Regex> = OnceLock::new();
static CAP_RE: OnceLock<Regex> = OnceLock::new();
static BR_RE: OnceLock<Regex> = OnceLock::new();
static NFR_RE: OnceLock<Regex> = OnceLock::new();
static DOM_RE: OnceLock<Regex> = OnceLock::new();
static CMD_RE: OnceLock<Regex> = OnceLock::new();
static EVT_RE: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, src: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(src).expect("static id pattern"))
}

/// `^<KIND>-\d{4}$` for a requirement kind.
pub fn id_pattern(kind: SpecKind) -> Option<&'static Regex> {
    match kind {
        SpecKind::Bv => Some(pattern(&BV_RE, r"^BV-\d{4}$")),
        SpecKind::Cap => Some(pattern(&CAP_RE, r"^CAP-\d{4}$")),
        SpecKind::Br => Some(pattern(&BR_RE, r"^BR-\d{4}$")),
        SpecKind::Nfr => Some(pattern(&NFR_RE, r"^NFR-\d{4}$")),
        SpecKind::Trace | SpecKind::Delta => None,
    }
}

pub fn domain_id_pattern() -> &'static Regex {
    pattern(&DOM_RE, r"^DOM-\d{4}$")
}

/// `^CMD-\d{4}$` or `^EVT-\d{4}$`.
pub fn domain_ref_pattern(kind: DomainRefKind) -> &'static Regex {
    let cell = match kind {
        DomainRefKind::Command => &CMD_RE,
        DomainRefKind::Event => &EVT_RE,
    };
    cell.get_or_init(|| {
        Regex::new(&format!(r"^{}-\d{{4}}$", kind.prefix())).expect("static id pattern")
    })
}

// ---------------------------------------------------------------------------
// Identity check
// ---------------------------------------------------------------------------

/// Confirm a requirement document's `id` is a string matching its kind's
/// pattern and equal to the file stem. Returns the ID.
pub fn validate_identity(root: &Path, kind: SpecKind, path: &Path, doc: &Value) -> Result<String> {
    let shown = paths::rel(root, path);
    let Some(re) = id_pattern(kind) else {
        return Err(SpecError::Configuration(format!(
            "{shown}: {kind} documents carry no requirement id"
        )));
    };

    let Some(spec_id) = doc.get("id").and_then(Value::as_str) else {
        return Err(SpecError::IdentityMismatch(format!(
            "{shown}: missing/invalid 'id'"
        )));
    };

    let file_stem = paths::stem(path);
    if file_stem != spec_id {
        return Err(SpecError::IdentityMismatch(format!(
            "{shown}: filename '{file_stem}' must match id '{spec_id}'"
        )));
    }

    if !re.is_match(spec_id) {
        return Err(SpecError::IdentityMismatch(format!(
            "{shown}: id '{spec_id}' does not match pattern {}",
            re.as_str()
        )));
    }

    Ok(spec_id.to_string())
}
