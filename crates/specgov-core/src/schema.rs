use crate::error::{Result, SpecError};
use crate::io;
use crate::paths;
use crate::types::SpecKind;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Violations listed per failing document.
pub const MAX_REPORTED_VIOLATIONS: usize = 10;

/// Compiled JSON Schemas for the document kinds, loaded from
/// `specs/schemas/` on first use and cached for the rest of the run.
pub struct SchemaRegistry {
    root: PathBuf,
    compiled: HashMap<SpecKind, JSONSchema>,
}

impl SchemaRegistry {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            compiled: HashMap::new(),
        }
    }

    fn schema_for(&mut self, kind: SpecKind) -> Result<&JSONSchema> {
        if !self.compiled.contains_key(&kind) {
            let path = paths::schema_path(&self.root, kind);
            let shown = paths::rel(&self.root, &path);
            if !path.is_file() {
                return Err(SpecError::Configuration(format!(
                    "Missing schema for {kind}: {shown}"
                )));
            }
            let schema = io::load_json(&path)?;
            let compiled = JSONSchema::options()
                .with_draft(Draft::Draft202012)
                .compile(&schema)
                .map_err(|e| {
                    SpecError::Configuration(format!("{shown}: schema does not compile: {e}"))
                })?;
            tracing::debug!(%kind, schema = %shown, "compiled schema");
            self.compiled.insert(kind, compiled);
        }
        Ok(&self.compiled[&kind])
    }

    /// Validate `doc` (loaded from `path`) against the schema for `kind`.
    pub fn validate(&mut self, kind: SpecKind, path: &Path, doc: &Value) -> Result<()> {
        let shown = paths::rel(&self.root, path);
        let schema = self.schema_for(kind)?;

        let violations = match schema.validate(doc) {
            Ok(()) => return Ok(()),
            Err(errors) => {
                let mut v: Vec<(Vec<Segment>, String, String)> = errors
                    .map(|e| {
                        let pointer = e.instance_path.to_string();
                        (segments(&pointer), location(&pointer), e.to_string())
                    })
                    .collect();
                v.sort_by(|a, b| a.0.cmp(&b.0));
                v
            }
        };

        let mut lines = vec![shown];
        for (_, loc, msg) in violations.iter().take(MAX_REPORTED_VIOLATIONS) {
            lines.push(format!("  - {loc}: {msg}"));
        }
        Err(SpecError::SchemaViolation(lines.join("\n")))
    }
}

/// One step of an instance path. Array indices order numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Index(usize),
    Key(String),
}

fn segments(pointer: &str) -> Vec<Segment> {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(i) => Segment::Index(i),
            Err(_) => Segment::Key(s.to_string()),
        })
        .collect()
}

/// `/changes/0/target` → `changes/0/target`; the document root → `<root>`.
fn location(pointer: &str) -> String {
    let trimmed = pointer.trim_start_matches('/');
    if trimmed.is_empty() {
        "<root>".to_string()
    } else {
        trimmed.to_string()
    }
}
