use crate::collect::collect_files;
use crate::delta::validate_delta;
use crate::domain_links::validate_domain_links;
use crate::domain_registry::validate_domain_registry;
use crate::error::{Result, SpecError};
use crate::identity::validate_identity;
use crate::io;
use crate::middleware::validate_middleware_registry;
use crate::schema::SchemaRegistry;
use crate::trace::validate_trace_links;
use crate::types::{KnownIds, SpecKind};
use crate::workspace::RepoIds;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What a passing run looked at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub files: usize,
    pub requirements: BTreeMap<SpecKind, usize>,
    pub domain_trace_links: usize,
    pub trace_links: usize,
    pub deltas: usize,
    pub delta_changes: usize,
    pub domains: usize,
    pub middleware: usize,
}

/// Validate the whole specification tree under `root`. Stops at the first
/// violation.
pub fn run(root: &Path) -> Result<ValidationSummary> {
    let files = collect_files(root)?;
    if files.is_empty() {
        return Err(SpecError::Configuration(
            "No spec files found under specs/".to_string(),
        ));
    }

    let mut summary = ValidationSummary {
        files: files.len(),
        ..Default::default()
    };
    let mut schemas = SchemaRegistry::new(root);
    let mut known = KnownIds::default();
    let mut trace: Option<(PathBuf, Value)> = None;
    let mut deltas: Vec<(PathBuf, Value)> = Vec::new();

    // --- per-file: schema, identity, domain links ---
    for file in &files {
        let doc = io::load_spec_document(root, &file.path)?;
        schemas.validate(file.kind, &file.path, &doc)?;

        match file.kind {
            SpecKind::Trace => trace = Some((file.path.clone(), doc)),
            SpecKind::Delta => deltas.push((file.path.clone(), doc)),
            kind => {
                let id = validate_identity(root, kind, &file.path, &doc)?;
                if kind == SpecKind::Cap {
                    let links = validate_domain_links(root, &file.path, &doc)?;
                    summary.domain_trace_links += links.links().count();
                }
                known.insert(kind, id);
                *summary.requirements.entry(kind).or_default() += 1;
            }
        }
    }
    tracing::debug!(ids = known.len(), "per-file checks ok");

    // --- graph checks ---
    summary.trace_links = validate_trace_links(
        root,
        trace.as_ref().map(|(p, d)| (p.as_path(), d)),
        &known,
    )?;

    for (path, doc) in &deltas {
        summary.delta_changes += validate_delta(root, path, doc, &known)?;
    }
    summary.deltas = deltas.len();
    tracing::debug!(deltas = summary.deltas, "deltas ok");

    // --- registries ---
    let mut repo_ids = RepoIds::new(root);
    summary.domains = validate_domain_registry(root, &mut repo_ids)?;
    summary.middleware = validate_middleware_registry(root, &mut repo_ids)?;

    Ok(summary)
}
