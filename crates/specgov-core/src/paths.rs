use crate::types::SpecKind;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPECS_DIR: &str = "specs";
pub const REQUIREMENTS_DIR: &str = "specs/requirements";
pub const DELTAS_DIR: &str = "specs/deltas";
pub const SCHEMAS_DIR: &str = "specs/schemas";
pub const DOMAIN_REGISTRY_DIR: &str = "specs/architecture/domain";
pub const MIDDLEWARE_DIR: &str = "specs/architecture/middleware";

pub const TRACE_LINKS_FILE: &str = "specs/requirements/trace-links.yaml";
pub const DOMAIN_INDEX_FILE: &str = "specs/architecture/domain/domains.yaml";
pub const WORKSPACE_REGISTRY_FILE: &str = "specs/registry/workspace-registry.yaml";
pub const COMMANDS_MD: &str = "specs/domain/commands.md";
pub const EVENTS_MD: &str = "specs/domain/events.md";
pub const REPO_MANIFEST: &str = "repo.yaml";
pub const TASKS_DIR: &str = "tasks";

pub const MIDDLEWARE_README: &str = "README.md";
pub const DOMAIN_TEMPLATE_SUFFIX: &str = "-template.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Folder holding the documents of a requirement kind, `None` for the
/// singleton trace file and deltas.
pub fn requirement_dir(root: &Path, kind: SpecKind) -> Option<PathBuf> {
    kind.folder().map(|f| root.join(REQUIREMENTS_DIR).join(f))
}

pub fn requirement_path(root: &Path, kind: SpecKind, id: &str) -> Option<PathBuf> {
    requirement_dir(root, kind).map(|d| d.join(format!("{id}.yaml")))
}

pub fn schema_path(root: &Path, kind: SpecKind) -> PathBuf {
    root.join(SCHEMAS_DIR).join(kind.schema_file())
}

pub fn trace_links_path(root: &Path) -> PathBuf {
    root.join(TRACE_LINKS_FILE)
}

pub fn deltas_dir(root: &Path) -> PathBuf {
    root.join(DELTAS_DIR)
}

pub fn domain_registry_dir(root: &Path) -> PathBuf {
    root.join(DOMAIN_REGISTRY_DIR)
}

pub fn domain_index_path(root: &Path) -> PathBuf {
    root.join(DOMAIN_INDEX_FILE)
}

pub fn domain_file(root: &Path, dom_id: &str) -> PathBuf {
    domain_registry_dir(root).join(format!("{dom_id}.yaml"))
}

pub fn middleware_dir(root: &Path) -> PathBuf {
    root.join(MIDDLEWARE_DIR)
}

pub fn workspace_registry_path(root: &Path) -> PathBuf {
    root.join(WORKSPACE_REGISTRY_FILE)
}

pub fn commands_md(root: &Path) -> PathBuf {
    root.join(COMMANDS_MD)
}

pub fn events_md(root: &Path) -> PathBuf {
    root.join(EVENTS_MD)
}

pub fn repo_manifest_path(root: &Path) -> PathBuf {
    root.join(REPO_MANIFEST)
}

/// Root-relative display form of `path`, with `/` separators.
pub fn rel(root: &Path, path: &Path) -> String {
    let shown = path.strip_prefix(root).unwrap_or(path);
    shown.to_string_lossy().replace('\\', "/")
}

/// Files in `dir` with the given extension, sorted by name. A missing
/// directory yields an empty list.
pub fn sorted_files(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem as an owned string (`CAP-0001` for `CAP-0001.yaml`).
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
