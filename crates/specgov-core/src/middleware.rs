use crate::error::{Result, SpecError};
use crate::paths;
use crate::workspace::RepoIds;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const ENTRY_PREFIX: &str = "entry.middleware.";

// ---------------------------------------------------------------------------
// Metadata parsing
// ---------------------------------------------------------------------------

struct MetaPatterns {
    id: Regex,
    category: Regex,
    position: Regex,
    impl_ref: Regex,
    id_shape: Regex,
}

static PATTERNS: OnceLock<MetaPatterns> = OnceLock::new();

fn patterns() -> &'static MetaPatterns {
    PATTERNS.get_or_init(|| MetaPatterns {
        id: Regex::new(r"\*\*Middleware ID:\*\*\s*`(mw\.\w+)`").expect("valid regex"),
        category: Regex::new(r"\*\*Category:\*\*\s*(mandatory|optional)").expect("valid regex"),
        position: Regex::new(r"\*\*Pipeline Position:\*\*\s*([0-9]+)").expect("valid regex"),
        impl_ref: Regex::new(r"\*\*Implementation Ref:\*\*\s*`([^`]+?)\s*::\s*(entry\.middleware\.\w+)`")
            .expect("valid regex"),
        id_shape: Regex::new(r"^mw\.\w+$").expect("valid regex"),
    })
}

/// Metadata lines of one middleware markdown file. Each field is `None`
/// when its line is absent or malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiddlewareMeta {
    pub id: Option<String>,
    pub category: Option<String>,
    pub position: Option<String>,
    pub repo_id: Option<String>,
    pub entry_id: Option<String>,
}

pub fn parse_middleware_metadata(text: &str) -> MiddlewareMeta {
    let p = patterns();
    let first = |re: &Regex| re.captures(text).map(|c| c[1].to_string());
    let impl_ref = p.impl_ref.captures(text);
    MiddlewareMeta {
        id: first(&p.id),
        category: first(&p.category),
        position: first(&p.position),
        repo_id: impl_ref.as_ref().map(|c| c[1].trim().to_string()),
        entry_id: impl_ref.as_ref().map(|c| c[2].to_string()),
    }
}

fn is_readme(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().eq_ignore_ascii_case(paths::MIDDLEWARE_README))
        .unwrap_or(false)
}

/// Middleware spec files (every `*.md` except the README), in name order.
pub fn middleware_files(root: &Path) -> Result<Vec<PathBuf>> {
    let files = paths::sorted_files(&paths::middleware_dir(root), "md")?;
    Ok(files.into_iter().filter(|p| !is_readme(p)).collect())
}

/// One registered middleware, as summarized for task generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiddlewareSummary {
    pub id: String,
    pub position: String,
    pub category: String,
    pub file: String,
}

/// Every middleware file that declares an ID. Missing position or
/// category read as `?`.
pub fn middleware_summary(root: &Path) -> Result<Vec<MiddlewareSummary>> {
    let mut out = Vec::new();
    for path in middleware_files(root)? {
        let meta = parse_middleware_metadata(&std::fs::read_to_string(&path)?);
        if let Some(id) = meta.id {
            out.push(MiddlewareSummary {
                id,
                position: meta.position.unwrap_or_else(|| "?".into()),
                category: meta.category.unwrap_or_else(|| "?".into()),
                file: paths::rel(root, &path),
            });
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Registry validation
// ---------------------------------------------------------------------------

fn structure(msg: String) -> SpecError {
    SpecError::RegistryStructure(msg)
}

/// Validate the middleware registry. Returns the number of middleware
/// files checked.
pub fn validate_middleware_registry(root: &Path, repo_ids: &mut RepoIds) -> Result<usize> {
    let files = middleware_files(root)?;
    if files.is_empty() {
        return Ok(0);
    }

    let dir = paths::middleware_dir(root);
    let has_readme = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .any(|e| is_readme(&e.path()) && e.path().is_file());
    if !has_readme {
        return Err(structure(format!(
            "{}: missing README.md (middleware registry index)",
            paths::rel(root, &dir)
        )));
    }

    let repos = repo_ids.get()?;
    let shape = &patterns().id_shape;

    let mut seen_ids: HashMap<String, String> = HashMap::new();
    let mut seen_positions: BTreeMap<u64, (String, String)> = BTreeMap::new();

    for path in &files {
        let shown = paths::rel(root, path);
        let meta = parse_middleware_metadata(&std::fs::read_to_string(path)?);

        let Some(mw_id) = meta.id else {
            return Err(structure(format!(
                "{shown}: missing **Middleware ID:** `mw.*` in metadata section"
            )));
        };
        if !shape.is_match(&mw_id) {
            return Err(structure(format!(
                "{shown}: middleware ID '{mw_id}' does not match pattern mw.<name>"
            )));
        }
        if meta.category.is_none() {
            return Err(structure(format!(
                "{shown}: missing **Category:** (mandatory|optional) in metadata section"
            )));
        }
        let Some(raw_position) = meta.position else {
            return Err(structure(format!(
                "{shown}: missing **Pipeline Position:** in metadata section"
            )));
        };
        let position: u64 = raw_position.parse().map_err(|_| {
            structure(format!(
                "{shown}: pipeline position '{raw_position}' does not fit in an unsigned 64-bit integer"
            ))
        })?;
        let (Some(repo_id), Some(entry_id)) = (meta.repo_id, meta.entry_id) else {
            return Err(structure(format!(
                "{shown}: missing **Implementation Ref:** `<repoId> :: entry.middleware.*` in metadata section"
            )));
        };

        if let Some(other) = seen_ids.get(&mw_id) {
            return Err(structure(format!(
                "{shown}: duplicate middleware ID '{mw_id}' (also in {other})"
            )));
        }
        seen_ids.insert(mw_id.clone(), shown.clone());

        if let Some((other_id, other_file)) = seen_positions.get(&position) {
            return Err(structure(format!(
                "{shown}: duplicate pipeline position {position} (conflicts with '{other_id}' in {other_file})"
            )));
        }
        seen_positions.insert(position, (mw_id.clone(), shown.clone()));

        if !repos.contains(&repo_id) {
            return Err(structure(format!(
                "{shown}: repoId '{repo_id}' not found in {} repos[].id",
                paths::WORKSPACE_REGISTRY_FILE
            )));
        }
        if !entry_id.starts_with(ENTRY_PREFIX) {
            return Err(structure(format!(
                "{shown}: entry-point ID '{entry_id}' must start with '{ENTRY_PREFIX}'"
            )));
        }
    }

    let ordered: Vec<(&u64, &String)> = seen_positions.iter().map(|(p, (id, _))| (p, id)).collect();
    for pair in ordered.windows(2) {
        let ((prev_pos, prev_id), (pos, id)) = (pair[0], pair[1]);
        if pos <= prev_pos {
            return Err(structure(format!(
                "Middleware pipeline positions are not monotonically increasing: {prev_id}@{prev_pos} vs {id}@{pos}"
            )));
        }
    }

    tracing::debug!(middleware = files.len(), "middleware registry ok");
    Ok(files.len())
}
