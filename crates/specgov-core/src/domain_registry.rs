use crate::error::{Result, SpecError};
use crate::identity::domain_id_pattern;
use crate::io;
use crate::paths;
use crate::workspace::RepoIds;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const ENTRY_PREFIX: &str = "entry.";

/// `DOM-*.yaml` files in the domain registry folder, excluding templates,
/// in name order.
pub fn domain_files(root: &Path) -> Result<Vec<PathBuf>> {
    let files = paths::sorted_files(&paths::domain_registry_dir(root), "yaml")?;
    Ok(files
        .into_iter()
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            name.starts_with("DOM-") && !name.ends_with(paths::DOMAIN_TEMPLATE_SUFFIX)
        })
        .collect())
}

fn structure(msg: String) -> SpecError {
    SpecError::RegistryStructure(msg)
}

/// Validate `domains.yaml` against the domain files next to it. Absent
/// index means nothing to check. Returns the number of listed domains.
pub fn validate_domain_registry(root: &Path, repo_ids: &mut RepoIds) -> Result<usize> {
    let index_path = paths::domain_index_path(root);
    if !index_path.is_file() {
        return Ok(0);
    }
    let index = paths::rel(root, &index_path);

    let doc = io::load_spec_document(root, &index_path)?;
    let Some(obj) = doc.as_object() else {
        return Err(structure(format!("{index}: expected object")));
    };
    let listed = match obj.get("domains") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return Err(structure(format!("{index}: 'domains' must be a list"))),
    };

    let pattern = domain_id_pattern();
    let mut domain_ids: Vec<String> = Vec::with_capacity(listed.len());
    for (i, entry) in listed.iter().enumerate() {
        let Some(id) = entry.as_str() else {
            return Err(structure(format!(
                "{index}: domains[{i}] must be a string DOM-####"
            )));
        };
        if !pattern.is_match(id) {
            return Err(structure(format!(
                "{index}: domains[{i}]='{id}' does not match pattern {}",
                pattern.as_str()
            )));
        }
        domain_ids.push(id.to_string());
    }

    let listed_set: BTreeSet<&str> = domain_ids.iter().map(String::as_str).collect();
    if listed_set.len() != domain_ids.len() {
        return Err(structure(format!(
            "{index}: 'domains' must not contain duplicates"
        )));
    }

    let present: BTreeSet<String> = domain_files(root)?
        .iter()
        .map(|p| paths::stem(p))
        .filter(|stem| pattern.is_match(stem))
        .collect();
    let orphans: Vec<&str> = present
        .iter()
        .map(String::as_str)
        .filter(|id| !listed_set.contains(id))
        .collect();
    if !orphans.is_empty() {
        return Err(structure(format!(
            "{index}: orphan domain files not listed in domains.yaml: {}",
            orphans.join(", ")
        )));
    }

    if domain_ids.is_empty() {
        return Ok(0);
    }
    let repos = repo_ids.get()?;

    for dom_id in &domain_ids {
        let dom_path = paths::domain_file(root, dom_id);
        let shown = paths::rel(root, &dom_path);
        if !dom_path.is_file() {
            return Err(structure(format!("{index}: missing domain file: {shown}")));
        }

        let dom = io::load_spec_document(root, &dom_path)?;
        if !dom.is_object() {
            return Err(structure(format!("{shown}: expected object")));
        }
        if dom.get("id").and_then(Value::as_str) != Some(dom_id.as_str()) {
            return Err(structure(format!(
                "{shown}: 'id' must match filename id '{dom_id}'"
            )));
        }

        let repo_id = match dom.get("repoId").and_then(Value::as_str) {
            Some(r) if !r.is_empty() => r,
            _ => return Err(structure(format!("{shown}: missing/invalid 'repoId'"))),
        };
        if !repos.contains(repo_id) {
            return Err(structure(format!(
                "{shown}: repoId '{repo_id}' not found in {} repos[].id",
                paths::WORKSPACE_REGISTRY_FILE
            )));
        }

        let Some(entrypoints) = dom.get("entrypoints").filter(|e| e.is_object()) else {
            return Err(structure(format!(
                "{shown}: missing/invalid 'entrypoints' object"
            )));
        };
        for key in ["core", "container"] {
            match entrypoints.get(key).and_then(Value::as_str) {
                Some(ep) if !ep.is_empty() => {
                    if !ep.starts_with(ENTRY_PREFIX) {
                        return Err(structure(format!(
                            "{shown}: entrypoints.{key} must start with '{ENTRY_PREFIX}'"
                        )));
                    }
                }
                _ => {
                    return Err(structure(format!(
                        "{shown}: entrypoints.{key} must be a non-empty string"
                    )))
                }
            }
        }
    }

    tracing::debug!(domains = domain_ids.len(), "domain registry ok");
    Ok(domain_ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    fn domain_doc(id: &str, repo: &str) -> String {
        format!(
            "id: {id}\nname: Orders\nrepoId: {repo}\nentrypoints:\n  core: entry.orders.core\n  container: entry.orders.container\n"
        )
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            paths::WORKSPACE_REGISTRY_FILE,
            "repos:\n  - id: orders-svc\n",
        );
        write(
            dir.path(),
            "specs/architecture/domain/domains.yaml",
            "domains:\n  - DOM-0001\n",
        );
        write(
            dir.path(),
            "specs/architecture/domain/DOM-0001.yaml",
            &domain_doc("DOM-0001", "orders-svc"),
        );
        write(
            dir.path(),
            "specs/architecture/domain/DOM-0000-template.yaml",
            "id: DOM-XXXX\n",
        );
        dir
    }

    fn run(dir: &TempDir) -> Result<usize> {
        let mut repos = RepoIds::new(dir.path());
        validate_domain_registry(dir.path(), &mut repos)
    }

    #[test]
    fn valid_registry_passes_and_ignores_template() {
        let dir = setup();
        assert_eq!(run(&dir).unwrap(), 1);
    }

    #[test]
    fn absent_index_is_noop() {
        let dir = TempDir::new().unwrap();
        assert_eq!(run(&dir).unwrap(), 0);
    }

    #[test]
    fn null_domains_is_empty_and_skips_registry() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "specs/architecture/domain/domains.yaml", "domains:\n");
        assert_eq!(run(&dir).unwrap(), 0);
    }

    #[test]
    fn orphan_file_fails() {
        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/DOM-0002.yaml",
            &domain_doc("DOM-0002", "orders-svc"),
        );
        let err = run(&dir).unwrap_err();
        assert!(matches!(err, SpecError::RegistryStructure(_)));
        assert!(err.to_string().contains("orphan domain files"));
        assert!(err.to_string().contains("DOM-0002"));
    }

    #[test]
    fn duplicate_listing_fails() {
        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/domains.yaml",
            "domains:\n  - DOM-0001\n  - DOM-0001\n",
        );
        assert!(run(&dir).unwrap_err().to_string().contains("duplicates"));
    }

    #[test]
    fn listed_without_file_fails() {
        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/domains.yaml",
            "domains:\n  - DOM-0001\n  - DOM-0003\n",
        );
        assert!(run(&dir).unwrap_err().to_string().contains("missing domain file"));
    }

    #[test]
    fn unknown_repo_fails() {
        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/DOM-0001.yaml",
            &domain_doc("DOM-0001", "ghost"),
        );
        assert!(run(&dir).unwrap_err().to_string().contains("repoId 'ghost'"));
    }

    #[test]
    fn entrypoint_prefix_enforced() {
        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/DOM-0001.yaml",
            "id: DOM-0001\nrepoId: orders-svc\nentrypoints:\n  core: orders.core\n  container: entry.c\n",
        );
        let msg = run(&dir).unwrap_err().to_string();
        assert!(msg.contains("entrypoints.core must start with 'entry.'"));
    }

    #[test]
    fn bad_pattern_and_id_mismatch_fail() {
        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/domains.yaml",
            "domains:\n  - DOM-1\n",
        );
        assert!(run(&dir).unwrap_err().to_string().contains("does not match pattern"));

        let dir = setup();
        write(
            dir.path(),
            "specs/architecture/domain/DOM-0001.yaml",
            &domain_doc("DOM-0009", "orders-svc"),
        );
        assert!(run(&dir).unwrap_err().to_string().contains("must match filename id"));
    }
}
