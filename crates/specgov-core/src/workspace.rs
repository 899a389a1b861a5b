use crate::error::{Result, SpecError};
use crate::io;
use crate::paths;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Workspace repo IDs, read from disk the first time a registry check
/// needs them.
pub struct RepoIds {
    root: PathBuf,
    loaded: Option<BTreeSet<String>>,
}

impl RepoIds {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            loaded: None,
        }
    }

    pub fn get(&mut self) -> Result<&BTreeSet<String>> {
        if self.loaded.is_none() {
            self.loaded = Some(load_repo_ids(&self.root)?);
        }
        Ok(self.loaded.get_or_insert_with(BTreeSet::new))
    }
}

/// Load the valid `repoId` values from `specs/registry/workspace-registry.yaml`.
pub fn load_repo_ids(root: &Path) -> Result<BTreeSet<String>> {
    let path = paths::workspace_registry_path(root);
    let shown = paths::rel(root, &path);
    if !path.is_file() {
        return Err(SpecError::Configuration(format!(
            "Missing workspace registry: {shown}"
        )));
    }

    let doc = io::load_yaml_value(&path)
        .map_err(|e| SpecError::Configuration(format!("{shown}: {e}")))?;
    let Some(obj) = doc.as_object() else {
        return Err(SpecError::Configuration(format!("{shown}: expected object")));
    };
    let Some(repos) = obj.get("repos").and_then(Value::as_array) else {
        return Err(SpecError::Configuration(format!(
            "{shown}: 'repos' must be a list"
        )));
    };

    let mut ids = BTreeSet::new();
    for (i, repo) in repos.iter().enumerate() {
        if !repo.is_object() {
            return Err(SpecError::Configuration(format!(
                "{shown}: repos[{i}] must be an object"
            )));
        }
        match repo.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {
                ids.insert(id.to_string());
            }
            _ => {
                return Err(SpecError::Configuration(format!(
                    "{shown}: repos[{i}].id must be a non-empty string"
                )))
            }
        }
    }

    tracing::debug!(repos = ids.len(), "loaded workspace registry");
    Ok(ids)
}
