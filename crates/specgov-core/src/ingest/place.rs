use super::plan::{ArtifactKind, IngestionPlan};
use crate::error::{Result, SpecError};
use crate::io;
use crate::markdown::{format_cmd_markdown, format_evt_markdown};
use crate::paths;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// PlacementJournal
// ---------------------------------------------------------------------------

/// Files touched by one placement, so it can be undone: files that did not
/// exist before, and the original contents of files that did.
#[derive(Debug, Default)]
pub struct PlacementJournal {
    created: Vec<PathBuf>,
    modified: Vec<(PathBuf, Vec<u8>)>,
}

impl PlacementJournal {
    /// Remember `path` before its first write in this placement.
    pub fn record(&mut self, path: &Path) -> Result<()> {
        let seen = self.created.iter().any(|p| p == path)
            || self.modified.iter().any(|(p, _)| p == path);
        if seen {
            return Ok(());
        }
        if path.exists() {
            self.modified.push((path.to_path_buf(), std::fs::read(path)?));
        } else {
            self.created.push(path.to_path_buf());
        }
        Ok(())
    }

    /// Delete created files and restore modified ones, newest first.
    pub fn rollback(&self, root: &Path) -> Result<()> {
        for path in self.created.iter().rev() {
            if path.exists() {
                std::fs::remove_file(path)?;
                tracing::info!(file = %paths::rel(root, path), "rolled back");
            }
        }
        for (path, original) in self.modified.iter().rev() {
            io::atomic_write(path, original)?;
            tracing::info!(file = %paths::rel(root, path), "restored");
        }
        Ok(())
    }

    /// Every file this placement wrote, root-relative.
    pub fn touched(&self, root: &Path) -> Vec<String> {
        self.created
            .iter()
            .chain(self.modified.iter().map(|(p, _)| p))
            .map(|p| paths::rel(root, p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Write every planned artifact and trace link, recording each file in
/// `journal` before it is written. On error the journal still covers the
/// files already written. With `dry_run` the intended writes are only
/// logged and the journal is left untouched.
pub fn place_artifacts(
    root: &Path,
    plan: &IngestionPlan,
    dry_run: bool,
    journal: &mut PlacementJournal,
) -> Result<()> {
    for art in &plan.artifacts {
        if !art.kind.accepts_id(&art.id) {
            return Err(SpecError::Plan(format!(
                "refusing to place {} with malformed id '{}'",
                art.kind, art.id
            )));
        }
        match art.kind.spec_kind() {
            Some(kind) => {
                let Some(path) = paths::requirement_path(root, kind, &art.id) else {
                    continue;
                };
                let shown = paths::rel(root, &path);
                if dry_run {
                    tracing::info!(file = %shown, "[dry-run] would create");
                    continue;
                }
                if path.exists() {
                    tracing::warn!(file = %shown, "overwriting existing artifact");
                }
                journal.record(&path)?;
                io::write_yaml(&path, &art.data)?;
                tracing::info!(file = %shown, "created");
            }
            None => {
                let (path, section) = match art.kind {
                    ArtifactKind::Cmd => (paths::commands_md(root), format_cmd_markdown(&art.data)),
                    _ => (paths::events_md(root), format_evt_markdown(&art.data)),
                };
                let shown = paths::rel(root, &path);
                if dry_run {
                    tracing::info!(file = %shown, id = %art.id, "[dry-run] would append");
                    continue;
                }
                journal.record(&path)?;
                io::append_section(&path, &section)?;
                tracing::info!(file = %shown, id = %art.id, "appended");
            }
        }
    }

    append_trace_links(root, plan, dry_run, journal)
}

/// Append the plan's links to `trace-links.yaml`, keeping whatever else the
/// file holds.
fn append_trace_links(
    root: &Path,
    plan: &IngestionPlan,
    dry_run: bool,
    journal: &mut PlacementJournal,
) -> Result<()> {
    if plan.trace_links.is_empty() {
        return Ok(());
    }
    let path = paths::trace_links_path(root);
    if dry_run {
        tracing::info!(count = plan.trace_links.len(), "[dry-run] would add trace links");
        return Ok(());
    }

    let mut doc = if path.is_file() {
        io::load_yaml_value(&path)?
    } else {
        Value::Object(Map::new())
    };
    if !doc.is_object() {
        doc = Value::Object(Map::new());
    }
    let Some(obj) = doc.as_object_mut() else {
        return Ok(());
    };
    let links = obj
        .entry("links")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !links.is_array() {
        *links = Value::Array(Vec::new());
    }
    if let Some(list) = links.as_array_mut() {
        for link in &plan.trace_links {
            list.push(serde_json::to_value(link)?);
        }
    }

    journal.record(&path)?;
    io::write_yaml(&path, &doc)?;
    tracing::info!(count = plan.trace_links.len(), "updated trace-links.yaml");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::ingest::plan::parse_plan;
    use tempfile::TempDir;

    fn plan() -> IngestionPlan {
        parse_plan(
            r#"{
              "artifacts": [
                {"kind": "BV", "data": {"id": "BV-0002", "title": "Fewer support calls", "status": "proposed"}},
                {"kind": "CMD", "data": {"id": "CMD-0002", "name": "Request reset", "domain": "Identity (DOM-0002)"}},
                {"kind": "EVT", "data": {"id": "EVT-0002", "name": "Reset requested"}}
              ],
              "trace_links": [{"from": "BV-0002", "to": "CAP-0001", "type": "realizes"}]
            }"#,
        )
        .unwrap()
    }

    fn place(root: &Path, plan: &IngestionPlan, dry_run: bool) -> PlacementJournal {
        let mut journal = PlacementJournal::default();
        place_artifacts(root, plan, dry_run, &mut journal).unwrap();
        journal
    }

    #[test]
    fn places_yaml_markdown_and_links() {
        let dir = TempDir::new().unwrap();
        fixtures::write_baseline(dir.path());
        fixtures::write_domain_docs(dir.path());
        let journal = place(dir.path(), &plan(), false);

        let bv = std::fs::read_to_string(
            dir.path().join("specs/requirements/business-values/BV-0002.yaml"),
        )
        .unwrap();
        assert!(bv.starts_with("id: BV-0002\ntitle: Fewer support calls\n"));

        let commands = std::fs::read_to_string(dir.path().join("specs/domain/commands.md")).unwrap();
        assert!(commands.contains("<a id=\"CMD-0001\"></a>"));
        assert!(commands.contains("<a id=\"CMD-0002\"></a>\n### CMD-0002: Request reset"));

        let links = io::load_yaml_value(&paths::trace_links_path(dir.path())).unwrap();
        assert_eq!(links["links"].as_array().unwrap().len(), 3);
        assert_eq!(links["links"][2]["from"], "BV-0002");

        let mut touched = journal.touched(dir.path());
        touched.sort();
        assert_eq!(
            touched,
            vec![
                "specs/domain/commands.md",
                "specs/domain/events.md",
                "specs/requirements/business-values/BV-0002.yaml",
                "specs/requirements/trace-links.yaml",
            ]
        );
    }

    #[test]
    fn rollback_restores_previous_tree() {
        let dir = TempDir::new().unwrap();
        fixtures::write_baseline(dir.path());
        fixtures::write_domain_docs(dir.path());
        let before_cmds = std::fs::read(dir.path().join("specs/domain/commands.md")).unwrap();
        let before_links = std::fs::read(paths::trace_links_path(dir.path())).unwrap();

        let journal = place(dir.path(), &plan(), false);
        journal.rollback(dir.path()).unwrap();

        assert!(!dir
            .path()
            .join("specs/requirements/business-values/BV-0002.yaml")
            .exists());
        assert_eq!(std::fs::read(dir.path().join("specs/domain/commands.md")).unwrap(), before_cmds);
        assert_eq!(std::fs::read(paths::trace_links_path(dir.path())).unwrap(), before_links);
    }

    #[test]
    fn creates_missing_files() {
        let dir = TempDir::new().unwrap();
        let journal = place(dir.path(), &plan(), false);
        assert!(dir.path().join("specs/domain/events.md").is_file());
        let links = io::load_yaml_value(&paths::trace_links_path(dir.path())).unwrap();
        assert_eq!(links["links"].as_array().unwrap().len(), 1);

        journal.rollback(dir.path()).unwrap();
        assert!(!paths::trace_links_path(dir.path()).exists());
        assert!(!dir.path().join("specs/domain/events.md").exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let journal = place(dir.path(), &plan(), true);
        assert!(journal.is_empty());
        assert!(!dir.path().join("specs").exists());
    }

    #[test]
    fn partial_placement_is_journaled() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("specs/domain/commands.md")).unwrap();

        let mut journal = PlacementJournal::default();
        assert!(place_artifacts(dir.path(), &plan(), false, &mut journal).is_err());
        let bv = dir.path().join("specs/requirements/business-values/BV-0002.yaml");
        assert!(bv.is_file());
        assert_eq!(
            journal.touched(dir.path()),
            vec!["specs/requirements/business-values/BV-0002.yaml"]
        );

        journal.rollback(dir.path()).unwrap();
        assert!(!bv.exists());
    }

    #[test]
    fn malformed_ids_are_never_written() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let mut plan = plan();
        plan.artifacts[0].id = "../../escaped".to_string();

        let mut journal = PlacementJournal::default();
        let err = place_artifacts(&root, &plan, false, &mut journal).unwrap_err();
        assert!(matches!(err, SpecError::Plan(_)));
        assert!(journal.is_empty());
        assert!(!dir.path().join("escaped.yaml").exists());
        assert!(!root.join("specs").exists());
    }
}
