use super::place::PlacementJournal;
use super::plan::{IngestionPlan, DEFAULT_DELTA_TITLE};
use crate::delta::{Compatibility, Delta, DeltaChange, CHANGE_ADD};
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::types::STATUS_PROPOSED;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};

const SLUG_LIMIT: usize = 40;
const FALLBACK_SLUG: &str = "reqingest";
const DEFAULT_RATIONALE: &str = "New artifacts added via requirements ingestion pipeline.";

/// A delta built from an ingestion plan, and where it goes.
#[derive(Debug, Clone)]
pub struct GeneratedDelta {
    pub delta: Delta,
    pub path: PathBuf,
}

/// Lowercase, collapse every run of characters outside `[a-z0-9]` into one
/// `-`, keep the first 40 characters and trim dashes.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let mut slug = String::new();
    let mut in_gap = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }
    let cut: String = slug.chars().take(SLUG_LIMIT).collect();
    let trimmed = cut.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Next `DELTA-<date>-NNN` given the delta files already on disk.
fn next_delta_id(root: &Path, date: &str) -> Result<String> {
    let pattern = Regex::new(&format!(r"^DELTA-{}-(\d{{3}})$", regex::escape(date)))
        .expect("date is escaped");
    let mut seq = 1;
    for path in paths::sorted_files(&paths::deltas_dir(root), "yaml")? {
        let doc = io::load_yaml_value(&path)?;
        let id = doc.get("id").and_then(Value::as_str).unwrap_or_default();
        if let Some(n) = pattern.captures(id).and_then(|c| c[1].parse::<u32>().ok()) {
            seq = seq.max(n + 1);
        }
    }
    Ok(format!("DELTA-{date}-{seq:03}"))
}

/// `<date>-<slug>.yaml`, with a `-NNN` suffix when that name is taken.
fn free_delta_path(root: &Path, date: &str, slug: &str) -> PathBuf {
    let dir = paths::deltas_dir(root);
    let first = dir.join(format!("{date}-{slug}.yaml"));
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| dir.join(format!("{date}-{slug}-{n:03}.yaml")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Build the delta that records the plan's governed artifacts. `None` when
/// the plan has none; CMD/EVT are not delta-tracked.
pub fn build_delta(root: &Path, plan: &IngestionPlan, today: NaiveDate) -> Result<Option<GeneratedDelta>> {
    let changes: Vec<DeltaChange> = plan
        .governed()
        .map(|art| DeltaChange {
            change_type: CHANGE_ADD.to_string(),
            target: art.id.clone(),
            description: art.label().to_string(),
        })
        .collect();
    if changes.is_empty() {
        return Ok(None);
    }

    let date = today.format("%Y-%m-%d").to_string();
    let title = if plan.delta_title.trim().is_empty() {
        DEFAULT_DELTA_TITLE.to_string()
    } else {
        plan.delta_title.clone()
    };
    let rationale = if plan.delta_rationale.is_empty() {
        DEFAULT_RATIONALE.to_string()
    } else {
        plan.delta_rationale.clone()
    };

    let delta = Delta {
        id: next_delta_id(root, &date)?,
        title,
        status: STATUS_PROPOSED.to_string(),
        changes,
        compatibility: Some(Compatibility {
            claim: "non-breaking".to_string(),
            rationale,
        }),
    };
    let path = free_delta_path(root, &date, &slugify(&plan.delta_title));
    Ok(Some(GeneratedDelta { delta, path }))
}

/// Build and write the delta for `plan`, recording the write in `journal`.
pub fn write_delta(
    root: &Path,
    plan: &IngestionPlan,
    today: NaiveDate,
    dry_run: bool,
    journal: &mut PlacementJournal,
) -> Result<Option<GeneratedDelta>> {
    let Some(generated) = build_delta(root, plan, today)? else {
        tracing::info!("no governed artifacts, skipping delta");
        return Ok(None);
    };
    let shown = paths::rel(root, &generated.path);
    if dry_run {
        tracing::info!(
            file = %shown,
            id = %generated.delta.id,
            changes = generated.delta.changes.len(),
            "[dry-run] would create delta"
        );
        return Ok(Some(generated));
    }
    journal.record(&generated.path)?;
    io::write_yaml(&generated.path, &generated.delta)?;
    tracing::info!(
        file = %shown,
        id = %generated.delta.id,
        changes = generated.delta.changes.len(),
        "created delta"
    );
    Ok(Some(generated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::ingest::plan::parse_plan;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn plan(title: &str) -> IngestionPlan {
        parse_plan(&format!(
            r#"{{
              "artifacts": [
                {{"kind": "CAP", "data": {{"id": "CAP-0002", "title": "Password reset"}}}},
                {{"kind": "CMD", "data": {{"id": "CMD-0002", "name": "Request reset"}}}}
              ],
              "delta_title": "{title}"
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("  Password Reset via E-mail! "), "password-reset-via-e-mail");
        assert_eq!(slugify("***"), "reqingest");
        assert_eq!(slugify(""), "reqingest");
        let long = slugify("a very long title that keeps going well past the limit");
        assert_eq!(long, "a-very-long-title-that-keeps-going-well");
        assert!(long.len() <= 40);
    }

    #[test]
    fn builds_delta_for_governed_artifacts_only() {
        let dir = TempDir::new().unwrap();
        let generated = build_delta(dir.path(), &plan("Password reset"), day()).unwrap().unwrap();
        assert_eq!(generated.delta.id, "DELTA-2026-03-14-001");
        assert_eq!(generated.delta.status, "proposed");
        assert_eq!(generated.delta.changes.len(), 1);
        assert_eq!(generated.delta.changes[0].target, "CAP-0002");
        assert_eq!(generated.delta.changes[0].description, "Password reset");
        let compat = generated.delta.compatibility.unwrap();
        assert_eq!(compat.claim, "non-breaking");
        assert_eq!(compat.rationale, DEFAULT_RATIONALE);
        assert!(generated.path.ends_with("specs/deltas/2026-03-14-password-reset.yaml"));
    }

    #[test]
    fn no_governed_artifacts_no_delta() {
        let dir = TempDir::new().unwrap();
        let only_cmd = parse_plan(r#"{"artifacts": [{"kind": "CMD", "data": {"id": "CMD-0002"}}]}"#).unwrap();
        assert!(build_delta(dir.path(), &only_cmd, day()).unwrap().is_none());
    }

    #[test]
    fn sequence_and_filename_avoid_collisions() {
        let dir = TempDir::new().unwrap();
        fixtures::write(
            dir.path(),
            "specs/deltas/2026-03-14-password-reset.yaml",
            "id: DELTA-2026-03-14-004\ntitle: x\nstatus: proposed\nchanges: []\n",
        );
        fixtures::write(
            dir.path(),
            "specs/deltas/2026-03-13-other.yaml",
            "id: DELTA-2026-03-13-009\ntitle: y\nstatus: proposed\nchanges: []\n",
        );
        let generated = build_delta(dir.path(), &plan("Password reset"), day()).unwrap().unwrap();
        assert_eq!(generated.delta.id, "DELTA-2026-03-14-005");
        assert!(generated.path.ends_with("2026-03-14-password-reset-002.yaml"));
    }

    #[test]
    fn write_is_journaled() {
        let dir = TempDir::new().unwrap();
        let mut journal = PlacementJournal::default();
        let generated = write_delta(dir.path(), &plan("Reset"), day(), false, &mut journal)
            .unwrap()
            .unwrap();
        let written = crate::delta::load_delta(&generated.path).unwrap();
        assert_eq!(written, generated.delta);

        journal.rollback(dir.path()).unwrap();
        assert!(!generated.path.exists());
    }

    #[test]
    fn dry_run_does_not_write() {
        let dir = TempDir::new().unwrap();
        let mut journal = PlacementJournal::default();
        let generated = write_delta(dir.path(), &plan("Reset"), day(), true, &mut journal)
            .unwrap()
            .unwrap();
        assert!(!generated.path.exists());
        assert!(journal.is_empty());
    }
}
