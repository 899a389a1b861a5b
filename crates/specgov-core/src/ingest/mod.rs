//! Requirements ingestion: free text in, validated specification artifacts
//! out.
//!
//! ```text
//! state ─► prompt ─► LLM ─► parse plan ─► place ─► delta ─► validate
//!                                            ▲                 │ fail
//!                                            └─ rollback ◄─ repair (LLM)
//! ```

pub mod delta;
pub mod input;
pub mod place;
pub mod plan;
pub mod prompt;
pub mod state;

use crate::error::{Result, SpecError};
use crate::validate;
use chrono::NaiveDate;
use llm_client::ChatClient;
use serde::Serialize;
use std::path::Path;

use place::PlacementJournal;

pub use input::read_input;
pub use plan::{parse_plan, ArtifactKind, IngestionPlan, PlannedArtifact};
pub use state::SpecState;

/// Validation runs (the first plus repairs) before giving up.
pub const MAX_VALIDATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Decompose and report only; nothing is written.
    pub plan_only: bool,
    /// Log intended writes instead of performing them. Implies no validation.
    pub dry_run: bool,
    pub skip_validation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub plan: IngestionPlan,
    /// Root-relative files written by the final placement.
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_file: Option<String>,
    pub validated: bool,
    pub attempts: u32,
}

/// Run the whole pipeline for one requirement text.
///
/// When validation keeps failing after [`MAX_VALIDATE_ATTEMPTS`] runs the
/// last placement is left on disk for manual repair and
/// [`SpecError::ValidationExhausted`] is returned.
pub fn run(
    root: &Path,
    client: &dyn ChatClient,
    requirement: &str,
    opts: IngestOptions,
    today: NaiveDate,
) -> Result<IngestOutcome> {
    let state = SpecState::read(root)?;
    tracing::info!(
        bv = state.count("BV"),
        cap = state.count("CAP"),
        br = state.count("BR"),
        nfr = state.count("NFR"),
        cmd = state.count("CMD"),
        evt = state.count("EVT"),
        dom = state.count("DOM"),
        "read spec state"
    );

    let system = prompt::system_prompt(root, &state)?;
    tracing::info!(client = %client.describe(), "decomposing requirement");
    let response = client.complete(&system, &prompt::user_prompt(requirement))?;
    let mut plan = parse_plan(&response)?;
    plan.raw_input = requirement.to_string();
    tracing::info!(
        artifacts = plan.artifacts.len(),
        trace_links = plan.trace_links.len(),
        "decomposed"
    );

    let mut outcome = IngestOutcome {
        plan: IngestionPlan::default(),
        files: Vec::new(),
        delta_id: None,
        delta_file: None,
        validated: false,
        attempts: 0,
    };
    if opts.plan_only {
        outcome.plan = plan;
        return Ok(outcome);
    }

    let mut journal = PlacementJournal::default();
    let mut generated = place_all(root, &plan, today, opts.dry_run, &mut journal)?;

    if !opts.dry_run && !opts.skip_validation {
        for attempt in 1..=MAX_VALIDATE_ATTEMPTS {
            outcome.attempts = attempt;
            tracing::info!(attempt, max = MAX_VALIDATE_ATTEMPTS, "validating");
            let err = match validate::run(root) {
                Ok(_) => {
                    tracing::info!("validation passed");
                    outcome.validated = true;
                    break;
                }
                Err(e) => e,
            };
            tracing::warn!(error = %err, "validation failed");
            if attempt == MAX_VALIDATE_ATTEMPTS {
                return Err(SpecError::ValidationExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            tracing::info!("requesting repaired plan");
            let response = client.complete(&system, &prompt::repair_prompt(&err.to_string(), &plan)?)?;
            let repaired = parse_plan(&response)?;

            journal.rollback(root)?;
            journal = PlacementJournal::default();
            plan.artifacts = repaired.artifacts;
            plan.trace_links = repaired.trace_links;
            generated = place_all(root, &plan, today, false, &mut journal)?;
        }
    }

    outcome.files = journal.touched(root);
    if let Some(g) = generated {
        outcome.delta_file = Some(crate::paths::rel(root, &g.path));
        outcome.delta_id = Some(g.delta.id);
    }
    outcome.plan = plan;
    Ok(outcome)
}

/// Place the plan and write its delta. A failure part way through undoes
/// whatever this placement already wrote.
fn place_all(
    root: &Path,
    plan: &IngestionPlan,
    today: NaiveDate,
    dry_run: bool,
    journal: &mut PlacementJournal,
) -> Result<Option<delta::GeneratedDelta>> {
    let placed = place::place_artifacts(root, plan, dry_run, journal)
        .and_then(|()| delta::write_delta(root, plan, today, dry_run, journal));
    if placed.is_err() {
        tracing::warn!("placement failed, rolling back");
        journal.rollback(root)?;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, ScriptedClient};
    use crate::paths;
    use tempfile::TempDir;

    const GOOD_PLAN: &str = r#"{
      "artifacts": [
        {"kind": "BV", "data": {"id": "BV-0002", "title": "Self-service account recovery", "status": "proposed"}},
        {"kind": "CAP", "data": {"id": "CAP-0002", "title": "Password reset", "status": "proposed"}},
        {"kind": "BR", "data": {"id": "BR-0002", "title": "Reset links expire", "status": "proposed", "statement": "Links expire after 30 minutes"}},
        {"kind": "CMD", "data": {"id": "CMD-0002", "name": "Request reset", "domain": "Identity (DOM-0002)", "emits": "EVT-0002 (Reset requested)"}},
        {"kind": "EVT", "data": {"id": "EVT-0002", "name": "Reset requested", "triggered_by": "CMD-0002 (Request reset)"}}
      ],
      "trace_links": [
        {"from": "BV-0002", "to": "CAP-0002", "type": "realizes"},
        {"from": "CAP-0002", "to": "BR-0002", "type": "satisfies"}
      ],
      "delta_title": "Password reset",
      "delta_rationale": "Users lock themselves out"
    }"#;

    // CAP-0002 realizes nothing, so the coverage gate fails.
    const UNLINKED_PLAN: &str = r#"{
      "artifacts": [
        {"kind": "CAP", "data": {"id": "CAP-0002", "title": "Password reset", "status": "proposed"}},
        {"kind": "BR", "data": {"id": "BR-0002", "title": "Reset links expire", "status": "proposed"}}
      ],
      "trace_links": [
        {"from": "CAP-0002", "to": "BR-0002", "type": "satisfies"}
      ],
      "delta_title": "Password reset"
    }"#;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fixtures::write_baseline(dir.path());
        fixtures::write_domain_docs(dir.path());
        dir
    }

    fn delta_files(root: &Path) -> Vec<String> {
        paths::sorted_files(&paths::deltas_dir(root), "yaml")
            .unwrap()
            .iter()
            .map(|p| paths::rel(root, p))
            .collect()
    }

    #[test]
    fn places_delta_and_validates() {
        let dir = tree();
        let client = ScriptedClient::new([GOOD_PLAN]);
        let outcome = run(dir.path(), &client, "Users reset passwords", IngestOptions::default(), day()).unwrap();

        assert!(outcome.validated);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.delta_id.as_deref(), Some("DELTA-2026-03-14-001"));
        assert_eq!(outcome.delta_file.as_deref(), Some("specs/deltas/2026-03-14-password-reset.yaml"));
        assert!(dir.path().join("specs/requirements/capabilities/CAP-0002.yaml").is_file());
        assert!(std::fs::read_to_string(dir.path().join("specs/domain/events.md"))
            .unwrap()
            .contains("id=\"EVT-0002\""));
        assert_eq!(outcome.plan.raw_input, "Users reset passwords");
        assert!(client.prompts.borrow()[0].contains("REQUIREMENT:\nUsers reset passwords"));
        validate::run(dir.path()).unwrap();
    }

    #[test]
    fn plan_only_writes_nothing() {
        let dir = tree();
        let client = ScriptedClient::new([GOOD_PLAN]);
        let opts = IngestOptions { plan_only: true, ..Default::default() };
        let outcome = run(dir.path(), &client, "x", opts, day()).unwrap();
        assert_eq!(outcome.plan.artifacts.len(), 5);
        assert!(outcome.files.is_empty());
        assert!(!dir.path().join("specs/requirements/capabilities/CAP-0002.yaml").exists());
    }

    #[test]
    fn dry_run_writes_nothing_and_skips_validation() {
        let dir = tree();
        let before = std::fs::read(paths::trace_links_path(dir.path())).unwrap();
        let client = ScriptedClient::new([UNLINKED_PLAN]);
        let opts = IngestOptions { dry_run: true, ..Default::default() };
        let outcome = run(dir.path(), &client, "x", opts, day()).unwrap();

        assert!(!outcome.validated);
        assert_eq!(outcome.attempts, 0);
        assert!(outcome.files.is_empty());
        assert!(delta_files(dir.path()).is_empty());
        assert!(!dir.path().join("specs/requirements/capabilities/CAP-0002.yaml").exists());
        assert_eq!(std::fs::read(paths::trace_links_path(dir.path())).unwrap(), before);
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn failed_validation_rolls_back_and_repairs() {
        let dir = tree();
        let client = ScriptedClient::new([UNLINKED_PLAN, GOOD_PLAN]);
        let outcome = run(dir.path(), &client, "x", IngestOptions::default(), day()).unwrap();

        assert!(outcome.validated);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(client.calls(), 2);
        let repair = &client.prompts.borrow()[1];
        assert!(repair.contains("VALIDATION ERRORS:\nCoverage gate: CAP-0002 must realize"));
        assert!(repair.contains("\"id\": \"CAP-0002\""));

        // one delta, same sequence number as the rolled-back one
        assert_eq!(delta_files(dir.path()), vec!["specs/deltas/2026-03-14-password-reset.yaml"]);
        assert_eq!(outcome.delta_id.as_deref(), Some("DELTA-2026-03-14-001"));
        assert!(dir.path().join("specs/requirements/business-values/BV-0002.yaml").is_file());
    }

    #[test]
    fn exhausting_attempts_leaves_last_placement() {
        let dir = tree();
        let client = ScriptedClient::new([UNLINKED_PLAN, UNLINKED_PLAN, UNLINKED_PLAN]);
        let err = run(dir.path(), &client, "x", IngestOptions::default(), day()).unwrap_err();

        match err {
            SpecError::ValidationExhausted { attempts, last_error } => {
                assert_eq!(attempts, MAX_VALIDATE_ATTEMPTS);
                assert!(last_error.contains("CAP-0002"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.calls(), 3);
        assert!(dir.path().join("specs/requirements/capabilities/CAP-0002.yaml").is_file());
        assert_eq!(delta_files(dir.path()).len(), 1);
    }

    #[test]
    fn skip_validation_keeps_invalid_placement() {
        let dir = tree();
        let client = ScriptedClient::new([UNLINKED_PLAN]);
        let opts = IngestOptions { skip_validation: true, ..Default::default() };
        let outcome = run(dir.path(), &client, "x", opts, day()).unwrap();
        assert!(!outcome.validated);
        assert!(outcome.files.contains(&"specs/requirements/capabilities/CAP-0002.yaml".to_string()));
        assert!(validate::run(dir.path()).is_err());
    }

    #[test]
    fn failed_placement_is_undone() {
        let dir = tree();
        std::fs::remove_file(dir.path().join("specs/domain/commands.md")).unwrap();
        std::fs::create_dir_all(dir.path().join("specs/domain/commands.md")).unwrap();
        let before = std::fs::read(paths::trace_links_path(dir.path())).unwrap();

        let client = ScriptedClient::new([GOOD_PLAN]);
        assert!(run(dir.path(), &client, "x", IngestOptions::default(), day()).is_err());
        assert!(!dir.path().join("specs/requirements/business-values/BV-0002.yaml").exists());
        assert!(!dir.path().join("specs/requirements/capabilities/CAP-0002.yaml").exists());
        assert_eq!(std::fs::read(paths::trace_links_path(dir.path())).unwrap(), before);
        assert!(delta_files(dir.path()).is_empty());
    }

    #[test]
    fn path_like_ids_never_leave_the_tree() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("repo");
        fixtures::write_baseline(&root);
        let client = ScriptedClient::new([r#"{
          "artifacts": [{"kind": "BV", "data": {"id": "../../../../escaped", "title": "x", "status": "proposed"}}]
        }"#]);
        let opts = IngestOptions { skip_validation: true, ..Default::default() };
        let err = run(&root, &client, "x", opts, day()).unwrap_err();
        assert!(matches!(err, SpecError::Plan(_)));
        assert!(!outer.path().join("escaped.yaml").exists());
        assert!(delta_files(&root).is_empty());
    }
}
