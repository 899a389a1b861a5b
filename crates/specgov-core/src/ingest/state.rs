use crate::domain_registry::domain_files;
use crate::error::Result;
use crate::io;
use crate::markdown::extract_md_ids;
use crate::paths;
use crate::trace::TraceLink;
use crate::types::{DomainRefKind, SpecKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// ID prefixes the ingest pipeline allocates or reports, in display order.
pub const ID_PREFIXES: &[&str] = &["BV", "CAP", "BR", "NFR", "CMD", "EVT", "DOM"];

const SUMMARY_DESCRIPTION_LIMIT: usize = 100;

/// What already exists in the specification tree, as the LLM needs to see it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecState {
    /// Existing IDs keyed by prefix (`BV`, `CMD`, `DOM`, ...).
    pub ids: BTreeMap<String, BTreeSet<String>>,
    pub existing_links: Vec<TraceLink>,
    /// One `- DOM-0001: Name — description` line per domain file.
    pub domain_summary: Vec<String>,
}

impl SpecState {
    pub fn read(root: &Path) -> Result<SpecState> {
        let mut state = SpecState::default();

        for &kind in SpecKind::requirements() {
            let Some(dir) = paths::requirement_dir(root, kind) else {
                continue;
            };
            for path in paths::sorted_files(&dir, "yaml")? {
                if let Some(id) = io::load_yaml_value(&path)?.get("id").and_then(Value::as_str) {
                    state.insert(kind.as_str(), id);
                }
            }
        }

        for (kind, path) in [
            (DomainRefKind::Command, paths::commands_md(root)),
            (DomainRefKind::Event, paths::events_md(root)),
        ] {
            if path.is_file() {
                let text = std::fs::read_to_string(&path)?;
                for id in extract_md_ids(&text, kind) {
                    state.insert(kind.prefix(), &id);
                }
            }
        }

        for path in domain_files(root)? {
            let doc = io::load_yaml_value(&path)?;
            if !doc.is_object() {
                continue;
            }
            let text = |key: &str| doc.get(key).and_then(Value::as_str);
            if let Some(id) = text("id") {
                state.insert("DOM", id);
            }
            let description: String = text("description")
                .unwrap_or_default()
                .chars()
                .take(SUMMARY_DESCRIPTION_LIMIT)
                .collect();
            state.domain_summary.push(format!(
                "- {}: {} — {}",
                text("id").unwrap_or("?"),
                text("name").unwrap_or("?"),
                description
            ));
        }

        let trace = paths::trace_links_path(root);
        if trace.is_file() {
            let doc = io::load_yaml_value(&trace)?;
            if let Some(links) = doc.get("links").and_then(Value::as_array) {
                state.existing_links = links
                    .iter()
                    .filter_map(|l| serde_json::from_value(l.clone()).ok())
                    .collect();
            }
        }

        tracing::debug!(
            ids = state.ids.values().map(BTreeSet::len).sum::<usize>(),
            links = state.existing_links.len(),
            "read spec state"
        );
        Ok(state)
    }

    fn insert(&mut self, prefix: &str, id: &str) {
        self.ids.entry(prefix.to_string()).or_default().insert(id.to_string());
    }

    pub fn ids(&self, prefix: &str) -> impl Iterator<Item = &String> {
        self.ids.get(prefix).into_iter().flatten()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.ids.get(prefix).map_or(0, BTreeSet::len)
    }

    /// Next free ID for `prefix` given what is on disk.
    pub fn next_id(&self, prefix: &str) -> String {
        next_id(prefix, self.ids(prefix).map(String::as_str))
    }
}

/// `<PREFIX>-NNNN` one past the highest existing numeric suffix. IDs that
/// do not have exactly four digits after the prefix are ignored.
pub fn next_id<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let max = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(prefix)?.strip_prefix('-'))
        .filter(|digits| digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}-{:04}", max + 1)
}
