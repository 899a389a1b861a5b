use crate::error::Result;
use crate::paths;
use crate::types::SpecKind;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A governed document found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecFile {
    pub path: PathBuf,
    pub kind: SpecKind,
}

/// Enumerate every governed document: requirement folders in kind order,
/// then the trace-link file, then deltas. Missing folders contribute
/// nothing; each folder is listed in lexicographic order.
pub fn collect_files(root: &Path) -> Result<Vec<SpecFile>> {
    let mut files = Vec::new();

    for &kind in SpecKind::requirements() {
        let Some(dir) = paths::requirement_dir(root, kind) else {
            continue;
        };
        for path in paths::sorted_files(&dir, "yaml")? {
            files.push(SpecFile { path, kind });
        }
    }

    let trace = paths::trace_links_path(root);
    if trace.is_file() {
        files.push(SpecFile {
            path: trace,
            kind: SpecKind::Trace,
        });
    }

    for path in paths::sorted_files(&paths::deltas_dir(root), "yaml")? {
        files.push(SpecFile {
            path,
            kind: SpecKind::Delta,
        });
    }

    tracing::debug!(count = files.len(), "collected spec files");
    Ok(files)
}
