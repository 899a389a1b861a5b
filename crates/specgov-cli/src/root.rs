use specgov_core::paths::SPECS_DIR;
use std::path::{Path, PathBuf};

/// Resolve the repository root holding `specs/`.
///
/// Priority:
/// 1. `--root` flag / `SPECGOV_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `specs/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, SPECS_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn specs_dir_beats_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("repo/specs")).unwrap();
        let deep = dir.path().join("repo/tools/deep");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_upward(&deep, "specs").unwrap(), dir.path().join("repo"));
        assert_eq!(find_upward(&deep, ".git").unwrap(), dir.path());
        assert!(find_upward(&deep, "no-such-marker").is_none());
    }
}
