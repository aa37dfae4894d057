//! Workspace resolution.
//!
//! Workspaces live under `<agent_root>/workspaces/Wnnn`, zero-padded and
//! monotonically increasing from `W001`. The engine never deletes one.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

const WORKSPACES_DIR: &str = "workspaces";

fn workspace_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^W(\d{3,})$").unwrap())
}

/// Resolve the workspace for a run.
///
/// An explicit work dir is used verbatim (created if absent). Otherwise the
/// numerically highest existing `Wnnn` is reused, or `W001` is created on
/// first use.
pub fn resolve_workspace(agent_root: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        ensure_writable_dir(dir)?;
        return Ok(dir.to_path_buf());
    }

    let base = agent_root.join(WORKSPACES_DIR);
    match highest_workspace(&base)? {
        Some((_, path)) => Ok(path),
        None => {
            let first = base.join(format_workspace_name(1));
            ensure_writable_dir(&first)?;
            Ok(first)
        }
    }
}

/// Create the next workspace (`W<max+1>`), regardless of existing ones.
pub fn create_next_workspace(agent_root: &Path) -> Result<PathBuf> {
    let base = agent_root.join(WORKSPACES_DIR);
    let next = highest_workspace(&base)?.map(|(n, _)| n + 1).unwrap_or(1);
    let path = base.join(format_workspace_name(next));
    ensure_writable_dir(&path)?;
    Ok(path)
}

/// Workspace id (directory name) for a workspace path.
pub fn workspace_id(workspace: &Path) -> String {
    workspace
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| workspace.display().to_string())
}

fn format_workspace_name(n: u64) -> String {
    format!("W{:03}", n)
}

fn highest_workspace(base: &Path) -> Result<Option<(u64, PathBuf)>> {
    if !base.is_dir() {
        return Ok(None);
    }
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(caps) = workspace_name_re().captures(&name)
            && let Ok(n) = caps[1].parse::<u64>()
            && best.as_ref().is_none_or(|(max, _)| n > *max)
        {
            best = Some((n, entry.path()));
        }
    }
    Ok(best)
}

fn ensure_writable_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|err| Error::WorkspaceNotWritable(format!("{}: {}", dir.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_workspace_is_w001() {
        let temp = TempDir::new().unwrap();
        let workspace = resolve_workspace(temp.path(), None).unwrap();
        assert_eq!(workspace_id(&workspace), "W001");
        assert!(workspace.is_dir());
    }

    #[test]
    fn test_highest_existing_is_reused() {
        let temp = TempDir::new().unwrap();
        for name in ["W001", "W002", "W017"] {
            std::fs::create_dir_all(temp.path().join("workspaces").join(name)).unwrap();
        }
        // Non-matching names are ignored.
        std::fs::create_dir_all(temp.path().join("workspaces/W12")).unwrap();
        std::fs::create_dir_all(temp.path().join("workspaces/scratch")).unwrap();

        let workspace = resolve_workspace(temp.path(), None).unwrap();
        assert_eq!(workspace_id(&workspace), "W017");
    }

    #[test]
    fn test_create_next_increments_beyond_padding() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("workspaces/W999")).unwrap();

        let next = create_next_workspace(temp.path()).unwrap();
        assert_eq!(workspace_id(&next), "W1000");

        let after = create_next_workspace(temp.path()).unwrap();
        assert_eq!(workspace_id(&after), "W1001");
    }

    #[test]
    fn test_explicit_workspace_used_verbatim() {
        let temp = TempDir::new().unwrap();
        let custom = temp.path().join("elsewhere/data");
        let workspace = resolve_workspace(temp.path(), Some(&custom)).unwrap();
        assert_eq!(workspace, custom);
        assert!(custom.is_dir());
    }

    #[test]
    fn test_unwritable_workspace_errors() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("blocker");
        std::fs::write(&file, "not a dir").unwrap();

        let result = resolve_workspace(temp.path(), Some(&file.join("sub")));
        assert!(matches!(result, Err(Error::WorkspaceNotWritable(_))));
    }
}
