//! `list-runs`: scan a workspace's control plane and filter run metadata.

use std::path::Path;

use tracing::warn;

use delta_core::DELTA_DIR;
use delta_types::{RunMetadata, RunStatus};

use crate::Result;

/// Filter for [`list_runs`]
#[derive(Debug, Default, Clone)]
pub struct RunFilter {
    /// Keep only runs `delta continue` would accept without the janitor
    pub resumable: bool,
    /// Exact status match
    pub status: Option<RunStatus>,
    /// Keep only the most recent match
    pub first: bool,
}

/// List runs in a workspace, most recently updated first.
///
/// Unreadable run directories are skipped with a warning rather than
/// failing the listing; a single corrupt run should not hide the others.
pub fn list_runs(workspace: &Path, filter: &RunFilter) -> Result<Vec<RunMetadata>> {
    let delta_dir = workspace.join(DELTA_DIR);
    if !delta_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in std::fs::read_dir(&delta_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let metadata_path = entry.path().join("metadata.json");
        if !metadata_path.is_file() {
            continue;
        }
        let content = match std::fs::read_to_string(&metadata_path) {
            Ok(content) => content,
            Err(err) => {
                warn!(target: "delta::list", path = %metadata_path.display(), "unreadable metadata: {}", err);
                continue;
            }
        };
        match serde_json::from_str::<RunMetadata>(&content) {
            Ok(metadata) => runs.push(metadata),
            Err(err) => {
                warn!(target: "delta::list", path = %metadata_path.display(), "malformed metadata: {}", err);
            }
        }
    }

    runs.retain(|run| {
        if filter.resumable && !run.status.is_resumable() {
            return false;
        }
        if let Some(status) = filter.status
            && run.status != status
        {
            return false;
        }
        true
    });

    runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    if filter.first {
        runs.truncate(1);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn write_run(workspace: &Path, run_id: &str, status: RunStatus, age_minutes: i64) {
        let now = Utc::now() - Duration::minutes(age_minutes);
        let metadata = RunMetadata {
            run_id: run_id.to_string(),
            workspace_id: "W001".to_string(),
            agent_name: "demo".to_string(),
            status,
            created_at: now,
            updated_at: now,
            end_time: None,
            initial_message: "go".to_string(),
            iterations: 0,
            max_iterations: 30,
            error: None,
            agent_home: "/a".to_string(),
            work_dir: workspace.display().to_string(),
            pid: 1,
            hostname: "host".to_string(),
            start_time_unix: 0,
            process_name: "delta".to_string(),
        };
        let dir = workspace.join(DELTA_DIR).join(run_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("metadata.json"),
            serde_json::to_string_pretty(&metadata).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_empty_workspace_lists_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(list_runs(temp.path(), &RunFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_ordering_most_recent_first() {
        let temp = TempDir::new().unwrap();
        write_run(temp.path(), "old", RunStatus::Completed, 60);
        write_run(temp.path(), "new", RunStatus::Completed, 1);
        write_run(temp.path(), "middle", RunStatus::Failed, 30);

        let runs = list_runs(temp.path(), &RunFilter::default()).unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "middle", "old"]);
    }

    #[test]
    fn test_resumable_excludes_running() {
        let temp = TempDir::new().unwrap();
        write_run(temp.path(), "live", RunStatus::Running, 1);
        write_run(temp.path(), "waiting", RunStatus::WaitingForInput, 2);
        write_run(temp.path(), "done", RunStatus::Completed, 3);
        write_run(temp.path(), "broken", RunStatus::Failed, 4);
        write_run(temp.path(), "stopped", RunStatus::Interrupted, 5);

        let runs = list_runs(
            temp.path(),
            &RunFilter {
                resumable: true,
                ..Default::default()
            },
        )
        .unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["waiting", "done", "broken", "stopped"]);
    }

    #[test]
    fn test_status_filter_and_first() {
        let temp = TempDir::new().unwrap();
        write_run(temp.path(), "f1", RunStatus::Failed, 10);
        write_run(temp.path(), "f2", RunStatus::Failed, 5);
        write_run(temp.path(), "c1", RunStatus::Completed, 1);

        let runs = list_runs(
            temp.path(),
            &RunFilter {
                status: Some(RunStatus::Failed),
                first: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "f2");
    }

    #[test]
    fn test_malformed_metadata_skipped() {
        let temp = TempDir::new().unwrap();
        write_run(temp.path(), "good", RunStatus::Completed, 1);
        let bad = temp.path().join(DELTA_DIR).join("bad");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join("metadata.json"), "not json").unwrap();

        let runs = list_runs(temp.path(), &RunFilter::default()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "good");
    }
}
