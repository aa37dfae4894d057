//! Assertions over run directories and journals.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;

use delta_core::DELTA_DIR;

/// The most recently created run directory in a workspace.
pub fn latest_run_dir(workspace: &Path) -> Result<PathBuf> {
    let delta_dir = workspace.join(DELTA_DIR);
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&delta_dir)
        .with_context(|| format!("no control plane at {}", delta_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            candidates.push((entry.metadata()?.modified()?, entry.path()));
        }
    }
    candidates.sort();
    match candidates.pop() {
        Some((_, path)) => Ok(path),
        None => bail!("no run directories under {}", delta_dir.display()),
    }
}

/// Parse the journal of a run directory into JSON values.
pub fn journal_events(run_dir: &Path) -> Result<Vec<Value>> {
    let path = run_dir.join("journal.jsonl");
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("no journal at {}", path.display()))?;
    let mut events = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("corrupt journal line {}", idx + 1))?;
        events.push(value);
    }
    Ok(events)
}

/// Event type tags of a run's journal, in order.
pub fn journal_kinds(run_dir: &Path) -> Result<Vec<String>> {
    Ok(journal_events(run_dir)?
        .iter()
        .filter_map(|e| e["type"].as_str().map(|s| s.to_string()))
        .collect())
}

/// Read and parse a run's metadata.json.
pub fn run_metadata(run_dir: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(run_dir.join("metadata.json"))?;
    Ok(serde_json::from_str(&content)?)
}

/// Walk a run's io/ tree and collect relative paths, for audit-coherence
/// assertions.
pub fn audit_tree(run_dir: &Path) -> Vec<String> {
    let io_dir = run_dir.join("io");
    walkdir::WalkDir::new(&io_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(&io_dir)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect()
}
