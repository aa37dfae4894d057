use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Synthesize a run id: `YYYYMMDD_HHMMSS_<6 lowercase hex>`.
pub fn generate_run_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..6])
}

/// Validate a caller-supplied run id.
///
/// The id becomes a directory name under `.delta/`, so anything that could
/// escape or alias another path is rejected.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.is_empty() {
        return Err(Error::InvalidRunId("must not be empty".to_string()));
    }
    if run_id.len() > 128 {
        return Err(Error::InvalidRunId("longer than 128 characters".to_string()));
    }
    if run_id == "." || run_id == ".." {
        return Err(Error::InvalidRunId(format!("reserved name: {}", run_id)));
    }
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    let shape = SHAPE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());
    if !shape.is_match(run_id) {
        return Err(Error::InvalidRunId(format!(
            "{:?} contains characters outside [A-Za-z0-9._-]",
            run_id
        )));
    }
    Ok(())
}

/// Allocate the next numbered reference directory name, `NNN_<label>`.
///
/// Used for hook I/O directories; numbering restarts per run and is derived
/// from the directory listing so resumes continue the sequence.
pub fn next_numbered_ref(parent: &std::path::Path, label: &str) -> Result<String> {
    let mut max_seen = 0u32;
    if parent.is_dir() {
        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some((prefix, _)) = name.split_once('_')
                && let Ok(n) = prefix.parse::<u32>()
            {
                max_seen = max_seen.max(n);
            }
        }
    }
    Ok(format!("{:03}_{}", max_seen + 1, label))
}
