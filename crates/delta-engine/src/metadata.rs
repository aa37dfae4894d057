//! `metadata.json` lifecycle.
//!
//! The only mutable file in a run directory. Every update goes through
//! write-to-temp + rename so a partial write never surfaces, and an mtime
//! check detects a concurrent writer before it can be clobbered.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use delta_types::RunMetadata;

use crate::{Error, Result};

pub struct MetadataStore {
    path: PathBuf,
    /// mtime observed at the last read/write; a mismatch on update means
    /// another process wrote the file
    last_seen_mtime: Option<SystemTime>,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seen_mtime: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the initial record for a freshly reserved run directory.
    pub fn create_initial(&mut self, metadata: &RunMetadata) -> Result<()> {
        self.write_atomic(metadata)
    }

    pub fn read(&mut self) -> Result<RunMetadata> {
        let content = std::fs::read_to_string(&self.path)?;
        let metadata = serde_json::from_str(&content)?;
        self.last_seen_mtime = mtime_of(&self.path);
        Ok(metadata)
    }

    /// Read-modify-write under the mtime guard.
    pub fn update<F>(&mut self, mutate: F) -> Result<RunMetadata>
    where
        F: FnOnce(&mut RunMetadata),
    {
        if let (Some(expected), Some(current)) = (self.last_seen_mtime, mtime_of(&self.path))
            && current != expected
        {
            return Err(Error::MetadataConflict(self.path.clone()));
        }

        let content = std::fs::read_to_string(&self.path)?;
        let mut metadata: RunMetadata = serde_json::from_str(&content)?;
        mutate(&mut metadata);
        metadata.updated_at = chrono::Utc::now();
        self.write_atomic(&metadata)?;
        Ok(metadata)
    }

    fn write_atomic(&mut self, metadata: &RunMetadata) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(metadata)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        self.last_seen_mtime = mtime_of(&self.path);
        Ok(())
    }
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_types::RunStatus;
    use tempfile::TempDir;

    fn sample(run_id: &str) -> RunMetadata {
        RunMetadata {
            run_id: run_id.to_string(),
            workspace_id: "W001".to_string(),
            agent_name: "demo".to_string(),
            status: RunStatus::Running,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            end_time: None,
            initial_message: "go".to_string(),
            iterations: 0,
            max_iterations: 30,
            error: None,
            agent_home: "/a".to_string(),
            work_dir: "/w".to_string(),
            pid: 1,
            hostname: "host".to_string(),
            start_time_unix: 0,
            process_name: "delta".to_string(),
        }
    }

    #[test]
    fn test_create_read_update() {
        let temp = TempDir::new().unwrap();
        let mut store = MetadataStore::new(temp.path().join("metadata.json"));
        store.create_initial(&sample("r1")).unwrap();

        let read = store.read().unwrap();
        assert_eq!(read.status, RunStatus::Running);

        let updated = store
            .update(|m| {
                m.iterations = 3;
                m.transition(RunStatus::Completed);
            })
            .unwrap();
        assert_eq!(updated.iterations, 3);
        assert_eq!(updated.status, RunStatus::Completed);
        assert!(updated.end_time.is_some());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let temp = TempDir::new().unwrap();
        let mut store = MetadataStore::new(temp.path().join("metadata.json"));
        store.create_initial(&sample("r1")).unwrap();
        store.update(|m| m.iterations = 1).unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["metadata.json"]);
    }

    #[test]
    fn test_concurrent_write_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metadata.json");
        let mut store = MetadataStore::new(path.clone());
        store.create_initial(&sample("r1")).unwrap();
        store.read().unwrap();

        // Another process rewrites the file with a different mtime.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut other = MetadataStore::new(path.clone());
        let mut meta = other.read().unwrap();
        meta.iterations = 99;
        let content = serde_json::to_string_pretty(&meta).unwrap();
        std::fs::write(&path, content).unwrap();
        let bumped = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let _ = filetime_set(&path, bumped);

        let result = store.update(|m| m.iterations = 1);
        assert!(matches!(result, Err(Error::MetadataConflict(_))));
    }

    /// Force a distinct mtime without depending on filesystem clock
    /// granularity.
    fn filetime_set(path: &Path, to: SystemTime) -> std::io::Result<()> {
        let file = std::fs::OpenOptions::new().append(true).open(path)?;
        file.set_modified(to)
    }
}
