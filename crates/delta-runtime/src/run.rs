//! Run reservation and identity.
//!
//! The run directory is created with an exclusive mkdir: it doubles as the
//! filesystem-level lock that makes run ids unique within a workspace.

use std::path::Path;

use chrono::Utc;

use delta_core::{CONTROL_PLANE_VERSION, RunPaths, generate_run_id, validate_run_id};
use delta_types::{RunMetadata, RunStatus};

use crate::workspace::workspace_id;
use crate::{Error, Result};

/// Inputs for a new run
pub struct NewRun<'a> {
    pub agent_root: &'a Path,
    pub agent_name: &'a str,
    pub workspace: &'a Path,
    pub initial_message: &'a str,
    pub max_iterations: u32,
    /// Caller-supplied run id; synthesized when None
    pub run_id: Option<&'a str>,
}

/// Reserve a run directory and write its initial metadata.
pub fn create_run(request: &NewRun<'_>) -> Result<(RunPaths, RunMetadata)> {
    let run_id = match request.run_id {
        Some(id) => {
            validate_run_id(id)?;
            id.to_string()
        }
        None => generate_run_id(Utc::now()),
    };

    let paths = RunPaths::new(request.workspace, &run_id);
    std::fs::create_dir_all(paths.delta_dir())?;

    let version_file = paths.version_file();
    if !version_file.exists() {
        std::fs::write(&version_file, CONTROL_PLANE_VERSION)?;
    }

    // Exclusive mkdir: collision means the id is taken.
    match std::fs::create_dir(paths.run_dir()) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(Error::RunIdConflict(run_id));
        }
        Err(err) => return Err(err.into()),
    }
    paths.create_audit_dirs()?;

    let now = Utc::now();
    let metadata = RunMetadata {
        run_id: run_id.clone(),
        workspace_id: workspace_id(request.workspace),
        agent_name: request.agent_name.to_string(),
        status: RunStatus::Running,
        created_at: now,
        updated_at: now,
        end_time: None,
        initial_message: request.initial_message.to_string(),
        iterations: 0,
        max_iterations: request.max_iterations,
        error: None,
        agent_home: request.agent_root.display().to_string(),
        work_dir: request.workspace.display().to_string(),
        pid: std::process::id(),
        hostname: local_hostname(),
        start_time_unix: now.timestamp(),
        process_name: current_process_name(),
    };

    let mut store = delta_engine::MetadataStore::new(paths.metadata_path());
    store.create_initial(&metadata)?;

    Ok((paths, metadata))
}

/// Open an existing run for `continue`.
pub fn open_run(workspace: &Path, run_id: &str) -> Result<(RunPaths, RunMetadata)> {
    let paths = RunPaths::new(workspace, run_id);
    if !paths.run_dir().is_dir() {
        return Err(Error::RunNotFound(run_id.to_string()));
    }
    let mut store = delta_engine::MetadataStore::new(paths.metadata_path());
    let metadata = store.read().map_err(|_| Error::RunNotFound(run_id.to_string()))?;
    Ok((paths, metadata))
}

/// Stamp this process's identity into an existing run's metadata. Called on
/// resume before re-entering the loop.
pub fn adopt_run(paths: &RunPaths) -> Result<RunMetadata> {
    let mut store = delta_engine::MetadataStore::new(paths.metadata_path());
    store.read()?;
    let metadata = store.update(|m| {
        m.pid = std::process::id();
        m.hostname = local_hostname();
        m.process_name = current_process_name();
        m.start_time_unix = Utc::now().timestamp();
        m.transition(RunStatus::Running);
    })?;
    Ok(metadata)
}

pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

pub fn current_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "delta".to_string())
}
