use std::path::{Path, PathBuf};

/// Control-plane schema version written to `.delta/VERSION`
pub const CONTROL_PLANE_VERSION: &str = "2";

/// Name of the control-plane directory inside a workspace
pub const DELTA_DIR: &str = ".delta";

/// Every location inside `.delta/<run_id>/`, computed in one place
///
/// The run directory is created exactly once (exclusive mkdir) and acts as
/// the filesystem-level lock for the run id.
#[derive(Debug, Clone)]
pub struct RunPaths {
    work_dir: PathBuf,
    run_id: String,
}

impl RunPaths {
    pub fn new(work_dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn delta_dir(&self) -> PathBuf {
        self.work_dir.join(DELTA_DIR)
    }

    pub fn version_file(&self) -> PathBuf {
        self.delta_dir().join("VERSION")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.delta_dir().join(&self.run_id)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.run_dir().join("journal.jsonl")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.run_dir().join("metadata.json")
    }

    pub fn engine_log_path(&self) -> PathBuf {
        self.run_dir().join("engine.log")
    }

    pub fn io_dir(&self) -> PathBuf {
        self.run_dir().join("io")
    }

    pub fn invocations_dir(&self) -> PathBuf {
        self.io_dir().join("invocations")
    }

    pub fn invocation_dir(&self, invocation_ref: &str) -> PathBuf {
        self.invocations_dir().join(invocation_ref)
    }

    pub fn tool_executions_dir(&self) -> PathBuf {
        self.io_dir().join("tool_executions")
    }

    pub fn tool_execution_dir(&self, execution_ref: &str) -> PathBuf {
        self.tool_executions_dir().join(execution_ref)
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.io_dir().join("hooks")
    }

    pub fn interaction_dir(&self) -> PathBuf {
        self.run_dir().join("interaction")
    }

    pub fn interaction_request_path(&self) -> PathBuf {
        self.interaction_dir().join("request.json")
    }

    pub fn interaction_response_path(&self) -> PathBuf {
        self.interaction_dir().join("response.txt")
    }

    /// Create the audit subtree for a fresh run directory.
    pub fn create_audit_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.invocations_dir())?;
        std::fs::create_dir_all(self.tool_executions_dir())?;
        std::fs::create_dir_all(self.hooks_dir())?;
        Ok(())
    }
}
