use std::fmt;

/// Result type for delta-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),

    /// Engine layer error
    Engine(delta_engine::Error),

    /// Path/id layer error
    Core(delta_core::Error),

    /// JSON (de)serialization failed
    Json(serde_json::Error),

    /// The workspace directory cannot be created or written
    WorkspaceNotWritable(String),

    /// `--run-id` names a run directory that already exists
    RunIdConflict(String),

    /// A RUNNING run is owned by another host and `--force` was not given
    CrossHostRunning { run_id: String, hostname: String },

    /// The recorded process still exists and matches; refusing to steal
    RunStillActive { run_id: String, pid: u32 },

    /// Run directory or metadata missing
    RunNotFound(String),

    /// Invalid operation or state
    InvalidOperation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Engine(err) => write!(f, "{}", err),
            Error::Core(err) => write!(f, "{}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::WorkspaceNotWritable(msg) => {
                write!(f, "Workspace is not writable: {}", msg)
            }
            Error::RunIdConflict(id) => write!(
                f,
                "Run id {:?} already exists in this workspace; pick another or use `delta continue`",
                id
            ),
            Error::CrossHostRunning { run_id, hostname } => write!(
                f,
                "Run {:?} is marked RUNNING on host {:?}; re-run with --force to take it over",
                run_id, hostname
            ),
            Error::RunStillActive { run_id, pid } => write!(
                f,
                "Run {:?} is still being executed by live process {}",
                run_id, pid
            ),
            Error::RunNotFound(id) => write!(f, "Run {:?} not found in this workspace", id),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<delta_engine::Error> for Error {
    fn from(err: delta_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<delta_core::Error> for Error {
    fn from(err: delta_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
