use std::fmt;
use std::path::PathBuf;

/// Result type for delta-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the engine layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),

    /// JSON (de)serialization failed
    Json(serde_json::Error),

    /// Configuration layer error
    Config(delta_config::Error),

    /// Path/id layer error
    Core(delta_core::Error),

    /// A journal line is not a valid event
    JournalCorrupt { line: usize, message: String },

    /// Sequence numbers went backwards or repeated
    SeqRegression { line: usize, prev: u64, next: u64 },

    /// metadata.json changed underneath us between read and write
    MetadataConflict(PathBuf),

    /// A required context source could not be produced
    ContextFileMissing { source: String, path: PathBuf },

    /// A context generator failed or timed out
    GeneratorFailed { source: String, message: String },

    /// A tool call omitted a required parameter
    MissingParameter { tool: String, parameter: String },

    /// The LLM requested a tool that is not defined
    UnknownTool(String),

    /// Unrecoverable LLM adapter failure
    Llm(String),

    /// ask_human bookkeeping failure (missing request, bad response file)
    Interaction(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Config(err) => write!(f, "Configuration error: {}", err),
            Error::Core(err) => write!(f, "{}", err),
            Error::JournalCorrupt { line, message } => {
                write!(f, "Corrupt journal at line {}: {}", line, message)
            }
            Error::SeqRegression { line, prev, next } => write!(
                f,
                "Journal sequence regression at line {}: {} followed by {}",
                line, prev, next
            ),
            Error::MetadataConflict(path) => write!(
                f,
                "Concurrent modification of {} detected",
                path.display()
            ),
            Error::ContextFileMissing { source, path } => write!(
                f,
                "Context source {:?}: required file {} is missing",
                source,
                path.display()
            ),
            Error::GeneratorFailed { source, message } => {
                write!(f, "Context source {:?}: generator failed: {}", source, message)
            }
            Error::MissingParameter { tool, parameter } => {
                write!(f, "Tool {:?}: missing required parameter {:?}", tool, parameter)
            }
            Error::UnknownTool(name) => write!(f, "Unknown tool: {:?}", name),
            Error::Llm(msg) => write!(f, "LLM adapter error: {}", msg),
            Error::Interaction(msg) => write!(f, "Interaction error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Config(err) => Some(err),
            Error::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<delta_config::Error> for Error {
    fn from(err: delta_config::Error) -> Self {
        Error::Config(err)
    }
}

impl From<delta_core::Error> for Error {
    fn from(err: delta_core::Error) -> Self {
        Error::Core(err)
    }
}
