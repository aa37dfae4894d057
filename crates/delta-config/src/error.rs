use std::fmt;
use std::path::PathBuf;

/// Result type for delta-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading an agent project
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),

    /// No main config found at the agent root
    ConfigNotFound(PathBuf),

    /// YAML parse or schema failure, with the offending file
    Parse { path: PathBuf, message: String },

    /// `imports` entry resolved outside the agent root
    ImportEscapesRoot { entry: String, resolved: PathBuf },

    /// `imports` resolution revisited a file on the current stack
    ImportCycle { chain: Vec<PathBuf> },

    /// Required `context.yaml` is absent
    MissingContextManifest { expected: PathBuf, suggestion: String },

    /// A declarative tool failed structural validation
    InvalidTool { tool: String, message: String },

    /// Explicit parameter block tried to change an inferred binding
    ParameterModeConflict { tool: String, parameter: String },

    /// Explicit parameter block names a parameter with no placeholder
    UndeclaredParameter { tool: String, parameter: String },

    /// Any other structural validation failure
    Validation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::ConfigNotFound(root) => write!(
                f,
                "No agent.yaml found in {} (nor legacy config.yaml)",
                root.display()
            ),
            Error::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            Error::ImportEscapesRoot { entry, resolved } => write!(
                f,
                "Import {:?} resolves to {} which is outside the agent root",
                entry,
                resolved.display()
            ),
            Error::ImportCycle { chain } => {
                let chain: Vec<String> =
                    chain.iter().map(|p| p.display().to_string()).collect();
                write!(f, "Import cycle detected: {}", chain.join(" -> "))
            }
            Error::MissingContextManifest {
                expected,
                suggestion,
            } => write!(
                f,
                "context.yaml is required but missing at {}.\nA minimal manifest looks like:\n{}",
                expected.display(),
                suggestion
            ),
            Error::InvalidTool { tool, message } => {
                write!(f, "Invalid tool {:?}: {}", tool, message)
            }
            Error::ParameterModeConflict { tool, parameter } => write!(
                f,
                "Tool {:?}: parameter {:?} cannot change inject_as/position/raw inferred from the template",
                tool, parameter
            ),
            Error::UndeclaredParameter { tool, parameter } => write!(
                f,
                "Tool {:?}: parameter {:?} does not appear in the command template",
                tool, parameter
            ),
            Error::Validation(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
