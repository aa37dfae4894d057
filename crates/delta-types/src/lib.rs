mod event;
mod hook;
mod manifest;
mod message;
mod metadata;
mod result;
mod tool;

pub use event::*;
pub use hook::*;
pub use manifest::*;
pub use message::*;
pub use metadata::*;
pub use result::*;
pub use tool::*;

use serde::{Deserialize, Serialize};

/// Run lifecycle status, persisted in `metadata.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    WaitingForInput,
    Completed,
    Failed,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::WaitingForInput => "WAITING_FOR_INPUT",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Interrupted => "INTERRUPTED",
        }
    }

    /// Terminal states never transition except through an explicit resume.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Interrupted
        )
    }

    /// States that `delta continue` accepts without the janitor.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Valid edges of the status machine. Used by the resume path and by
    /// property tests over recorded status sequences.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match self {
            RunStatus::Running => true,
            RunStatus::WaitingForInput => next == RunStatus::Running,
            RunStatus::Interrupted => next == RunStatus::Running,
            // A finished run only changes status when resumed with a new
            // user message.
            RunStatus::Completed | RunStatus::Failed => next == RunStatus::Running,
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(RunStatus::Running),
            "WAITING_FOR_INPUT" => Ok(RunStatus::WaitingForInput),
            "COMPLETED" => Ok(RunStatus::Completed),
            "FAILED" => Ok(RunStatus::Failed),
            "INTERRUPTED" => Ok(RunStatus::Interrupted),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
