use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RunStatus;

/// Per-run record, the only mutable file in `.delta/<run_id>/`
///
/// The pid/hostname/process_name/start_time_unix quadruple is the identity
/// the concurrency guard probes when reclaiming orphan RUNNING runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub workspace_id: String,
    pub agent_name: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub initial_message: String,
    pub iterations: u32,
    pub max_iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub agent_home: String,
    pub work_dir: String,
    pub pid: u32,
    pub hostname: String,
    pub start_time_unix: i64,
    pub process_name: String,
}

impl RunMetadata {
    /// Stamp a status change, keeping `updated_at` and `end_time` coherent.
    pub fn transition(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
        if status.is_terminal() {
            self.end_time = Some(self.updated_at);
        }
    }
}
