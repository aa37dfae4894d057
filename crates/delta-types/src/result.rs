use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{InputType, RunStatus};

/// Structured run outcome emitted on stdout (`--format json`)
///
/// Exactly one of `result` / `error` / `interaction` is present, keyed by
/// `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub schema_version: String,
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<PendingInteraction>,
    pub metrics: RunMetrics,
    pub metadata: RunResultMetadata,
}

impl RunResult {
    pub const SCHEMA_VERSION: &'static str = "2.0";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Pending `ask_human` request surfaced when status is WAITING_FOR_INPUT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInteraction {
    pub request_id: String,
    pub prompt: String,
    pub input_type: InputType,
    pub request_path: String,
    pub response_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub iterations: u32,
    pub duration_ms: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub usage: UsageMetrics,
}

/// Token accounting accumulated across every LLM invocation of the run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageMetrics {
    pub total_cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Per-model breakdown; BTreeMap keeps JSON output deterministic
    pub model_usage: BTreeMap<String, ModelUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelUsage {
    pub invocations: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageMetrics {
    /// Fold one invocation's usage into the totals.
    pub fn record(&mut self, model: &str, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        let entry = self.model_usage.entry(model.to_string()).or_default();
        entry.invocations += 1;
        entry.input_tokens += input_tokens;
        entry.output_tokens += output_tokens;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResultMetadata {
    pub agent_name: String,
    pub workspace_path: String,
}
