use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RunStatus;

// NOTE: Journal Schema Design
//
// 1. Single source of truth: every iteration is reconstructed purely from
//    journal contents + workspace files. THOUGHT therefore carries the
//    assistant text inline; the io/ audit tree is for forensics, not replay.
// 2. Append-only: records are one JSON object per line, never rewritten.
//    `seq` establishes the exact causal order inside a run.
// 3. Fail-fast reads: an unknown `type` tag or malformed line aborts the
//    read. Silently skipping lines would desynchronize replay from audit.

/// One record of `journal.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Monotonic sequence number, starts at 1
    pub seq: u64,

    /// Event timestamp (UTC, ISO-8601)
    pub timestamp: DateTime<Utc>,

    /// Event kind and payload (flattened tagged union)
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Journal event payload variants, discriminated by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    /// Engine (re)entered the loop
    EngineStart {
        run_id: String,
        agent_name: String,
        initial_message: String,
        /// False on the first start, true on every `continue`
        resumed: bool,
    },

    /// One LLM response, persisted under `io/invocations/<ref>/`
    Thought {
        iteration: u32,
        llm_invocation_ref: String,
        /// Assistant text content; empty when the turn is tool-calls only
        content: String,
    },

    /// The engine is about to execute a tool call
    ActionRequest {
        iteration: u32,
        action_id: String,
        tool_name: String,
        tool_args: Value,
        /// Fully resolved argv, for audit display
        resolved_command: String,
    },

    /// Outcome of a tool call, paired to its request by `action_id`
    ActionResult {
        iteration: u32,
        action_id: String,
        execution_ref: String,
        status: ActionStatus,
        observation_content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// Audit record for one lifecycle hook invocation
    HookExecutionAudit {
        hook_name: String,
        io_path_ref: String,
        status: ActionStatus,
        duration_ms: u64,
    },

    /// Async `ask_human` wrote `interaction/request.json`
    HumanInputRequest {
        request_id: String,
        prompt: String,
        input_type: InputType,
        sensitive: bool,
    },

    /// The pending interaction was answered
    HumanInputReceived {
        request_id: String,
        /// Redacted to "[sensitive]" when the request was marked sensitive
        content: String,
    },

    /// Terminal record of one engine entry
    EngineEnd {
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Unrecoverable failure detail, written before ENGINE_END
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },

    /// Engine-injected message, replayed as a user turn
    SystemMessage { content: String },
}

impl EventPayload {
    /// Tag string as it appears on disk
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::EngineStart { .. } => "ENGINE_START",
            EventPayload::Thought { .. } => "THOUGHT",
            EventPayload::ActionRequest { .. } => "ACTION_REQUEST",
            EventPayload::ActionResult { .. } => "ACTION_RESULT",
            EventPayload::HookExecutionAudit { .. } => "HOOK_EXECUTION_AUDIT",
            EventPayload::HumanInputRequest { .. } => "HUMAN_INPUT_REQUEST",
            EventPayload::HumanInputReceived { .. } => "HUMAN_INPUT_RECEIVED",
            EventPayload::EngineEnd { .. } => "ENGINE_END",
            EventPayload::Error { .. } => "ERROR",
            EventPayload::SystemMessage { .. } => "SYSTEM_MESSAGE",
        }
    }

    /// Iteration this event belongs to, for cycle-grouped replay
    pub fn iteration(&self) -> Option<u32> {
        match self {
            EventPayload::Thought { iteration, .. }
            | EventPayload::ActionRequest { iteration, .. }
            | EventPayload::ActionResult { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}

/// Execution outcome for tools and hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// Input kind requested by `ask_human`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    Text,
    Password,
    Confirmation,
}

/// On-disk form of `interaction/request.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub input_type: InputType,
    pub sensitive: bool,
}
