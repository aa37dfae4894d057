use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Engine events a hook can attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Payload transformer: may replace the pending LLM request
    PreLlmRequest,
    PostLlmResponse,
    PreToolExecution,
    PostToolExecution,
    OnError,
    OnRunEnd,
    OnIterationStart,
    OnIterationEnd,
}

impl HookPoint {
    pub const ALL: [HookPoint; 8] = [
        HookPoint::PreLlmRequest,
        HookPoint::PostLlmResponse,
        HookPoint::PreToolExecution,
        HookPoint::PostToolExecution,
        HookPoint::OnError,
        HookPoint::OnRunEnd,
        HookPoint::OnIterationStart,
        HookPoint::OnIterationEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::PreLlmRequest => "pre_llm_request",
            HookPoint::PostLlmResponse => "post_llm_response",
            HookPoint::PreToolExecution => "pre_tool_execution",
            HookPoint::PostToolExecution => "post_tool_execution",
            HookPoint::OnError => "on_error",
            HookPoint::OnRunEnd => "on_run_end",
            HookPoint::OnIterationStart => "on_iteration_start",
            HookPoint::OnIterationEnd => "on_iteration_end",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hook entry of `hooks.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookCommand {
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl HookCommand {
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS)
    }
}

/// Full hook configuration: hook point name -> command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HooksConfig {
    pub hooks: HashMap<HookPoint, HookCommand>,
}

impl HooksConfig {
    pub fn get(&self, point: HookPoint) -> Option<&HookCommand> {
        self.hooks.get(&point)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hooks_yaml_keys_are_hook_points() {
        let yaml = "
pre_llm_request:
  command: [\"python3\", \"hooks/redact.py\"]
  timeout_ms: 5000
on_error:
  command: [\"./hooks/notify.sh\"]
";
        let config: HooksConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.hooks.len(), 2);
        assert_eq!(
            config.get(HookPoint::PreLlmRequest).unwrap().timeout_ms(),
            5000
        );
        assert_eq!(
            config.get(HookPoint::OnError).unwrap().timeout_ms(),
            HookCommand::DEFAULT_TIMEOUT_MS
        );
        assert!(config.get(HookPoint::OnRunEnd).is_none());
    }

    #[test]
    fn test_unknown_hook_point_rejected() {
        let yaml = "
before_everything:
  command: [\"true\"]
";
        assert!(serde_yaml::from_str::<HooksConfig>(yaml).is_err());
    }
}
