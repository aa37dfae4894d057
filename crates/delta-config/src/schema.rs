use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use delta_types::HooksConfig;

/// Main config document (`agent.yaml`, legacy `config.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub llm: LlmConfig,
    /// Path to the system prompt file, relative to the agent root
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub tools: Vec<RawTool>,
    /// Deprecated inline hooks; `hooks.yaml` supersedes this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_hooks: Option<HooksConfig>,
}

fn default_system_prompt() -> String {
    "system_prompt.md".to_string()
}

/// LLM section of the main config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Forwarded verbatim into the request payload (top_p, seed, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Declarative tool as written in YAML, before expansion
///
/// Exactly one of `exec` / `shell` / `command` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Shorthand: route this parameter to the child's stdin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RawParameter>,
}

/// Explicit `parameters:` block entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_as: Option<delta_types::InjectAs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
}
