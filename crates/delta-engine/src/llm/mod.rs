//! LLM adapter seam.
//!
//! The engine builds an OpenAI-shaped chat-completions request, lets the
//! `pre_llm_request` hook transform the serialized payload, and hands the
//! final JSON to an [`LlmAdapter`]. The adapter is the only component that
//! talks to the network.

mod env;
mod openai;

pub use env::EnvResolver;
pub use openai::OpenAiAdapter;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use delta_types::{ChatMessage, ToolCall, ToolDefinition};

use crate::Result;

/// Chat-completions request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Extra model parameters forwarded verbatim from `agent.yaml`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

/// Normalized adapter response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub model: String,
    pub usage: LlmUsage,
}

impl LlmResponse {
    /// No tool calls left to execute; the loop has nothing to act on.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }

    /// Abnormal finish indication on a final response, e.g. `"length"` when
    /// `max_tokens` cut the answer off mid-sentence. A normal stop (or an
    /// absent finish_reason) returns None. The engine still completes the
    /// run but records the reason in ENGINE_END so callers can tell a
    /// finished answer from a truncated one.
    pub fn truncated_finish(&self) -> Option<&str> {
        if !self.is_final() {
            return None;
        }
        match self.finish_reason.as_deref() {
            None | Some("stop") | Some("tool_calls") => None,
            Some(other) => Some(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Pluggable LLM transport.
///
/// Takes the serialized request (possibly rewritten by a payload-transformer
/// hook) so the file-IPC contract stays byte-faithful.
pub trait LlmAdapter {
    fn invoke(&self, request: &Value) -> Result<LlmResponse>;
}

/// Tool declaration in chat-completions shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    /// Derive the JSON-schema declaration from a normalized tool.
    pub fn from_tool(tool: &ToolDefinition) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &tool.parameters {
            let mut schema = Map::new();
            schema.insert("type".to_string(), json!("string"));
            if let Some(desc) = &param.description {
                schema.insert("description".to_string(), json!(desc));
            }
            if let Some(default) = &param.default {
                schema.insert("default".to_string(), json!(default));
            }
            properties.insert(param.name.clone(), Value::Object(schema));
            if param.required {
                required.push(json!(param.name));
            }
        }

        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }),
            },
        }
    }

    /// Declaration of the built-in `ask_human` tool.
    pub fn ask_human() -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: ToolDefinition::ASK_HUMAN.to_string(),
                description: "Ask the human operator a question and wait for the answer. \
                              Use this when you need information only the user can provide."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": "The question shown to the user"
                        },
                        "input_type": {
                            "type": "string",
                            "enum": ["text", "password", "confirmation"],
                            "default": "text"
                        },
                        "sensitive": {
                            "type": "boolean",
                            "default": false,
                            "description": "Do not record the answer in plain text"
                        }
                    },
                    "required": ["prompt"],
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_types::{InjectAs, ToolParameter, ToolSyntax};

    #[test]
    fn test_tool_spec_schema_shape() {
        let tool = ToolDefinition {
            name: "echo_test".to_string(),
            description: "Echo a message".to_string(),
            argv_template: vec!["echo".to_string(), "${message}".to_string()],
            parameters: vec![ToolParameter {
                name: "message".to_string(),
                inject_as: InjectAs::Argument,
                option_name: None,
                position: Some(0),
                raw: false,
                required: true,
                default: None,
                description: Some("what to echo".to_string()),
            }],
            stdin_param: None,
            syntax: ToolSyntax::Exec,
        };

        let spec = ToolSpec::from_tool(&tool);
        assert_eq!(spec.function.name, "echo_test");
        assert_eq!(spec.function.parameters["properties"]["message"]["type"], "string");
        assert_eq!(spec.function.parameters["required"][0], "message");
    }

    #[test]
    fn test_truncated_finish_detection() {
        let mut response = LlmResponse {
            content: Some("half an answ".to_string()),
            tool_calls: Vec::new(),
            finish_reason: Some("length".to_string()),
            model: "m".to_string(),
            usage: LlmUsage::default(),
        };
        assert!(response.is_final());
        assert_eq!(response.truncated_finish(), Some("length"));

        response.finish_reason = Some("stop".to_string());
        assert_eq!(response.truncated_finish(), None);

        response.finish_reason = None;
        assert_eq!(response.truncated_finish(), None);

        // A response that still has tool calls is not final, whatever the
        // finish_reason says.
        response.finish_reason = Some("length".to_string());
        response.tool_calls = vec![delta_types::ToolCall::function(
            "call_1",
            "echo_test",
            serde_json::json!({}),
        )];
        assert!(!response.is_final());
        assert_eq!(response.truncated_finish(), None);
    }

    #[test]
    fn test_request_serializes_without_empty_tools() {
        let request = LlmRequest {
            model: "gpt-5-mini".to_string(),
            temperature: Some(0.2),
            max_tokens: None,
            extra: Map::new(),
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("max_tokens").is_none());
        assert_eq!(value["temperature"], 0.2);
    }
}
