use serde::{Deserialize, Serialize};

/// Declarative syntax a tool was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSyntax {
    Exec,
    Shell,
    /// Legacy explicit-argv form
    Command,
}

impl ToolSyntax {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSyntax::Exec => "exec",
            ToolSyntax::Shell => "shell",
            ToolSyntax::Command => "command",
        }
    }
}

/// How a parameter value reaches the child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectAs {
    Argument,
    Stdin,
    Option,
}

/// One entry of a tool's parameter manifest
///
/// The manifest is a flat sequence; `position` is the identity for
/// placeholder-bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub inject_as: InjectAs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Placeholder carried the `:raw` modifier (shell syntax only)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub raw: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalized internal form of a tool definition
///
/// `argv_template` elements may still contain `${name}` markers; they are
/// substituted per element at execution time and never re-parsed, so
/// parameter values cannot introduce new argv words or shell syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub argv_template: Vec<String>,
    pub parameters: Vec<ToolParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_param: Option<String>,
    pub syntax: ToolSyntax,
}

impl ToolDefinition {
    /// Name of the built-in human-in-the-loop tool.
    pub const ASK_HUMAN: &'static str = "ask_human";

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter routed to the child's standard input, if any.
    pub fn stdin_parameter(&self) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.inject_as == InjectAs::Stdin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_flag_omitted_when_false() {
        let param = ToolParameter {
            name: "file".to_string(),
            inject_as: InjectAs::Argument,
            option_name: None,
            position: Some(0),
            raw: false,
            required: true,
            default: None,
            description: None,
        };
        let json = serde_json::to_string(&param).unwrap();
        assert!(!json.contains("\"raw\""));
    }

    #[test]
    fn test_stdin_parameter_lookup() {
        let tool = ToolDefinition {
            name: "write_file".to_string(),
            description: String::new(),
            argv_template: vec!["tee".to_string(), "${path}".to_string()],
            parameters: vec![
                ToolParameter {
                    name: "path".to_string(),
                    inject_as: InjectAs::Argument,
                    option_name: None,
                    position: Some(0),
                    raw: false,
                    required: true,
                    default: None,
                    description: None,
                },
                ToolParameter {
                    name: "content".to_string(),
                    inject_as: InjectAs::Stdin,
                    option_name: None,
                    position: None,
                    raw: false,
                    required: true,
                    default: None,
                    description: None,
                },
            ],
            stdin_param: Some("content".to_string()),
            syntax: ToolSyntax::Exec,
        };

        assert_eq!(tool.stdin_parameter().unwrap().name, "content");
        assert!(tool.parameter("path").is_some());
    }
}
