//! Tool Executor.
//!
//! Materializes the argv from a normalized tool template, spawns the child
//! in the workspace, captures everything into `io/tool_executions/`, and
//! assembles the observation shown to the LLM.
//!
//! Non-zero exit is an observation, not an engine error: the LLM sees the
//! failure and reacts. Spawn failure is likewise surfaced as a FAILED
//! observation so a typo'd tool binary does not kill the run.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use delta_core::{RunPaths, next_numbered_ref};
use delta_types::{ActionStatus, InjectAs, ToolDefinition, ToolSyntax};

use crate::process::{CommandSpec, base_child_env, display_command, run_command};
use crate::{Error, Result};

/// Observation size cap; larger tool output is truncated with a notice.
pub const MAX_OBSERVATION_BYTES: usize = 8192;

/// Default wall-clock limit for one tool child
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ToolExecutor<'a> {
    paths: &'a RunPaths,
    agent_root: &'a Path,
    workspace: &'a Path,
}

/// Result of one tool call, ready to journal
#[derive(Debug)]
pub struct ToolExecution {
    pub execution_ref: String,
    pub resolved_command: String,
    pub status: ActionStatus,
    pub observation: String,
    pub exit_code: Option<i32>,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(paths: &'a RunPaths, agent_root: &'a Path, workspace: &'a Path) -> Self {
        Self {
            paths,
            agent_root,
            workspace,
        }
    }

    /// Execute one tool call.
    pub fn execute(&self, tool: &ToolDefinition, args: &Value) -> Result<ToolExecution> {
        let values = resolve_parameter_values(tool, args)?;
        let argv = materialize_argv(tool, &values);
        let stdin = tool
            .stdin_parameter()
            .and_then(|p| values.get(p.name.as_str()).cloned());

        let executions_dir = self.paths.tool_executions_dir();
        std::fs::create_dir_all(&executions_dir)?;
        let execution_ref = next_numbered_ref(&executions_dir, &tool.name)?;
        let exec_dir = executions_dir.join(&execution_ref);
        std::fs::create_dir_all(&exec_dir)?;

        let resolved_command = display_command(&argv);
        std::fs::write(exec_dir.join("command.txt"), &resolved_command)?;

        let spec = CommandSpec {
            argv,
            cwd: self.workspace.to_path_buf(),
            env: base_child_env(
                self.paths.run_id(),
                self.agent_root,
                self.workspace,
                &self.paths.journal_path(),
            ),
            stdin,
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
        };

        match run_command(&spec) {
            Ok(captured) => {
                std::fs::write(exec_dir.join("stdout.log"), &captured.stdout)?;
                std::fs::write(exec_dir.join("stderr.log"), &captured.stderr)?;
                std::fs::write(
                    exec_dir.join("exit_code.txt"),
                    captured
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "killed".to_string()),
                )?;
                std::fs::write(
                    exec_dir.join("duration_ms.txt"),
                    captured.duration.as_millis().to_string(),
                )?;

                let observation = assemble_observation(
                    &captured.stdout,
                    &captured.stderr,
                    captured.exit_code,
                    captured.timed_out,
                );
                Ok(ToolExecution {
                    execution_ref,
                    resolved_command,
                    status: if captured.success() {
                        ActionStatus::Success
                    } else {
                        ActionStatus::Failed
                    },
                    observation,
                    exit_code: captured.exit_code,
                })
            }
            Err(spawn) => {
                std::fs::write(exec_dir.join("stderr.log"), spawn.to_string())?;
                std::fs::write(exec_dir.join("exit_code.txt"), "spawn-failed")?;
                std::fs::write(exec_dir.join("duration_ms.txt"), "0")?;
                Ok(ToolExecution {
                    execution_ref,
                    resolved_command,
                    status: ActionStatus::Failed,
                    observation: format!("Tool could not be started: {}", spawn),
                    exit_code: None,
                })
            }
        }
    }
}

/// Turn the call-site argument object into per-parameter string values,
/// applying defaults and checking required parameters.
fn resolve_parameter_values(
    tool: &ToolDefinition,
    args: &Value,
) -> Result<BTreeMap<String, String>> {
    let empty = serde_json::Map::new();
    let object = args.as_object().unwrap_or(&empty);

    let mut values = BTreeMap::new();
    for param in &tool.parameters {
        match object.get(&param.name) {
            Some(value) => {
                values.insert(param.name.clone(), value_to_string(value));
            }
            None => {
                if let Some(default) = &param.default {
                    values.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(Error::MissingParameter {
                        tool: tool.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
            }
        }
    }
    Ok(values)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the final argv.
///
/// Template elements are substituted per element; for `shell:` tools the
/// values travel as positional argv entries after `--`, never inside the
/// script string.
fn materialize_argv(tool: &ToolDefinition, values: &BTreeMap<String, String>) -> Vec<String> {
    let mut argv: Vec<String> = match tool.syntax {
        ToolSyntax::Shell => tool.argv_template.clone(),
        _ => tool
            .argv_template
            .iter()
            .map(|element| substitute_placeholders(element, values))
            .collect(),
    };

    // Positional values (shell slots and legacy appended arguments), then
    // options.
    let mut positional: Vec<&delta_types::ToolParameter> = tool
        .parameters
        .iter()
        .filter(|p| p.inject_as == InjectAs::Argument && p.position.is_some())
        .collect();
    positional.sort_by_key(|p| p.position);

    match tool.syntax {
        ToolSyntax::Shell => {
            for param in positional {
                if let Some(value) = values.get(&param.name) {
                    argv.push(value.clone());
                }
            }
        }
        ToolSyntax::Command => {
            for param in positional {
                if let Some(value) = values.get(&param.name) {
                    argv.push(value.clone());
                }
            }
            for param in tool
                .parameters
                .iter()
                .filter(|p| p.inject_as == InjectAs::Option)
            {
                if let (Some(option_name), Some(value)) =
                    (&param.option_name, values.get(&param.name))
                {
                    argv.push(option_name.clone());
                    argv.push(value.clone());
                }
            }
        }
        ToolSyntax::Exec => {}
    }

    argv
}

/// Single-pass substitution: text coming from a parameter value is never
/// rescanned, so a value containing `${...}` stays literal.
fn substitute_placeholders(element: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(element.len());
    let mut rest = element;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + end];
                match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + end + 1]),
                }
                rest = &rest[start + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Assemble the observation string with the exit-code marker and the
/// truncation notice.
fn assemble_observation(
    stdout: &str,
    stderr: &str,
    exit_code: Option<i32>,
    timed_out: bool,
) -> String {
    let mut body = String::new();
    body.push_str(stdout);
    if !stderr.trim().is_empty() {
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        body.push_str("[stderr]\n");
        body.push_str(stderr);
    }

    if body.len() > MAX_OBSERVATION_BYTES {
        let mut cut = MAX_OBSERVATION_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("\n[Output truncated]");
    }

    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    match (exit_code, timed_out) {
        (_, true) => body.push_str("=== TIMED OUT ==="),
        (Some(code), _) => body.push_str(&format!("=== EXIT CODE: {} ===", code)),
        (None, _) => body.push_str("=== KILLED ==="),
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_config::{RawTool, expand_tool};
    use serde_json::json;
    use tempfile::TempDir;

    fn expand(name: &str, exec: Option<&str>, shell: Option<&str>) -> ToolDefinition {
        expand_tool(&RawTool {
            name: name.to_string(),
            description: String::new(),
            exec: exec.map(|s| s.to_string()),
            shell: shell.map(|s| s.to_string()),
            command: None,
            stdin: None,
            parameters: Vec::new(),
        })
        .unwrap()
    }

    fn setup(temp: &TempDir) -> RunPaths {
        let paths = RunPaths::new(temp.path(), "run1");
        paths.create_audit_dirs().unwrap();
        paths
    }

    #[test]
    fn test_exec_basic_echo() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("echo_test", Some("echo ${message}"), None);

        let result = executor
            .execute(&tool, &json!({"message": "Hello v1.7!"}))
            .unwrap();
        assert_eq!(result.status, ActionStatus::Success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.observation.starts_with("Hello v1.7!"));
        assert!(result.observation.contains("=== EXIT CODE: 0 ==="));

        let exec_dir = paths.tool_execution_dir(&result.execution_ref);
        assert!(exec_dir.join("command.txt").is_file());
        assert_eq!(
            std::fs::read_to_string(exec_dir.join("stdout.log")).unwrap(),
            "Hello v1.7!\n"
        );
        assert_eq!(
            std::fs::read_to_string(exec_dir.join("exit_code.txt")).unwrap(),
            "0"
        );
    }

    #[test]
    fn test_shell_pipe_counts_lines() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let file = temp.path().join("test-lines.txt");
        std::fs::write(&file, "one\ntwo\nthree\n").unwrap();

        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("count_lines", None, Some("cat ${file} | wc -l"));
        assert_eq!(tool.argv_template[2], "cat \"$1\" | wc -l");

        let result = executor
            .execute(&tool, &json!({"file": file.display().to_string()}))
            .unwrap();
        assert_eq!(result.status, ActionStatus::Success);
        let count = result
            .observation
            .lines()
            .next()
            .unwrap()
            .trim()
            .to_string();
        assert_eq!(count, "3");
    }

    #[test]
    fn test_injection_defense_exec() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let marker = temp.path().join("marker.txt");
        std::fs::write(&marker, "still here").unwrap();

        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("echo_input", Some("echo ${input}"), None);

        let malicious = format!("; rm -rf {}", marker.display());
        let result = executor.execute(&tool, &json!({"input": malicious})).unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(result.observation.contains("; rm -rf"));
        assert!(marker.exists());
    }

    #[test]
    fn test_injection_defense_shell() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let marker = temp.path().join("marker.txt");
        std::fs::write(&marker, "still here").unwrap();

        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("echo_input", None, Some("echo ${input}"));
        assert_eq!(tool.argv_template, vec!["sh", "-c", "echo \"$1\"", "--"]);

        let malicious = format!("; rm -rf {}", marker.display());
        let result = executor.execute(&tool, &json!({"input": malicious})).unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(result.observation.contains("; rm -rf"));
        assert!(marker.exists());
    }

    #[test]
    fn test_stdin_parameter_piped() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());

        let tool = expand_tool(&RawTool {
            name: "write_note".to_string(),
            description: String::new(),
            exec: Some("tee ${path}".to_string()),
            shell: None,
            command: None,
            stdin: Some("content".to_string()),
            parameters: Vec::new(),
        })
        .unwrap();

        let result = executor
            .execute(
                &tool,
                &json!({"path": "note.txt", "content": "from stdin"}),
            )
            .unwrap();
        assert_eq!(result.status, ActionStatus::Success);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("note.txt")).unwrap(),
            "from stdin"
        );
    }

    #[test]
    fn test_command_syntax_appends_options() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());

        let tool = expand_tool(&RawTool {
            name: "probe".to_string(),
            description: String::new(),
            exec: None,
            shell: None,
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "printf '%s|%s|%s' \"$0\" \"$1\" \"$2\"".to_string(),
            ]),
            stdin: None,
            parameters: vec![
                delta_config::RawParameter {
                    name: "target".to_string(),
                    description: None,
                    default: None,
                    required: None,
                    inject_as: Some(InjectAs::Argument),
                    option_name: None,
                    position: None,
                    raw: None,
                },
                delta_config::RawParameter {
                    name: "depth".to_string(),
                    description: None,
                    default: Some("2".to_string()),
                    required: None,
                    inject_as: Some(InjectAs::Option),
                    option_name: Some("--depth".to_string()),
                    position: None,
                    raw: None,
                },
            ],
        })
        .unwrap();

        let result = executor.execute(&tool, &json!({"target": "host9"})).unwrap();
        // sh -c script receives: $0=host9, $1=--depth, $2=2
        assert!(result.observation.starts_with("host9|--depth|2"));
    }

    #[test]
    fn test_missing_required_parameter() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("echo_test", Some("echo ${message}"), None);

        assert!(matches!(
            executor.execute(&tool, &json!({})),
            Err(Error::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_spawn_failure_becomes_failed_observation() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("ghost", Some("no-such-binary-zzz ${x}"), None);

        let result = executor.execute(&tool, &json!({"x": "1"})).unwrap();
        assert_eq!(result.status, ActionStatus::Failed);
        assert!(result.observation.contains("could not be started"));
        assert_eq!(result.exit_code, None);
    }

    #[test]
    fn test_observation_truncation() {
        let long = "x".repeat(MAX_OBSERVATION_BYTES * 2);
        let observation = assemble_observation(&long, "", Some(0), false);
        assert!(observation.len() < MAX_OBSERVATION_BYTES + 100);
        assert!(observation.contains("[Output truncated]"));
        assert!(observation.ends_with("=== EXIT CODE: 0 ==="));
    }

    #[test]
    fn test_nonzero_exit_is_failed_observation() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let executor = ToolExecutor::new(&paths, temp.path(), temp.path());
        let tool = expand("fail", None, Some("echo oops >&2; exit 4; ignore ${x}"));

        let result = executor.execute(&tool, &json!({"x": "1"})).unwrap();
        assert_eq!(result.status, ActionStatus::Failed);
        assert_eq!(result.exit_code, Some(4));
        assert!(result.observation.contains("[stderr]"));
        assert!(result.observation.contains("oops"));
        assert!(result.observation.contains("=== EXIT CODE: 4 ==="));
    }
}
