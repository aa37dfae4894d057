//! Lifecycle Hook Executor.
//!
//! The file layout is the interface: each invocation gets a numbered I/O
//! directory with `input/`, `output/`, and `execution_meta/`. Hooks are
//! arbitrary subprocesses; the engine never interprets their output beyond
//! the two well-known files (`final_payload.json`, `control.json`).

use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use delta_core::{RunPaths, next_numbered_ref};
use delta_types::{ActionStatus, EventPayload, HookPoint, HooksConfig};

use crate::process::{CommandSpec, base_child_env, display_command, run_command};
use crate::Result;

pub struct HookExecutor<'a> {
    hooks: &'a HooksConfig,
    paths: &'a RunPaths,
    agent_root: &'a Path,
    workspace: &'a Path,
}

/// Per-invocation inputs supplied by the engine
#[derive(Debug, Default)]
pub struct HookInvocation {
    pub iteration: u32,
    /// Hook-specific payload embedded in `input/context.json`
    pub payload: Value,
    /// For `pre_llm_request`: the full LLM request under consideration
    pub proposed_payload: Option<Value>,
    /// Hook-specific environment (TOOL_NAME, ERROR_MESSAGE, ...)
    pub extra_env: Vec<(String, String)>,
}

/// What one hook invocation produced
#[derive(Debug)]
pub struct HookOutcome {
    pub point: HookPoint,
    pub io_ref: String,
    pub status: ActionStatus,
    pub duration_ms: u64,
    /// Replacement request from `output/final_payload.json`, when present
    pub final_payload: Option<Value>,
}

impl HookOutcome {
    /// The journal record for this invocation.
    pub fn audit_event(&self) -> EventPayload {
        EventPayload::HookExecutionAudit {
            hook_name: self.point.as_str().to_string(),
            io_path_ref: self.io_ref.clone(),
            status: self.status,
            duration_ms: self.duration_ms,
        }
    }
}

impl<'a> HookExecutor<'a> {
    pub fn new(
        hooks: &'a HooksConfig,
        paths: &'a RunPaths,
        agent_root: &'a Path,
        workspace: &'a Path,
    ) -> Self {
        Self {
            hooks,
            paths,
            agent_root,
            workspace,
        }
    }

    pub fn is_configured(&self, point: HookPoint) -> bool {
        self.hooks.get(point).is_some()
    }

    /// Run one hook point if configured.
    ///
    /// Hook process failure (non-zero exit, timeout, spawn error) is
    /// reported in the outcome, never as `Err`; only engine-side IO
    /// failures writing the audit tree propagate.
    pub fn run(&self, point: HookPoint, invocation: &HookInvocation) -> Result<Option<HookOutcome>> {
        let Some(hook) = self.hooks.get(point) else {
            return Ok(None);
        };

        let hooks_dir = self.paths.hooks_dir();
        std::fs::create_dir_all(&hooks_dir)?;
        let io_ref = next_numbered_ref(&hooks_dir, point.as_str())?;
        let io_dir = hooks_dir.join(&io_ref);
        let input_dir = io_dir.join("input");
        let output_dir = io_dir.join("output");
        let meta_dir = io_dir.join("execution_meta");
        std::fs::create_dir_all(&input_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        std::fs::create_dir_all(&meta_dir)?;

        let envelope = json!({
            "run_id": self.paths.run_id(),
            "iteration": invocation.iteration,
            "hook": point.as_str(),
            "payload": invocation.payload,
        });
        std::fs::write(
            input_dir.join("context.json"),
            serde_json::to_string_pretty(&envelope)?,
        )?;
        if let Some(proposed) = &invocation.proposed_payload {
            std::fs::write(
                input_dir.join("proposed_payload.json"),
                serde_json::to_string_pretty(proposed)?,
            )?;
        }

        let mut env = base_child_env(
            self.paths.run_id(),
            self.agent_root,
            self.workspace,
            &self.paths.journal_path(),
        );
        env.push((
            "DELTA_HOOK_IO_PATH".to_string(),
            io_dir.display().to_string(),
        ));
        env.push((
            "ITERATION_COUNT".to_string(),
            invocation.iteration.to_string(),
        ));
        env.extend(invocation.extra_env.iter().cloned());

        let spec = CommandSpec {
            argv: hook.command.clone(),
            cwd: self.workspace.to_path_buf(),
            env,
            stdin: None,
            timeout: Some(Duration::from_millis(hook.timeout_ms())),
        };

        std::fs::write(meta_dir.join("command.txt"), display_command(&hook.command))?;

        let (status, duration_ms) = match run_command(&spec) {
            Ok(captured) => {
                std::fs::write(meta_dir.join("stdout.log"), &captured.stdout)?;
                std::fs::write(meta_dir.join("stderr.log"), &captured.stderr)?;
                std::fs::write(
                    meta_dir.join("exit_code.txt"),
                    captured
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "killed".to_string()),
                )?;
                std::fs::write(
                    meta_dir.join("duration_ms.txt"),
                    captured.duration.as_millis().to_string(),
                )?;

                if captured.timed_out {
                    warn!(target: "delta::hooks", hook = point.as_str(), "hook timed out");
                }
                let status = if captured.success() {
                    ActionStatus::Success
                } else {
                    ActionStatus::Failed
                };
                (status, captured.duration.as_millis() as u64)
            }
            Err(spawn) => {
                std::fs::write(meta_dir.join("stderr.log"), spawn.to_string())?;
                std::fs::write(meta_dir.join("exit_code.txt"), "spawn-failed")?;
                std::fs::write(meta_dir.join("duration_ms.txt"), "0")?;
                warn!(target: "delta::hooks", hook = point.as_str(), "{}", spawn);
                (ActionStatus::Failed, 0)
            }
        };

        let final_payload = self.read_output_json(&output_dir, "final_payload.json", point);
        if let Some(control) = self.read_output_json(&output_dir, "control.json", point) {
            // Advisory fields reserved for future use.
            debug!(target: "delta::hooks", hook = point.as_str(), control = %control, "hook control output");
        }

        Ok(Some(HookOutcome {
            point,
            io_ref,
            status,
            duration_ms,
            final_payload,
        }))
    }

    fn read_output_json(&self, output_dir: &Path, name: &str, point: HookPoint) -> Option<Value> {
        let path = output_dir.join(name);
        if !path.is_file() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(
                        target: "delta::hooks",
                        hook = point.as_str(),
                        "ignoring malformed {}: {}",
                        name,
                        err
                    );
                    None
                }
            },
            Err(err) => {
                warn!(target: "delta::hooks", hook = point.as_str(), "cannot read {}: {}", name, err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_types::HookCommand;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config(point: HookPoint, argv: &[&str], timeout_ms: Option<u64>) -> HooksConfig {
        let mut hooks = HashMap::new();
        hooks.insert(
            point,
            HookCommand {
                command: argv.iter().map(|s| s.to_string()).collect(),
                description: None,
                timeout_ms,
            },
        );
        HooksConfig { hooks }
    }

    fn setup(temp: &TempDir) -> RunPaths {
        let paths = RunPaths::new(temp.path(), "run1");
        paths.create_audit_dirs().unwrap();
        paths
    }

    #[test]
    fn test_unconfigured_hook_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let hooks = HooksConfig::default();
        let executor = HookExecutor::new(&hooks, &paths, temp.path(), temp.path());

        let outcome = executor
            .run(HookPoint::OnIterationStart, &HookInvocation::default())
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_successful_hook_records_meta() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let hooks = config(
            HookPoint::OnIterationStart,
            &["sh", "-c", "echo started; cat \"$DELTA_HOOK_IO_PATH/input/context.json\" >/dev/null"],
            None,
        );
        let executor = HookExecutor::new(&hooks, &paths, temp.path(), temp.path());

        let outcome = executor
            .run(
                HookPoint::OnIterationStart,
                &HookInvocation {
                    iteration: 2,
                    payload: json!({"note": "x"}),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(outcome.status, ActionStatus::Success);
        assert_eq!(outcome.io_ref, "001_on_iteration_start");
        let meta = paths.hooks_dir().join(&outcome.io_ref).join("execution_meta");
        assert_eq!(
            std::fs::read_to_string(meta.join("exit_code.txt")).unwrap(),
            "0"
        );
        assert!(
            std::fs::read_to_string(meta.join("stdout.log"))
                .unwrap()
                .contains("started")
        );

        let envelope: Value = serde_json::from_str(
            &std::fs::read_to_string(
                paths
                    .hooks_dir()
                    .join(&outcome.io_ref)
                    .join("input/context.json"),
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(envelope["run_id"], "run1");
        assert_eq!(envelope["iteration"], 2);
    }

    #[test]
    fn test_payload_transformer_replaces_request() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let hooks = config(
            HookPoint::PreLlmRequest,
            &[
                "sh",
                "-c",
                "echo '{\"model\":\"rewritten\"}' > \"$DELTA_HOOK_IO_PATH/output/final_payload.json\"",
            ],
            None,
        );
        let executor = HookExecutor::new(&hooks, &paths, temp.path(), temp.path());

        let outcome = executor
            .run(
                HookPoint::PreLlmRequest,
                &HookInvocation {
                    iteration: 1,
                    proposed_payload: Some(json!({"model": "original"})),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(outcome.status, ActionStatus::Success);
        assert_eq!(outcome.final_payload.unwrap()["model"], "rewritten");
        assert!(
            paths
                .hooks_dir()
                .join(&outcome.io_ref)
                .join("input/proposed_payload.json")
                .is_file()
        );
    }

    #[test]
    fn test_failing_hook_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let hooks = config(HookPoint::PostToolExecution, &["sh", "-c", "exit 9"], None);
        let executor = HookExecutor::new(&hooks, &paths, temp.path(), temp.path());

        let outcome = executor
            .run(HookPoint::PostToolExecution, &HookInvocation::default())
            .unwrap()
            .unwrap();
        assert_eq!(outcome.status, ActionStatus::Failed);

        match outcome.audit_event() {
            EventPayload::HookExecutionAudit { status, hook_name, .. } => {
                assert_eq!(status, ActionStatus::Failed);
                assert_eq!(hook_name, "post_tool_execution");
            }
            other => panic!("wrong event: {}", other.kind()),
        }
    }

    #[test]
    fn test_timeout_kills_and_reports_failed() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let hooks = config(HookPoint::OnRunEnd, &["sleep", "30"], Some(100));
        let executor = HookExecutor::new(&hooks, &paths, temp.path(), temp.path());

        let outcome = executor
            .run(HookPoint::OnRunEnd, &HookInvocation::default())
            .unwrap()
            .unwrap();
        assert_eq!(outcome.status, ActionStatus::Failed);
    }

    #[test]
    fn test_io_directories_number_sequentially() {
        let temp = TempDir::new().unwrap();
        let paths = setup(&temp);
        let hooks = config(HookPoint::OnIterationEnd, &["true"], None);
        let executor = HookExecutor::new(&hooks, &paths, temp.path(), temp.path());

        let first = executor
            .run(HookPoint::OnIterationEnd, &HookInvocation::default())
            .unwrap()
            .unwrap();
        let second = executor
            .run(HookPoint::OnIterationEnd, &HookInvocation::default())
            .unwrap()
            .unwrap();
        assert_eq!(first.io_ref, "001_on_iteration_end");
        assert_eq!(second.io_ref, "002_on_iteration_end");
    }
}
