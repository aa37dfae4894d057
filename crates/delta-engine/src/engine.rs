//! The Think-Act-Observe loop.
//!
//! One `Engine` drives one run (or one resumed entry into a run). Every
//! iteration is a pure function of the journal, the workspace, and the
//! config: context is rebuilt from disk each time, and nothing is cached
//! across iterations.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use delta_config::LoadedAgent;
use delta_core::RunPaths;
use delta_types::{
    ActionStatus, EventPayload, InteractionRequest, RunStatus, ToolCall, ToolDefinition,
    UsageMetrics,
};

use crate::context::ContextBuilder;
use crate::executor::ToolExecutor;
use crate::hooks::{HookExecutor, HookInvocation, HookOutcome};
use crate::interaction::{self, AskHumanArgs, HumanInput, TerminalInput};
use crate::journal::Journal;
use crate::llm::{LlmAdapter, LlmRequest, LlmResponse, ToolSpec};
use crate::metadata::MetadataStore;
use crate::{Error, Result};

/// Knobs for one engine entry
pub struct EngineOptions {
    /// `-i`: ask_human prompts on the terminal instead of parking the run
    pub interactive: bool,
    pub max_iterations: u32,
}

/// How one engine entry ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        result: Option<String>,
        hit_iteration_cap: bool,
    },
    Failed {
        message: String,
    },
    WaitingForInput {
        request: InteractionRequest,
    },
    Interrupted,
}

pub struct Engine<'a> {
    agent: &'a LoadedAgent,
    paths: RunPaths,
    workspace: PathBuf,
    journal: Journal,
    metadata: MetadataStore,
    adapter: Box<dyn LlmAdapter + 'a>,
    human_input: Box<dyn HumanInput + 'a>,
    interrupt: Arc<AtomicBool>,
    options: EngineOptions,
    usage: UsageMetrics,
}

impl<'a> Engine<'a> {
    pub fn new(
        agent: &'a LoadedAgent,
        paths: RunPaths,
        adapter: Box<dyn LlmAdapter + 'a>,
        interrupt: Arc<AtomicBool>,
        options: EngineOptions,
    ) -> Result<Self> {
        let journal = Journal::open(&paths.journal_path())?;
        let metadata = MetadataStore::new(paths.metadata_path());
        let workspace = paths.work_dir().to_path_buf();
        Ok(Self {
            agent,
            paths,
            workspace,
            journal,
            metadata,
            adapter,
            human_input: Box::new(TerminalInput),
            interrupt,
            options,
            usage: UsageMetrics::default(),
        })
    }

    /// Replace the interactive answer source (used by tests).
    pub fn with_human_input(mut self, input: Box<dyn HumanInput + 'a>) -> Self {
        self.human_input = input;
        self
    }

    pub fn usage(&self) -> &UsageMetrics {
        &self.usage
    }

    /// Journal a user message injected by a resume (`-m` on a finished or
    /// interrupted run).
    pub fn inject_user_message(&mut self, content: &str) -> Result<()> {
        self.journal.append(EventPayload::SystemMessage {
            content: content.to_string(),
        })?;
        self.journal.sync()?;
        Ok(())
    }

    /// Consume the pending async `ask_human`: read `response.txt` (or take
    /// the `-m` text), journal the reception and the matching
    /// ACTION_RESULT, delete both interaction files.
    pub fn resolve_pending_interaction(&mut self, message: Option<&str>) -> Result<()> {
        let events = self.journal.read_all()?;
        let pending = find_pending_interaction(&events).ok_or_else(|| {
            Error::Interaction("run is WAITING_FOR_INPUT but has no pending request".to_string())
        })?;

        let content = match interaction::read_response(&self.paths)? {
            Some(content) => content,
            None => message
                .map(|m| m.to_string())
                .ok_or_else(|| {
                    Error::Interaction(
                        "no interaction/response.txt found; provide the answer with -m".to_string(),
                    )
                })?,
        };

        self.journal.append(EventPayload::HumanInputReceived {
            request_id: pending.request_id.clone(),
            content: if pending.sensitive {
                "[sensitive]".to_string()
            } else {
                content.clone()
            },
        })?;
        self.journal.append(EventPayload::ActionResult {
            iteration: pending.iteration,
            action_id: pending.request_id.clone(),
            execution_ref: "interaction".to_string(),
            status: ActionStatus::Success,
            observation_content: content,
            exit_code: None,
        })?;
        self.journal.sync()?;
        interaction::clear(&self.paths)?;

        self.metadata.read()?;
        self.metadata
            .update(|m| m.transition(RunStatus::Running))?;
        Ok(())
    }

    /// Drive the loop until a terminal condition.
    pub fn run(&mut self, resumed: bool) -> Result<RunOutcome> {
        // Executors borrow locals (and the 'a agent), never `self`, so the
        // journal and metadata stay mutably accessible below.
        let agent = self.agent;
        let paths = self.paths.clone();
        let workspace = self.workspace.clone();
        let hooks = HookExecutor::new(&agent.hooks, &paths, &agent.agent_root, &workspace);
        let tools = ToolExecutor::new(&paths, &agent.agent_root, &workspace);
        let builder = ContextBuilder::new(&agent.manifest, &agent.agent_root, &workspace, &paths);

        let mut meta = self.metadata.read()?;
        self.journal.append(EventPayload::EngineStart {
            run_id: meta.run_id.clone(),
            agent_name: meta.agent_name.clone(),
            initial_message: meta.initial_message.clone(),
            resumed,
        })?;
        self.journal.sync()?;
        info!(target: "delta::engine", run_id = %meta.run_id, resumed, "engine start");

        let mut last_content: Option<String> = None;

        loop {
            if meta.iterations >= self.options.max_iterations {
                return self.finish_capped(&hooks);
            }
            if self.interrupted() {
                return self.finish_interrupted(&hooks);
            }

            let iteration = meta.iterations + 1;
            debug!(target: "delta::engine", iteration, "iteration start");
            self.run_hook(
                &hooks,
                delta_types::HookPoint::OnIterationStart,
                HookInvocation {
                    iteration,
                    ..Default::default()
                },
            )?;

            // Think
            let events = self.journal.read_all()?;
            let messages = builder.build(&events)?;
            let request = LlmRequest {
                model: self.agent.config.llm.model.clone(),
                temperature: self.agent.config.llm.temperature,
                max_tokens: self.agent.config.llm.max_tokens,
                extra: self
                    .agent
                    .config
                    .llm
                    .extra
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                messages,
                tools: self.tool_specs(),
            };
            let mut request_value = serde_json::to_value(&request)?;

            if let Some(outcome) = self.run_hook(
                &hooks,
                delta_types::HookPoint::PreLlmRequest,
                HookInvocation {
                    iteration,
                    proposed_payload: Some(request_value.clone()),
                    ..Default::default()
                },
            )? && outcome.status == ActionStatus::Success
                && let Some(replacement) = outcome.final_payload
            {
                info!(target: "delta::engine", iteration, "pre_llm_request hook replaced the payload");
                request_value = replacement;
            }

            let invocation_ref = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), iteration);
            let invocation_dir = self.paths.invocation_dir(&invocation_ref);
            std::fs::create_dir_all(&invocation_dir)?;
            std::fs::write(
                invocation_dir.join("request.json"),
                serde_json::to_string_pretty(&request_value)?,
            )?;

            let started = std::time::Instant::now();
            let response = match self.adapter.invoke(&request_value) {
                Ok(response) => response,
                Err(err) => return self.finish_failed(&hooks, iteration, err),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            std::fs::write(
                invocation_dir.join("response.json"),
                serde_json::to_string_pretty(&response_json(&response))?,
            )?;
            std::fs::write(
                invocation_dir.join("metadata.json"),
                serde_json::to_string_pretty(&json!({
                    "model": response.model,
                    "duration_ms": duration_ms,
                    "finish_reason": response.finish_reason,
                    "usage": response.usage,
                }))?,
            )?;

            let model = if response.model.is_empty() {
                self.agent.config.llm.model.clone()
            } else {
                response.model.clone()
            };
            self.usage.record(
                &model,
                response.usage.prompt_tokens,
                response.usage.completion_tokens,
            );

            self.journal.append(EventPayload::Thought {
                iteration,
                llm_invocation_ref: invocation_ref.clone(),
                content: response.content.clone().unwrap_or_default(),
            })?;
            if let Some(content) = &response.content
                && !content.is_empty()
            {
                last_content = Some(content.clone());
            }

            self.run_hook(
                &hooks,
                delta_types::HookPoint::PostLlmResponse,
                HookInvocation {
                    iteration,
                    payload: response_json(&response),
                    ..Default::default()
                },
            )?;

            // Completion: no tool call and a finish indication.
            if response.is_final() {
                let finish_note = response.truncated_finish().map(|reason| {
                    warn!(
                        target: "delta::engine",
                        iteration,
                        finish_reason = reason,
                        "model stopped abnormally before signaling completion"
                    );
                    format!(
                        "Model stopped with finish_reason {:?} before signaling completion; the answer may be truncated",
                        reason
                    )
                });
                return self.finish_completed(&hooks, iteration, last_content, finish_note);
            }

            // Act + Observe
            for call in &response.tool_calls {
                if call.function.name == ToolDefinition::ASK_HUMAN {
                    match self.handle_ask_human(iteration, call)? {
                        AskHumanFlow::Answered => {}
                        AskHumanFlow::Parked(request) => {
                            self.journal.sync()?;
                            return Ok(RunOutcome::WaitingForInput { request });
                        }
                    }
                    continue;
                }
                self.execute_tool_call(&hooks, &tools, iteration, call)?;
                if self.interrupted() {
                    return self.finish_interrupted(&hooks);
                }
            }

            self.run_hook(
                &hooks,
                delta_types::HookPoint::OnIterationEnd,
                HookInvocation {
                    iteration,
                    ..Default::default()
                },
            )?;

            meta = self.metadata.update(|m| m.iterations = iteration)?;
            self.journal.sync()?;
        }
    }

    // --- tool calls ---

    fn execute_tool_call(
        &mut self,
        hooks: &HookExecutor<'_>,
        tools: &ToolExecutor<'_>,
        iteration: u32,
        call: &ToolCall,
    ) -> Result<()> {
        let tool_args = call
            .parsed_arguments()
            .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));

        let Some(tool) = self
            .agent
            .tools
            .iter()
            .find(|t| t.name == call.function.name)
        else {
            warn!(target: "delta::engine", tool = %call.function.name, "unknown tool requested");
            self.journal.append(EventPayload::ActionRequest {
                iteration,
                action_id: call.id.clone(),
                tool_name: call.function.name.clone(),
                tool_args,
                resolved_command: String::new(),
            })?;
            self.journal.append(EventPayload::ActionResult {
                iteration,
                action_id: call.id.clone(),
                execution_ref: "unresolved".to_string(),
                status: ActionStatus::Failed,
                observation_content: format!(
                    "Unknown tool {:?}; available tools: {}",
                    call.function.name,
                    self.agent
                        .tools
                        .iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                exit_code: None,
            })?;
            return Ok(());
        };

        self.run_hook(
            hooks,
            delta_types::HookPoint::PreToolExecution,
            HookInvocation {
                iteration,
                payload: json!({"tool_name": tool.name, "tool_args": tool_args}),
                extra_env: vec![("TOOL_NAME".to_string(), tool.name.clone())],
                ..Default::default()
            },
        )?;

        let execution = match tools.execute(tool, &tool_args) {
            Ok(execution) => execution,
            Err(Error::MissingParameter { tool, parameter }) => {
                // Bad arguments from the LLM are an observation, not a
                // crash.
                self.journal.append(EventPayload::ActionRequest {
                    iteration,
                    action_id: call.id.clone(),
                    tool_name: call.function.name.clone(),
                    tool_args: tool_args.clone(),
                    resolved_command: String::new(),
                })?;
                self.journal.append(EventPayload::ActionResult {
                    iteration,
                    action_id: call.id.clone(),
                    execution_ref: "unresolved".to_string(),
                    status: ActionStatus::Failed,
                    observation_content: format!(
                        "Missing required parameter {:?} for tool {:?}",
                        parameter, tool
                    ),
                    exit_code: None,
                })?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        self.journal.append(EventPayload::ActionRequest {
            iteration,
            action_id: call.id.clone(),
            tool_name: tool.name.clone(),
            tool_args: tool_args.clone(),
            resolved_command: execution.resolved_command.clone(),
        })?;
        self.journal.append(EventPayload::ActionResult {
            iteration,
            action_id: call.id.clone(),
            execution_ref: execution.execution_ref.clone(),
            status: execution.status,
            observation_content: execution.observation.clone(),
            exit_code: execution.exit_code,
        })?;

        self.run_hook(
            hooks,
            delta_types::HookPoint::PostToolExecution,
            HookInvocation {
                iteration,
                payload: json!({
                    "tool_name": tool.name,
                    "status": execution.status,
                    "exit_code": execution.exit_code,
                }),
                extra_env: vec![
                    ("TOOL_NAME".to_string(), tool.name.clone()),
                    ("TOOL_RESULT".to_string(), execution.observation.clone()),
                ],
                ..Default::default()
            },
        )?;
        Ok(())
    }

    // --- ask_human ---

    fn handle_ask_human(&mut self, iteration: u32, call: &ToolCall) -> Result<AskHumanFlow> {
        let args = AskHumanArgs::parse(&call.parsed_arguments().unwrap_or(Value::Null))?;
        let request = InteractionRequest {
            request_id: call.id.clone(),
            timestamp: Utc::now(),
            prompt: args.prompt.clone(),
            input_type: args.input_type,
            sensitive: args.sensitive,
        };

        self.journal.append(EventPayload::ActionRequest {
            iteration,
            action_id: call.id.clone(),
            tool_name: ToolDefinition::ASK_HUMAN.to_string(),
            tool_args: json!({
                "prompt": args.prompt,
                "input_type": args.input_type,
                "sensitive": args.sensitive,
            }),
            resolved_command: ToolDefinition::ASK_HUMAN.to_string(),
        })?;

        if self.options.interactive {
            let answer = self
                .human_input
                .ask(&request)
                .map_err(|err| Error::Interaction(format!("failed to read answer: {}", err)))?;
            self.journal.append(EventPayload::ActionResult {
                iteration,
                action_id: call.id.clone(),
                execution_ref: "interaction".to_string(),
                status: ActionStatus::Success,
                observation_content: answer,
                exit_code: None,
            })?;
            return Ok(AskHumanFlow::Answered);
        }

        interaction::write_request(&self.paths, &request)?;
        self.journal.append(EventPayload::HumanInputRequest {
            request_id: request.request_id.clone(),
            prompt: request.prompt.clone(),
            input_type: request.input_type,
            sensitive: request.sensitive,
        })?;
        // The parked iteration completed its THOUGHT; count it so resume
        // numbers the next one correctly.
        self.metadata.update(|m| {
            m.iterations = iteration;
            m.transition(RunStatus::WaitingForInput);
        })?;
        info!(target: "delta::engine", request_id = %request.request_id, "parked for human input");
        Ok(AskHumanFlow::Parked(request))
    }

    // --- terminal transitions ---

    fn finish_completed(
        &mut self,
        hooks: &HookExecutor<'_>,
        iteration: u32,
        result: Option<String>,
        finish_note: Option<String>,
    ) -> Result<RunOutcome> {
        self.journal.append(EventPayload::EngineEnd {
            status: RunStatus::Completed,
            message: finish_note,
        })?;
        self.run_hook_best_effort(hooks, delta_types::HookPoint::OnRunEnd, iteration);
        self.metadata.update(|m| {
            m.iterations = iteration;
            m.transition(RunStatus::Completed);
        })?;
        self.journal.sync()?;
        info!(target: "delta::engine", iteration, "run completed");
        Ok(RunOutcome::Completed {
            result,
            hit_iteration_cap: false,
        })
    }

    fn finish_capped(&mut self, hooks: &HookExecutor<'_>) -> Result<RunOutcome> {
        let cap = self.options.max_iterations;
        self.journal.append(EventPayload::EngineEnd {
            status: RunStatus::Completed,
            message: Some(format!("Maximum iterations ({}) reached", cap)),
        })?;
        self.run_hook_best_effort(hooks, delta_types::HookPoint::OnRunEnd, cap);
        self.metadata
            .update(|m| m.transition(RunStatus::Completed))?;
        self.journal.sync()?;
        warn!(target: "delta::engine", cap, "iteration cap reached");
        Ok(RunOutcome::Completed {
            result: None,
            hit_iteration_cap: true,
        })
    }

    fn finish_interrupted(&mut self, hooks: &HookExecutor<'_>) -> Result<RunOutcome> {
        self.journal.append(EventPayload::EngineEnd {
            status: RunStatus::Interrupted,
            message: Some("Interrupted by signal".to_string()),
        })?;
        self.run_hook_best_effort(hooks, delta_types::HookPoint::OnRunEnd, 0);
        self.metadata
            .update(|m| m.transition(RunStatus::Interrupted))?;
        self.journal.sync()?;
        info!(target: "delta::engine", "run interrupted");
        Ok(RunOutcome::Interrupted)
    }

    /// Fatal path: ERROR event, on_error hook, ENGINE_END. The metadata and
    /// the journal terminator are written even when the hook misbehaves.
    fn finish_failed(
        &mut self,
        hooks: &HookExecutor<'_>,
        iteration: u32,
        err: Error,
    ) -> Result<RunOutcome> {
        let message = err.to_string();
        error!(target: "delta::engine", iteration, "fatal: {}", message);

        self.journal.append(EventPayload::Error {
            message: message.clone(),
            context: Some(json!({"iteration": iteration})),
        })?;

        let invocation = HookInvocation {
            iteration,
            payload: json!({"error": message}),
            extra_env: vec![("ERROR_MESSAGE".to_string(), message.clone())],
            ..Default::default()
        };
        match hooks.run(delta_types::HookPoint::OnError, &invocation) {
            Ok(Some(outcome)) => {
                let _ = self.journal.append(outcome.audit_event());
            }
            Ok(None) => {}
            Err(hook_err) => {
                warn!(target: "delta::engine", "on_error hook failed: {}", hook_err);
            }
        }

        self.journal.append(EventPayload::EngineEnd {
            status: RunStatus::Failed,
            message: Some(message.clone()),
        })?;
        self.metadata.update(|m| {
            m.error = Some(message.clone());
            m.transition(RunStatus::Failed);
        })?;
        self.journal.sync()?;
        Ok(RunOutcome::Failed { message })
    }

    // --- helpers ---

    fn tool_specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.agent.tools.iter().map(ToolSpec::from_tool).collect();
        specs.push(ToolSpec::ask_human());
        specs
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    fn run_hook(
        &mut self,
        hooks: &HookExecutor<'_>,
        point: delta_types::HookPoint,
        invocation: HookInvocation,
    ) -> Result<Option<HookOutcome>> {
        match hooks.run(point, &invocation)? {
            Some(outcome) => {
                self.journal.append(outcome.audit_event())?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Variant for terminal paths where a hook failure must not mask the
    /// transition.
    fn run_hook_best_effort(
        &mut self,
        hooks: &HookExecutor<'_>,
        point: delta_types::HookPoint,
        iteration: u32,
    ) {
        let invocation = HookInvocation {
            iteration,
            ..Default::default()
        };
        match hooks.run(point, &invocation) {
            Ok(Some(outcome)) => {
                let _ = self.journal.append(outcome.audit_event());
            }
            Ok(None) => {}
            Err(err) => warn!(target: "delta::engine", hook = point.as_str(), "hook failed: {}", err),
        }
    }
}

enum AskHumanFlow {
    Answered,
    Parked(InteractionRequest),
}

/// The pending ask_human of a WAITING_FOR_INPUT run, reconstructed from the
/// journal.
struct PendingInteraction {
    request_id: String,
    iteration: u32,
    sensitive: bool,
}

fn find_pending_interaction(
    events: &[delta_types::JournalEvent],
) -> Option<PendingInteraction> {
    let mut pending: Option<PendingInteraction> = None;
    for event in events {
        match &event.payload {
            EventPayload::ActionRequest {
                iteration,
                action_id,
                tool_name,
                ..
            } if tool_name == ToolDefinition::ASK_HUMAN => {
                pending = Some(PendingInteraction {
                    request_id: action_id.clone(),
                    iteration: *iteration,
                    sensitive: false,
                });
            }
            EventPayload::HumanInputRequest {
                request_id,
                sensitive,
                ..
            } => {
                if let Some(p) = &mut pending
                    && p.request_id == *request_id
                {
                    p.sensitive = *sensitive;
                }
            }
            EventPayload::ActionResult { action_id, .. } => {
                if pending
                    .as_ref()
                    .is_some_and(|p| p.request_id == *action_id)
                {
                    pending = None;
                }
            }
            _ => {}
        }
    }
    pending
}

fn response_json(response: &LlmResponse) -> Value {
    json!({
        "content": response.content,
        "tool_calls": response.tool_calls,
        "finish_reason": response.finish_reason,
        "model": response.model,
    })
}
