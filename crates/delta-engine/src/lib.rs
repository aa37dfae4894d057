mod context;
mod engine;
mod error;
mod executor;
mod hooks;
pub mod interaction;
mod journal;
mod llm;
mod metadata;
mod process;

pub use context::{ContextBuilder, replay_journal};
pub use engine::{Engine, EngineOptions, RunOutcome};
pub use error::{Error, Result};
pub use executor::{MAX_OBSERVATION_BYTES, ToolExecution, ToolExecutor};
pub use hooks::{HookExecutor, HookInvocation, HookOutcome};
pub use interaction::{AskHumanArgs, HumanInput, TerminalInput};
pub use journal::{Journal, read_events};
pub use llm::{
    EnvResolver, FunctionSpec, LlmAdapter, LlmRequest, LlmResponse, LlmUsage, OpenAiAdapter,
    ToolSpec,
};
pub use metadata::MetadataStore;
pub use process::{CapturedOutput, CommandSpec, base_child_env, display_command, run_command};
