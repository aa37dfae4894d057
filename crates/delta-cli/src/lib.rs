mod args;
mod commands;
mod handlers;
mod logging;
mod output;

pub use args::{Cli, Commands, ListFormat, OutputFormat, ToolCommand};
pub use commands::run;
pub use output::exit_code;

/// Map a failed invocation to the exit-code contract: configuration and
/// permission problems exit 126, everything else exits 1.
pub fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<delta_config::Error>().is_some() {
        return 126;
    }
    if let Some(runtime) = err.downcast_ref::<delta_runtime::Error>() {
        return match runtime {
            delta_runtime::Error::WorkspaceNotWritable(_) => 126,
            _ => 1,
        };
    }
    if let Some(engine) = err.downcast_ref::<delta_engine::Error>() {
        return match engine {
            delta_engine::Error::Config(_) => 126,
            delta_engine::Error::Llm(message) if message.contains("no API key") => 126,
            _ => 1,
        };
    }
    1
}
