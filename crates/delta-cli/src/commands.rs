use anyhow::Result;

use super::args::{Cli, Commands, ToolCommand};
use super::handlers;

/// Dispatch one CLI invocation and return the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            agent,
            message,
            work_dir,
            max_iterations,
            verbose,
            interactive,
            yes,
            run_id,
            format,
        } => handlers::run::handle(
            agent,
            message,
            work_dir,
            max_iterations,
            verbose,
            interactive,
            yes,
            run_id,
            format,
        ),

        Commands::Continue {
            run_id,
            work_dir,
            agent,
            message,
            max_iterations,
            verbose,
            interactive,
            force,
            format,
        } => handlers::continue_run::handle(
            run_id,
            work_dir,
            agent,
            message,
            max_iterations,
            verbose,
            interactive,
            force,
            format,
        ),

        Commands::ListRuns {
            work_dir,
            agent,
            resumable,
            status,
            first,
            format,
        } => handlers::list_runs::handle(work_dir, agent, resumable, status, first, format),

        Commands::Tool { command } => match command {
            ToolCommand::Expand { path } => handlers::tool_expand::handle(path),
        },
    }
}
