//! Result formatter: `RunResult` composition, text/json/raw emission, and
//! the exit-code contract.
//!
//! stdout carries only the formatted result; everything else goes to
//! stderr.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use delta_core::RunPaths;
use delta_engine::RunOutcome;
use delta_types::{
    PendingInteraction, RunError, RunMetadata, RunMetrics, RunResult, RunResultMetadata,
    RunStatus, UsageMetrics,
};

use crate::args::OutputFormat;

/// Exit code for a terminal run status.
pub fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Completed => 0,
        RunStatus::Failed => 1,
        RunStatus::WaitingForInput => 101,
        RunStatus::Interrupted => 130,
        // A RUNNING status after loop exit means something went badly wrong.
        RunStatus::Running => 1,
    }
}

/// Compose the schema 2.0 result object from the run's final state.
pub fn build_run_result(
    metadata: &RunMetadata,
    outcome: &RunOutcome,
    usage: &UsageMetrics,
    paths: &RunPaths,
) -> RunResult {
    let end_time = metadata.end_time.unwrap_or(metadata.updated_at);
    let duration_ms = (end_time - metadata.created_at).num_milliseconds().max(0) as u64;

    let mut result = RunResult {
        schema_version: RunResult::SCHEMA_VERSION.to_string(),
        run_id: metadata.run_id.clone(),
        status: metadata.status,
        result: None,
        error: None,
        interaction: None,
        metrics: RunMetrics {
            iterations: metadata.iterations,
            duration_ms,
            start_time: metadata.created_at,
            end_time,
            usage: usage.clone(),
        },
        metadata: RunResultMetadata {
            agent_name: metadata.agent_name.clone(),
            workspace_path: metadata.work_dir.clone(),
        },
    };

    match outcome {
        RunOutcome::Completed {
            result: text,
            hit_iteration_cap,
        } => {
            let mut payload = text.clone().unwrap_or_default();
            if *hit_iteration_cap {
                if !payload.is_empty() {
                    payload.push('\n');
                }
                payload.push_str(&format!(
                    "[Maximum iterations ({}) reached before the agent signaled completion]",
                    metadata.max_iterations
                ));
            }
            result.result = Some(payload);
        }
        RunOutcome::Failed { message } => {
            result.error = Some(RunError {
                message: message.clone(),
                kind: None,
            });
        }
        RunOutcome::WaitingForInput { request } => {
            result.interaction = Some(PendingInteraction {
                request_id: request.request_id.clone(),
                prompt: request.prompt.clone(),
                input_type: request.input_type,
                request_path: paths.interaction_request_path().display().to_string(),
                response_path: paths.interaction_response_path().display().to_string(),
            });
        }
        RunOutcome::Interrupted => {
            result.error = Some(RunError {
                message: "Run interrupted by signal".to_string(),
                kind: Some("interrupted".to_string()),
            });
        }
    }

    result
}

/// Print the result in the requested format and return the exit code.
pub fn emit(result: &RunResult, format: OutputFormat) -> anyhow::Result<i32> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Raw => {
            if result.status == RunStatus::Completed
                && let Some(payload) = &result.result
            {
                println!("{}", payload);
            }
        }
        OutputFormat::Text => emit_text(result),
    }
    Ok(exit_code(result.status))
}

fn emit_text(result: &RunResult) {
    let colored = std::io::stdout().is_terminal();
    let status = result.status.as_str();
    let header = format!(
        "Run {} · {} · {} iteration(s) · {:.1}s",
        result.run_id,
        status,
        result.metrics.iterations,
        result.metrics.duration_ms as f64 / 1000.0
    );
    if colored {
        match result.status {
            RunStatus::Completed => println!("{}", header.green()),
            RunStatus::Failed => println!("{}", header.red()),
            RunStatus::WaitingForInput => println!("{}", header.yellow()),
            _ => println!("{}", header),
        }
    } else {
        println!("{}", header);
    }

    if let Some(payload) = &result.result
        && !payload.is_empty()
    {
        println!();
        println!("{}", payload);
    }
    if let Some(error) = &result.error {
        println!();
        println!("Error: {}", error.message);
    }
    if let Some(interaction) = &result.interaction {
        println!();
        println!("The agent is waiting for input:");
        println!("  {}", interaction.prompt);
        eprintln!();
        eprintln!("Answer by either:");
        eprintln!("  echo 'your answer' > {}", interaction.response_path);
        eprintln!(
            "  delta continue --run-id {}   # picks up response.txt",
            result.run_id
        );
        eprintln!(
            "or: delta continue --run-id {} -m 'your answer'",
            result.run_id
        );
    }

    let usage = &result.metrics.usage;
    if usage.input_tokens > 0 || usage.output_tokens > 0 {
        eprintln!(
            "tokens: {} in / {} out",
            usage.input_tokens, usage.output_tokens
        );
    }
}

/// Print loader warnings the way the engine log is not yet able to.
pub fn print_warnings(warnings: &[String]) {
    let colored = std::io::stderr().is_terminal();
    for warning in warnings {
        if colored {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        } else {
            eprintln!("warning: {}", warning);
        }
    }
}
