use std::path::PathBuf;

use anyhow::Result;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use delta_runtime::{RunFilter, list_runs, resolve_workspace};
use delta_types::{RunMetadata, RunStatus};

use crate::args::ListFormat;

use super::resolve_agent_root;

pub fn handle(
    work_dir: Option<PathBuf>,
    agent: Option<PathBuf>,
    resumable: bool,
    status: Option<String>,
    first: bool,
    format: ListFormat,
) -> Result<i32> {
    let agent_root = resolve_agent_root(agent.as_deref())?;
    let workspace = resolve_workspace(&agent_root, work_dir.as_deref())?;

    let status = status
        .map(|s| {
            s.parse::<RunStatus>()
                .map_err(delta_runtime::Error::InvalidOperation)
        })
        .transpose()?;

    let runs = list_runs(
        &workspace,
        &RunFilter {
            resumable,
            status,
            first,
        },
    )?;

    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        ListFormat::Text => print_table(&runs),
    }
    Ok(0)
}

fn print_table(runs: &[RunMetadata]) {
    if runs.is_empty() {
        eprintln!("no runs found");
        return;
    }

    let colored = std::io::stdout().is_terminal();
    for run in runs {
        let status = if colored {
            match run.status {
                RunStatus::Completed => run.status.as_str().green().to_string(),
                RunStatus::Failed => run.status.as_str().red().to_string(),
                RunStatus::WaitingForInput => run.status.as_str().yellow().to_string(),
                RunStatus::Interrupted => run.status.as_str().cyan().to_string(),
                RunStatus::Running => run.status.as_str().bold().to_string(),
            }
        } else {
            run.status.as_str().to_string()
        };
        println!(
            "{}  {:<18} {:>3} iter  {}  {}",
            run.updated_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            run.iterations,
            run.run_id,
            truncate(&run.initial_message, 48),
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let mut out: String = single_line.chars().take(max).collect();
    out.push('…');
    out
}
