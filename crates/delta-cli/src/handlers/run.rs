use std::path::PathBuf;

use anyhow::Result;

use delta_runtime::{NewRun, create_run, resolve_workspace};

use crate::args::OutputFormat;
use crate::output;

use super::{drive_engine, resolve_agent_root};

#[allow(clippy::too_many_arguments)]
pub fn handle(
    agent: Option<PathBuf>,
    message: String,
    work_dir: Option<PathBuf>,
    max_iterations: u32,
    verbose: bool,
    interactive: bool,
    _yes: bool,
    run_id: Option<String>,
    format: OutputFormat,
) -> Result<i32> {
    if max_iterations == 0 {
        return Err(delta_config::Error::Validation(
            "--max-iterations must be at least 1".to_string(),
        )
        .into());
    }

    let agent_root = resolve_agent_root(agent.as_deref())?;
    let loaded = delta_config::load_agent(&agent_root)?;
    output::print_warnings(&loaded.warnings);

    let workspace = resolve_workspace(&loaded.agent_root, work_dir.as_deref())?;
    let (paths, _metadata) = create_run(&NewRun {
        agent_root: &loaded.agent_root,
        agent_name: &loaded.config.name,
        workspace: &workspace,
        initial_message: &message,
        max_iterations,
        run_id: run_id.as_deref(),
    })?;

    eprintln!("run id: {}", paths.run_id());

    drive_engine(
        &loaded,
        &paths,
        interactive,
        max_iterations,
        verbose,
        false,
        |_| Ok(()),
        format,
    )
}
