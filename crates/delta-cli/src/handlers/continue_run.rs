use std::path::PathBuf;

use anyhow::Result;

use delta_engine::MetadataStore;
use delta_runtime::{GuardDecision, adopt_run, check_run_owner, open_run, resolve_workspace};
use delta_types::RunStatus;

use crate::args::OutputFormat;
use crate::output;

use super::{drive_engine, resolve_agent_root};

#[allow(clippy::too_many_arguments)]
pub fn handle(
    run_id: String,
    work_dir: Option<PathBuf>,
    agent: Option<PathBuf>,
    message: Option<String>,
    max_iterations: Option<u32>,
    verbose: bool,
    interactive: bool,
    force: bool,
    format: OutputFormat,
) -> Result<i32> {
    if max_iterations == Some(0) {
        return Err(delta_config::Error::Validation(
            "--max-iterations must be at least 1".to_string(),
        )
        .into());
    }

    let agent_root_for_lookup = resolve_agent_root(agent.as_deref())?;
    let workspace = resolve_workspace(&agent_root_for_lookup, work_dir.as_deref())?;
    let (paths, mut metadata) = open_run(&workspace, &run_id)?;

    // Janitor: decide what a RUNNING status actually means.
    match check_run_owner(&metadata, force)? {
        GuardDecision::Proceed => {}
        GuardDecision::Reclaim => {
            let mut store = MetadataStore::new(paths.metadata_path());
            store.read()?;
            metadata = store.update(|m| m.transition(RunStatus::Interrupted))?;
            eprintln!("reclaimed orphan run {} (owner process is gone)", run_id);
        }
    }

    let entry_status = metadata.status;
    if matches!(entry_status, RunStatus::Completed | RunStatus::Failed) && message.is_none() {
        return Err(delta_runtime::Error::InvalidOperation(format!(
            "run {} is {}; resuming it requires a new message (-m)",
            run_id, entry_status
        ))
        .into());
    }

    // The agent project may have moved; --agent overrides the recorded home.
    let agent_root = match agent {
        Some(path) => path,
        None => PathBuf::from(&metadata.agent_home),
    };
    let loaded = delta_config::load_agent(&agent_root)?;
    output::print_warnings(&loaded.warnings);

    if let Some(cap) = max_iterations {
        let mut store = MetadataStore::new(paths.metadata_path());
        store.read()?;
        store.update(|m| m.max_iterations = cap)?;
    }
    let metadata = adopt_run(&paths)?;
    let effective_cap = metadata.max_iterations;

    drive_engine(
        &loaded,
        &paths,
        interactive,
        effective_cap,
        verbose,
        true,
        move |engine| {
            match entry_status {
                RunStatus::WaitingForInput => {
                    engine.resolve_pending_interaction(message.as_deref())?;
                }
                RunStatus::Interrupted
                | RunStatus::Completed
                | RunStatus::Failed
                | RunStatus::Running => {
                    if let Some(text) = &message {
                        engine.inject_user_message(text)?;
                    }
                }
            }
            Ok(())
        },
        format,
    )
}
