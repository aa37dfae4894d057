pub mod continue_run;
pub mod list_runs;
pub mod run;
pub mod tool_expand;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;

use delta_config::LoadedAgent;
use delta_core::RunPaths;
use delta_engine::{Engine, EnvResolver, OpenAiAdapter, RunOutcome};
use delta_engine::MetadataStore;
use delta_types::UsageMetrics;

use crate::args::OutputFormat;
use crate::output;

/// Agent root: explicit flag or the current directory.
pub(crate) fn resolve_agent_root(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(std::env::current_dir()?),
    }
}

/// Install the SIGINT/SIGTERM trap: first signal requests a graceful stop,
/// a second one force-quits with the interruption exit code.
pub(crate) fn install_signal_handler() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let seen = AtomicUsize::new(0);
    let inner = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            inner.store(true, Ordering::SeqCst);
            eprintln!("\nInterrupt received; finishing the current step (press again to force quit)");
        } else {
            std::process::exit(130);
        }
    })?;
    Ok(flag)
}

/// Build the LLM adapter from the `.env` resolution chain.
pub(crate) fn make_adapter(workspace: &Path, agent_root: &Path) -> Result<OpenAiAdapter> {
    let resolver = EnvResolver::load(workspace, agent_root);
    Ok(OpenAiAdapter::from_env(&resolver)?)
}

/// Shared tail of `run` and `continue`: read the final metadata, format the
/// result, map to the exit code.
pub(crate) fn finish(
    paths: &RunPaths,
    outcome: &RunOutcome,
    usage: &UsageMetrics,
    format: OutputFormat,
) -> Result<i32> {
    let mut store = MetadataStore::new(paths.metadata_path());
    let metadata = store.read()?;
    let result = output::build_run_result(&metadata, outcome, usage, paths);
    output::emit(&result, format)
}

/// Engine entry shared by `run` and `continue`.
pub(crate) fn drive_engine(
    agent: &LoadedAgent,
    paths: &RunPaths,
    interactive: bool,
    max_iterations: u32,
    verbose: bool,
    resumed: bool,
    prepare: impl FnOnce(&mut Engine<'_>) -> Result<()>,
    format: OutputFormat,
) -> Result<i32> {
    crate::logging::init_run_logging(&paths.engine_log_path(), verbose)?;

    let adapter = make_adapter(paths.work_dir(), &agent.agent_root)?;
    let interrupt = install_signal_handler()?;

    let mut engine = Engine::new(
        agent,
        paths.clone(),
        Box::new(adapter),
        interrupt,
        delta_engine::EngineOptions {
            interactive,
            max_iterations,
        },
    )?;
    prepare(&mut engine)?;

    let outcome = engine.run(resumed)?;
    let usage = engine.usage().clone();
    finish(paths, &outcome, &usage, format)
}
