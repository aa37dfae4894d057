use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "delta",
    version,
    about = "Run AI agents whose every capability is a command and whose every state is a file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Start a new run",
        long_about = "Start a new run of an agent.

Creates a run directory under the workspace control plane (.delta/<run_id>/)
and drives the Think-Act-Observe loop until the agent finishes, asks a human,
hits the iteration cap, or fails. This command never resumes an existing
run; use 'delta continue' for that."
    )]
    Run {
        #[arg(long, help = "Agent project directory (default: current directory)")]
        agent: Option<PathBuf>,

        #[arg(short, long, help = "Initial user message", value_name = "MSG")]
        message: String,

        #[arg(short = 'w', long = "work-dir", help = "Explicit workspace directory")]
        work_dir: Option<PathBuf>,

        #[arg(
            long,
            default_value = "30",
            help = "Iteration cap for this run (must be at least 1)"
        )]
        max_iterations: u32,

        #[arg(short, long, help = "Verbose: mirror the engine log to stderr")]
        verbose: bool,

        #[arg(
            short,
            long,
            help = "Interactive: ask_human prompts on the terminal instead of pausing the run"
        )]
        interactive: bool,

        #[arg(short = 'y', long = "yes", help = "Skip confirmation prompts")]
        yes: bool,

        #[arg(long, help = "Client-specified run id (unique within the workspace)")]
        run_id: Option<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    #[command(
        about = "Resume an existing run",
        long_about = "Resume a run by id.

Whether -m is required depends on the run's status:
  WAITING_FOR_INPUT  -m supplies the pending answer (optional when
                     interaction/response.txt already exists)
  INTERRUPTED        -m optional; prepended as a new user message
  COMPLETED/FAILED   -m required; starts a new turn on top of the history
  RUNNING            the janitor probes the recorded process and reclaims
                     the run if its owner is gone"
    )]
    Continue {
        #[arg(long, required = true, help = "Run id to resume")]
        run_id: String,

        #[arg(short = 'w', long = "work-dir", help = "Workspace directory containing the run")]
        work_dir: Option<PathBuf>,

        #[arg(long, help = "Agent project directory (default: recorded agent_home)")]
        agent: Option<PathBuf>,

        #[arg(short, long, help = "User message (see long help)", value_name = "MSG")]
        message: Option<String>,

        #[arg(long, help = "Override the iteration cap recorded in metadata")]
        max_iterations: Option<u32>,

        #[arg(short, long, help = "Verbose: mirror the engine log to stderr")]
        verbose: bool,

        #[arg(short, long, help = "Interactive ask_human")]
        interactive: bool,

        #[arg(long, help = "Take over a RUNNING run recorded on another host")]
        force: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    #[command(about = "List runs in a workspace")]
    ListRuns {
        #[arg(short = 'w', long = "work-dir", help = "Workspace directory")]
        work_dir: Option<PathBuf>,

        #[arg(long, help = "Agent project directory (default: current directory)")]
        agent: Option<PathBuf>,

        #[arg(long, help = "Only runs that `delta continue` would accept")]
        resumable: bool,

        #[arg(long, help = "Filter by exact status (e.g. FAILED)")]
        status: Option<String>,

        #[arg(long, help = "Print only the most recent match")]
        first: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    #[command(about = "Tool definition utilities")]
    Tool {
        #[command(subcommand)]
        command: ToolCommand,
    },
}

#[derive(Subcommand)]
pub enum ToolCommand {
    #[command(about = "Print tools from a config file in normalized form")]
    Expand {
        #[arg(help = "YAML file with a tools: list")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary on stdout
    Text,
    /// RunResult JSON on stdout
    Json,
    /// Raw result payload on stdout (empty unless COMPLETED)
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}
