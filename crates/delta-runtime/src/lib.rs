mod error;
mod guard;
mod list;
mod run;
mod workspace;

pub use error::{Error, Result};
pub use guard::{GuardDecision, check_run_owner, process_exists};
pub use list::{RunFilter, list_runs};
pub use run::{NewRun, adopt_run, create_run, current_process_name, local_hostname, open_run};
pub use workspace::{create_next_workspace, resolve_workspace, workspace_id};
