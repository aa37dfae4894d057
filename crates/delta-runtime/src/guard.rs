//! Concurrency guard and janitor.
//!
//! A run left in RUNNING has one of three explanations: its process is
//! alive, its process died without the terminal transition (orphan), or the
//! pid was recycled by an unrelated process. The janitor distinguishes them
//! with a no-op signal probe plus a process-name comparison, and reclaims
//! orphans to INTERRUPTED.

use tracing::{info, warn};

use delta_types::{RunMetadata, RunStatus};

use crate::run::local_hostname;
use crate::{Error, Result};

/// What `continue` should do with a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Status is resumable as-is
    Proceed,
    /// Status was RUNNING but the owner is gone; mark INTERRUPTED and resume
    Reclaim,
}

/// Gate a `continue` on the recorded owner of the run.
pub fn check_run_owner(metadata: &RunMetadata, force: bool) -> Result<GuardDecision> {
    if metadata.status != RunStatus::Running {
        return Ok(GuardDecision::Proceed);
    }

    let local = local_hostname();
    if metadata.hostname != local {
        if force {
            warn!(
                target: "delta::guard",
                run_id = %metadata.run_id,
                recorded = %metadata.hostname,
                "--force: taking over a run recorded on another host"
            );
            return Ok(GuardDecision::Reclaim);
        }
        return Err(Error::CrossHostRunning {
            run_id: metadata.run_id.clone(),
            hostname: metadata.hostname.clone(),
        });
    }

    if !process_exists(metadata.pid) {
        info!(
            target: "delta::guard",
            run_id = %metadata.run_id,
            pid = metadata.pid,
            "owner process is gone; reclaiming orphan run"
        );
        return Ok(GuardDecision::Reclaim);
    }

    match process_name(metadata.pid) {
        Some(name) if !names_match(&name, &metadata.process_name) => {
            info!(
                target: "delta::guard",
                run_id = %metadata.run_id,
                pid = metadata.pid,
                found = %name,
                "pid was recycled by an unrelated process; reclaiming"
            );
            Ok(GuardDecision::Reclaim)
        }
        _ => Err(Error::RunStillActive {
            run_id: metadata.run_id.clone(),
            pid: metadata.pid,
        }),
    }
}

/// Recorded names can be truncated (the kernel caps comm at 15 bytes), so
/// compare on the shorter prefix.
fn names_match(observed: &str, recorded: &str) -> bool {
    let observed = observed.trim();
    let recorded = recorded.trim();
    if observed.is_empty() || recorded.is_empty() {
        return true;
    }
    observed.starts_with(recorded) || recorded.starts_with(observed)
}

/// No-op signal probe.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    // kill(pid, 0) delivers nothing; EPERM still proves existence.
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_exists(_pid: u32) -> bool {
    // Without a probe, err on the safe side: the janitor will refuse to
    // reclaim and the user can pass --force.
    true
}

/// Observed process name, when the platform exposes one.
#[cfg(target_os = "linux")]
fn process_name(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|s| s.trim().to_string())
}

#[cfg(not(target_os = "linux"))]
fn process_name(_pid: u32) -> Option<String> {
    None
}
