//! Child-process supervision: spawn + wait with deadline.
//!
//! Tools, hooks, and context generators all run through this single
//! primitive. The child is polled with `try_wait` and killed when its
//! deadline expires; stdout/stderr are drained on dedicated threads so a
//! chatty child can never deadlock against a full pipe.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Everything needed to run one supervised child
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: std::path::PathBuf,
    /// Extra environment on top of the inherited one
    pub env: Vec<(String, String)>,
    /// Payload piped to the child's stdin, which is then closed
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

/// Outcome of one supervised child
#[derive(Debug)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the child was killed by a signal or the deadline
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// What went wrong before the child produced any outcome
#[derive(Debug)]
pub struct SpawnError {
    pub program: String,
    pub source: std::io::Error,
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to spawn {:?}: {}", self.program, self.source)
    }
}

/// Run a child to completion or deadline.
///
/// Spawn failure is returned as `Err(SpawnError)` so callers can decide
/// whether it is an observation or a fatal condition; every post-spawn
/// outcome (non-zero exit, timeout, signal death) is an `Ok` capture.
pub fn run_command(spec: &CommandSpec) -> std::result::Result<CapturedOutput, SpawnError> {
    let program = spec.argv.first().cloned().unwrap_or_default();
    let started = Instant::now();

    let mut command = Command::new(&program);
    command
        .args(&spec.argv[1..])
        .current_dir(&spec.cwd)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| SpawnError {
        program: program.clone(),
        source,
    })?;

    if let Some(payload) = &spec.stdin
        && let Some(mut stdin) = child.stdin.take()
    {
        // A child may exit without reading; a broken pipe here is not an
        // execution failure.
        let _ = stdin.write_all(payload.as_bytes());
        drop(stdin);
    }

    let stdout_handle = child.stdout.take().map(drain_pipe);
    let stderr_handle = child.stderr.take().map(drain_pipe);

    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if let Some(timeout) = spec.timeout
                    && started.elapsed() >= timeout
                {
                    timed_out = true;
                    let _ = child.kill();
                    break child.wait().ok();
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(_) => break child.wait().ok(),
        }
    };

    let stdout = join_pipe(stdout_handle);
    let stderr = join_pipe(stderr_handle);

    Ok(CapturedOutput {
        stdout,
        stderr,
        exit_code: if timed_out {
            None
        } else {
            status.and_then(|s| s.code())
        },
        duration: started.elapsed(),
        timed_out,
    })
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_pipe(handle: Option<std::thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Shell-quote an argv for audit display (`command.txt`).
pub fn display_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(|s| s.as_str())).unwrap_or_else(|_| argv.join(" "))
}

/// Environment exported to every child the engine spawns.
pub fn base_child_env(
    run_id: &str,
    agent_home: &Path,
    workspace: &Path,
    journal_path: &Path,
) -> Vec<(String, String)> {
    vec![
        ("DELTA_RUN_ID".to_string(), run_id.to_string()),
        (
            "DELTA_AGENT_HOME".to_string(),
            agent_home.display().to_string(),
        ),
        ("DELTA_CWD".to_string(), workspace.display().to_string()),
        (
            "JOURNAL_PATH".to_string(),
            journal_path.display().to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec(argv: &[&str], cwd: &Path) -> CommandSpec {
        CommandSpec {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
            stdin: None,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let temp = TempDir::new().unwrap();
        let out = run_command(&spec(&["sh", "-c", "echo hello; exit 3"], temp.path())).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.timed_out);
    }

    #[test]
    fn test_stdin_payload_reaches_child() {
        let temp = TempDir::new().unwrap();
        let mut s = spec(&["cat"], temp.path());
        s.stdin = Some("piped content".to_string());
        let out = run_command(&s).unwrap();
        assert_eq!(out.stdout, "piped content");
        assert!(out.success());
    }

    #[test]
    fn test_deadline_kills_child() {
        let temp = TempDir::new().unwrap();
        let mut s = spec(&["sleep", "30"], temp.path());
        s.timeout = Some(Duration::from_millis(100));
        let out = run_command(&s).unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(out.duration < Duration::from_secs(10));
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = run_command(&spec(&["definitely-not-a-real-binary-xyz"], temp.path()));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_and_cwd_propagate() {
        let temp = TempDir::new().unwrap();
        let mut s = spec(&["sh", "-c", "printf '%s' \"$DELTA_RUN_ID:$(pwd)\""], temp.path());
        s.env = vec![("DELTA_RUN_ID".to_string(), "run42".to_string())];
        let out = run_command(&s).unwrap();
        assert!(out.stdout.starts_with("run42:"));
        let reported = out.stdout.split(':').nth(1).unwrap();
        assert_eq!(
            std::fs::canonicalize(reported).unwrap(),
            std::fs::canonicalize(temp.path()).unwrap()
        );
    }

    #[test]
    fn test_display_command_round_trips() {
        let argv = vec!["echo".to_string(), "two words".to_string(), "; rm -rf /".to_string()];
        let displayed = display_command(&argv);
        assert_eq!(shlex::split(&displayed).unwrap(), argv);
    }
}
