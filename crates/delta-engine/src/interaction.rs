//! Human-in-the-loop protocol.
//!
//! Interactive mode prompts on the terminal and keeps the run RUNNING.
//! Async mode writes `interaction/request.json`, parks the run in
//! WAITING_FOR_INPUT, and a later `continue` consumes `response.txt`.

use std::io::{BufRead, Write};

use serde::Deserialize;
use serde_json::Value;

use delta_core::RunPaths;
use delta_types::{InputType, InteractionRequest};

use crate::{Error, Result};

/// Arguments of the built-in `ask_human` tool
#[derive(Debug, Clone, Deserialize)]
pub struct AskHumanArgs {
    pub prompt: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub sensitive: bool,
}

impl AskHumanArgs {
    pub fn parse(args: &Value) -> Result<Self> {
        serde_json::from_value(args.clone())
            .map_err(|err| Error::Interaction(format!("invalid ask_human arguments: {}", err)))
    }
}

/// Source of answers in interactive mode. The engine owns a boxed
/// implementation so tests can script the user.
pub trait HumanInput {
    fn ask(&mut self, request: &InteractionRequest) -> std::io::Result<String>;
}

/// Reads one line from stdin, prompting on stderr.
pub struct TerminalInput;

impl HumanInput for TerminalInput {
    fn ask(&mut self, request: &InteractionRequest) -> std::io::Result<String> {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        match request.input_type {
            InputType::Confirmation => write!(handle, "{} [y/N]: ", request.prompt)?,
            _ => write!(handle, "{}: ", request.prompt)?,
        }
        handle.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Write `interaction/request.json` for an async request.
pub fn write_request(paths: &RunPaths, request: &InteractionRequest) -> Result<()> {
    std::fs::create_dir_all(paths.interaction_dir())?;
    std::fs::write(
        paths.interaction_request_path(),
        serde_json::to_string_pretty(request)?,
    )?;
    Ok(())
}

/// Read the pending request back, if any.
pub fn read_request(paths: &RunPaths) -> Result<Option<InteractionRequest>> {
    let path = paths.interaction_request_path();
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Read `response.txt` if the user has provided it.
pub fn read_response(paths: &RunPaths) -> Result<Option<String>> {
    let path = paths.interaction_response_path();
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(Some(content.trim_end_matches(['\r', '\n']).to_string()))
}

/// Remove both interaction files after the response is journaled.
pub fn clear(paths: &RunPaths) -> Result<()> {
    for path in [
        paths.interaction_request_path(),
        paths.interaction_response_path(),
    ] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    // The directory itself is disposable.
    let _ = std::fs::remove_dir(paths.interaction_dir());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_args_defaults() {
        let args = AskHumanArgs::parse(&json!({"prompt": "Name?"})).unwrap();
        assert_eq!(args.prompt, "Name?");
        assert_eq!(args.input_type, InputType::Text);
        assert!(!args.sensitive);

        assert!(AskHumanArgs::parse(&json!({})).is_err());
    }

    #[test]
    fn test_request_response_roundtrip_and_clear() {
        let temp = TempDir::new().unwrap();
        let paths = RunPaths::new(temp.path(), "run1");

        let request = InteractionRequest {
            request_id: "call_9".to_string(),
            timestamp: Utc::now(),
            prompt: "Name?".to_string(),
            input_type: InputType::Text,
            sensitive: false,
        };
        write_request(&paths, &request).unwrap();

        let read = read_request(&paths).unwrap().unwrap();
        assert_eq!(read.request_id, "call_9");

        assert_eq!(read_response(&paths).unwrap(), None);
        std::fs::write(paths.interaction_response_path(), "Alice\n").unwrap();
        assert_eq!(read_response(&paths).unwrap().as_deref(), Some("Alice"));

        clear(&paths).unwrap();
        assert!(!paths.interaction_request_path().exists());
        assert!(!paths.interaction_response_path().exists());
        assert!(!paths.interaction_dir().exists());
    }
}
