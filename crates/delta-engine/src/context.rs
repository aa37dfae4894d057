//! Context Builder: declarative assembly of LLM input.
//!
//! Processes `context.yaml` sources in declaration order; order is LLM
//! priority order. File and computed_file sources become single system
//! blocks; the journal source becomes the native prior dialogue.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use delta_core::RunPaths;
use delta_types::{
    ChatMessage, ContextManifest, ContextSource, EventPayload, JournalEvent, OnMissing, ToolCall,
};

use crate::process::{CommandSpec, base_child_env, run_command};
use crate::{Error, Result};

pub struct ContextBuilder<'a> {
    manifest: &'a ContextManifest,
    agent_root: &'a Path,
    workspace: &'a Path,
    paths: &'a RunPaths,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        manifest: &'a ContextManifest,
        agent_root: &'a Path,
        workspace: &'a Path,
        paths: &'a RunPaths,
    ) -> Self {
        Self {
            manifest,
            agent_root,
            workspace,
            paths,
        }
    }

    /// Assemble the message sequence for one iteration.
    pub fn build(&self, events: &[JournalEvent]) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();
        for source in &self.manifest.sources {
            match source {
                ContextSource::File {
                    path, on_missing, ..
                } => {
                    if let Some(block) =
                        self.file_block(source.label(), path, *on_missing)?
                    {
                        messages.push(block);
                    }
                }
                ContextSource::ComputedFile {
                    generator,
                    output_path,
                    on_missing,
                    ..
                } => {
                    if let Some(block) = self.computed_block(
                        source.label(),
                        &generator.command,
                        generator.timeout_ms,
                        output_path,
                        *on_missing,
                    )? {
                        messages.push(block);
                    }
                }
                ContextSource::Journal { max_iterations, .. } => {
                    messages.extend(replay_journal(events, *max_iterations));
                }
            }
        }
        Ok(messages)
    }

    /// Interpolate `${AGENT_HOME}` / `${CWD}` and resolve against the
    /// workspace.
    fn resolve_path(&self, raw: &str) -> PathBuf {
        let interpolated = raw
            .replace("${AGENT_HOME}", &self.agent_root.display().to_string())
            .replace("${CWD}", &self.workspace.display().to_string());
        let path = PathBuf::from(interpolated);
        if path.is_absolute() {
            path
        } else {
            self.workspace.join(path)
        }
    }

    fn file_block(
        &self,
        label: &str,
        raw_path: &str,
        on_missing: OnMissing,
    ) -> Result<Option<ChatMessage>> {
        let path = self.resolve_path(raw_path);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(wrap_system_block(label, &content))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => match on_missing {
                OnMissing::Skip => {
                    debug!(target: "delta::context", source = label, path = %path.display(), "skipping missing context file");
                    Ok(None)
                }
                OnMissing::Error => Err(Error::ContextFileMissing {
                    source: label.to_string(),
                    path,
                }),
            },
            Err(err) => Err(err.into()),
        }
    }

    fn computed_block(
        &self,
        label: &str,
        command: &[String],
        timeout_ms: u64,
        output_path: &str,
        on_missing: OnMissing,
    ) -> Result<Option<ChatMessage>> {
        let output = self.resolve_path(output_path);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spec = CommandSpec {
            argv: command.to_vec(),
            cwd: self.workspace.to_path_buf(),
            env: base_child_env(
                self.paths.run_id(),
                self.agent_root,
                self.workspace,
                &self.paths.journal_path(),
            ),
            stdin: None,
            timeout: Some(Duration::from_millis(timeout_ms)),
        };

        let failure = match run_command(&spec) {
            Ok(captured) if captured.success() => None,
            Ok(captured) if captured.timed_out => {
                Some(format!("generator timed out after {} ms", timeout_ms))
            }
            Ok(captured) => Some(format!(
                "generator exited with {:?}: {}",
                captured.exit_code,
                captured.stderr.trim()
            )),
            Err(spawn) => Some(spawn.to_string()),
        };

        if let Some(message) = failure {
            return match on_missing {
                OnMissing::Skip => {
                    warn!(target: "delta::context", source = label, "{}", message);
                    Ok(None)
                }
                OnMissing::Error => Err(Error::GeneratorFailed {
                    source: label.to_string(),
                    message,
                }),
            };
        }

        self.file_block(label, &output.display().to_string(), on_missing)
    }
}

fn wrap_system_block(label: &str, content: &str) -> ChatMessage {
    ChatMessage::system(format!("# Context Block: {}\n\n{}", label, content))
}

/// Reconstruct the prior dialogue from journal events.
///
/// With `max_iterations = Some(n)`, only the most recent `n` complete
/// Think-Act-Observe cycles are retained; user-visible messages outside any
/// cycle (initial message, injected system messages) always survive.
pub fn replay_journal(events: &[JournalEvent], max_iterations: Option<u32>) -> Vec<ChatMessage> {
    let cutoff = cycle_cutoff(events, max_iterations);

    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut last_thought: Option<(u32, usize)> = None;
    let mut start_seen = false;

    for event in events {
        match &event.payload {
            EventPayload::EngineStart {
                initial_message, ..
            } => {
                if !start_seen {
                    messages.push(ChatMessage::user(initial_message.clone()));
                    start_seen = true;
                }
            }
            EventPayload::SystemMessage { content } => {
                messages.push(ChatMessage::user(content.clone()));
            }
            EventPayload::Thought {
                iteration, content, ..
            } if *iteration >= cutoff => {
                let content = if content.is_empty() {
                    None
                } else {
                    Some(content.clone())
                };
                messages.push(ChatMessage::assistant(content, Vec::new()));
                last_thought = Some((*iteration, messages.len() - 1));
            }
            EventPayload::ActionRequest {
                iteration,
                action_id,
                tool_name,
                tool_args,
                ..
            } if *iteration >= cutoff => {
                let call = ToolCall::function(action_id.clone(), tool_name.clone(), tool_args.clone());
                match last_thought {
                    Some((thought_iter, idx)) if thought_iter == *iteration => {
                        messages[idx]
                            .tool_calls
                            .get_or_insert_with(Vec::new)
                            .push(call);
                    }
                    _ => {
                        // Request without a surviving THOUGHT (trim edge);
                        // synthesize a bare assistant turn to stay coherent.
                        messages.push(ChatMessage::assistant(None, vec![call]));
                        last_thought = Some((*iteration, messages.len() - 1));
                    }
                }
            }
            EventPayload::ActionResult {
                iteration,
                action_id,
                observation_content,
                ..
            } if *iteration >= cutoff => {
                messages.push(ChatMessage::tool(
                    action_id.clone(),
                    observation_content.clone(),
                ));
            }
            _ => {}
        }
    }

    messages
}

/// First iteration retained by the trim window.
fn cycle_cutoff(events: &[JournalEvent], max_iterations: Option<u32>) -> u32 {
    let Some(limit) = max_iterations else {
        return 0;
    };
    let mut iterations: Vec<u32> = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Thought { iteration, .. } => Some(*iteration),
            _ => None,
        })
        .collect();
    iterations.dedup();
    if iterations.len() <= limit as usize {
        return 0;
    }
    iterations[iterations.len() - limit as usize]
}
