//! Declarative agent-project scaffolding for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated agent project plus helpers to drive the CLI against it.
pub struct TestWorld {
    temp_dir: TempDir,
    agent_root: PathBuf,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Scaffold a minimal valid agent: agent.yaml with an `echo_test` exec
    /// tool, a system prompt, and a file+journal context manifest.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let agent_root = temp_dir.path().join("agent");
        fs::create_dir_all(&agent_root).expect("Failed to create agent root");

        let world = Self {
            temp_dir,
            agent_root,
        };
        world.write_file(
            "agent.yaml",
            "
name: test-agent
llm:
  model: stub-model
tools:
  - name: echo_test
    exec: \"echo ${message}\"
  - name: echo_input
    exec: \"echo ${input}\"
  - name: count_lines
    shell: \"cat ${file} | wc -l\"
",
        );
        world.write_file("system_prompt.md", "You are a test agent. Be brief.\n");
        world.write_file(
            "context.yaml",
            "
sources:
  - type: file
    id: system_prompt
    path: \"${AGENT_HOME}/system_prompt.md\"
  - type: journal
",
        );
        world
    }

    pub fn agent_root(&self) -> &Path {
        &self.agent_root
    }

    pub fn base_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The default workspace the resolver will pick/create.
    pub fn workspace(&self) -> PathBuf {
        self.agent_root.join("workspaces/W001")
    }

    /// Write (or overwrite) a file under the agent root.
    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.agent_root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Remove a file under the agent root.
    pub fn remove_file(&self, rel: &str) {
        let _ = fs::remove_file(self.agent_root.join(rel));
    }

    /// Point the adapter at a stub endpoint via the agent `.env`.
    pub fn set_llm_endpoint(&self, base_url: &str) {
        self.write_file(
            ".env",
            &format!("DELTA_API_KEY=test-key\nDELTA_BASE_URL={}\n", base_url),
        );
    }

    /// A `delta` command rooted at the agent project.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("delta").expect("delta binary not built");
        cmd.current_dir(&self.agent_root);
        // Isolate from the developer's real credentials.
        cmd.env_remove("DELTA_API_KEY")
            .env_remove("DELTA_BASE_URL")
            .env_remove("OPENAI_API_KEY")
            .env_remove("OPENAI_BASE_URL")
            .env_remove("OPENAI_API_BASE");
        cmd
    }

    /// Local hostname the runtime will record, for seeding metadata.
    pub fn local_hostname() -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}
