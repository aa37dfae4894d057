use serde::{Deserialize, Serialize};

/// `context.yaml`: declarative recipe for assembling LLM input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextManifest {
    pub sources: Vec<ContextSource>,
}

impl ContextManifest {
    /// Suggested default, embedded in the missing-file error message.
    pub const SUGGESTED_DEFAULT: &'static str = "\
sources:
  - type: file
    id: system_prompt
    path: \"${AGENT_HOME}/system_prompt.md\"
    on_missing: error
  - type: journal
";
}

/// One context source; declaration order is LLM priority order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextSource {
    /// Static file wrapped as a system block
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        path: String,
        #[serde(default)]
        on_missing: OnMissing,
    },

    /// File produced by a generator command immediately before reading
    ComputedFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        generator: GeneratorSpec,
        output_path: String,
        #[serde(default)]
        on_missing: OnMissing,
    },

    /// Replay of the run journal as native dialogue
    Journal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Keep only the most recent N complete Think-Act-Observe cycles
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
}

impl ContextSource {
    /// Label used for the `# Context Block:` header
    pub fn label(&self) -> &str {
        match self {
            ContextSource::File { id, .. } => id.as_deref().unwrap_or("file"),
            ContextSource::ComputedFile { id, .. } => id.as_deref().unwrap_or("computed_file"),
            ContextSource::Journal { id, .. } => id.as_deref().unwrap_or("journal"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSpec {
    pub command: Vec<String>,
    #[serde(default = "default_generator_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_generator_timeout_ms() -> u64 {
    30_000
}

/// Behavior when a source cannot be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    Skip,
    #[default]
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_yaml_shape() {
        let yaml = "
sources:
  - type: file
    id: system_prompt
    path: \"${AGENT_HOME}/system_prompt.md\"
  - type: computed_file
    generator:
      command: [\"python3\", \"tools/summarize.py\"]
      timeout_ms: 5000
    output_path: \".delta/context/summary.md\"
    on_missing: skip
  - type: journal
    max_iterations: 10
";
        let manifest: ContextManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.sources.len(), 3);

        match &manifest.sources[0] {
            ContextSource::File { on_missing, .. } => assert_eq!(*on_missing, OnMissing::Error),
            _ => panic!("expected file source"),
        }
        match &manifest.sources[1] {
            ContextSource::ComputedFile {
                generator,
                on_missing,
                ..
            } => {
                assert_eq!(generator.timeout_ms, 5000);
                assert_eq!(*on_missing, OnMissing::Skip);
            }
            _ => panic!("expected computed_file source"),
        }
        match &manifest.sources[2] {
            ContextSource::Journal { max_iterations, .. } => {
                assert_eq!(*max_iterations, Some(10))
            }
            _ => panic!("expected journal source"),
        }
    }

    #[test]
    fn test_suggested_default_parses() {
        let manifest: ContextManifest =
            serde_yaml::from_str(ContextManifest::SUGGESTED_DEFAULT).unwrap();
        assert_eq!(manifest.sources.len(), 2);
    }
}
