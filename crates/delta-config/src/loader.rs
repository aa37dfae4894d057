//! Agent project loading.
//!
//! Locates the main config, resolves `imports` depth-first, merges tool
//! lists last-write-wins, loads hooks and the context manifest, and expands
//! every declarative tool. All validation happens here, before a run
//! directory exists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;

use delta_types::{ContextManifest, HooksConfig, ToolDefinition};

use crate::expand::expand_tool;
use crate::schema::{AgentConfig, RawTool};
use crate::{Error, Result};

/// File names probed for the main config, in preference order
const MAIN_CONFIG: &str = "agent.yaml";
const LEGACY_MAIN_CONFIG: &str = "config.yaml";

/// File name for the hook configuration
const HOOKS_FILE: &str = "hooks.yaml";

/// File name for the context manifest
const CONTEXT_FILE: &str = "context.yaml";

/// Fully loaded and validated agent project
#[derive(Debug, Clone)]
pub struct LoadedAgent {
    pub agent_root: PathBuf,
    pub config: AgentConfig,
    /// System prompt file contents
    pub system_prompt: String,
    /// Expanded tools, imports first, de-duplicated last-write-wins
    pub tools: Vec<ToolDefinition>,
    pub hooks: HooksConfig,
    pub manifest: ContextManifest,
    /// Human-readable warnings collected during loading; the CLI prints
    /// them to stderr
    pub warnings: Vec<String>,
}

/// Load and validate the whole agent project rooted at `agent_root`.
pub fn load_agent(agent_root: &Path) -> Result<LoadedAgent> {
    let agent_root = agent_root.canonicalize().map_err(|err| {
        Error::Validation(format!(
            "agent root {} is not accessible: {}",
            agent_root.display(),
            err
        ))
    })?;
    let mut warnings = Vec::new();

    let config = load_main_config(&agent_root, &mut warnings)?;

    let system_prompt_path = agent_root.join(&config.system_prompt);
    let system_prompt = std::fs::read_to_string(&system_prompt_path).map_err(|err| {
        Error::Validation(format!(
            "system prompt {} is not readable: {}",
            system_prompt_path.display(),
            err
        ))
    })?;

    let raw_tools = resolve_imports(&config, &agent_root, &mut warnings)?;
    let merged = merge_tools(raw_tools, &mut warnings);
    let mut tools = Vec::with_capacity(merged.len());
    for raw in &merged {
        tools.push(expand_tool(raw)?);
    }

    let hooks = load_hooks(&agent_root, &config, &mut warnings)?;
    let manifest = load_context_manifest(&agent_root)?;

    for warning in &warnings {
        warn!(target: "delta::config", "{}", warning);
    }

    Ok(LoadedAgent {
        agent_root,
        config,
        system_prompt,
        tools,
        hooks,
        manifest,
        warnings,
    })
}

/// Locate and parse the main config, preferring `agent.yaml`.
fn load_main_config(agent_root: &Path, warnings: &mut Vec<String>) -> Result<AgentConfig> {
    let main = agent_root.join(MAIN_CONFIG);
    let legacy = agent_root.join(LEGACY_MAIN_CONFIG);

    let path = match (main.is_file(), legacy.is_file()) {
        (true, true) => {
            warnings.push(format!(
                "both {} and {} exist; using {}",
                MAIN_CONFIG, LEGACY_MAIN_CONFIG, MAIN_CONFIG
            ));
            main
        }
        (true, false) => main,
        (false, true) => {
            warnings.push(format!(
                "{} is deprecated; rename it to {}",
                LEGACY_MAIN_CONFIG, MAIN_CONFIG
            ));
            legacy
        }
        (false, false) => return Err(Error::ConfigNotFound(agent_root.to_path_buf())),
    };

    parse_yaml_file(&path)
}

fn parse_yaml_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|err| Error::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Depth-first `imports` resolution.
///
/// Returns the concatenation of imported tools (in resolution order)
/// followed by the main config's local tools. Every resolved path must stay
/// inside the agent root; revisiting a file on the current stack is a cycle.
fn resolve_imports(
    config: &AgentConfig,
    agent_root: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<RawTool>> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut stack: Vec<PathBuf> = Vec::new();
    let mut tools = Vec::new();

    for entry in &config.imports {
        import_document(entry, agent_root, &mut visited, &mut stack, &mut tools, warnings)?;
    }

    tools.extend(config.tools.iter().cloned());
    Ok(tools)
}

fn import_document(
    entry: &str,
    agent_root: &Path,
    visited: &mut HashSet<PathBuf>,
    stack: &mut Vec<PathBuf>,
    tools: &mut Vec<RawTool>,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let resolved = agent_root.join(entry);
    let canonical = resolved.canonicalize().map_err(|err| {
        Error::Validation(format!(
            "import {:?} is not readable at {}: {}",
            entry,
            resolved.display(),
            err
        ))
    })?;

    if !canonical.starts_with(agent_root) {
        return Err(Error::ImportEscapesRoot {
            entry: entry.to_string(),
            resolved: canonical,
        });
    }

    if stack.contains(&canonical) {
        let mut chain = stack.clone();
        chain.push(canonical);
        return Err(Error::ImportCycle { chain });
    }
    if !visited.insert(canonical.clone()) {
        // Already merged through another path; importing twice is harmless
        // but worth flagging.
        warnings.push(format!("import {:?} listed more than once; skipping duplicate", entry));
        return Ok(());
    }

    stack.push(canonical.clone());
    let doc: ImportedDoc = parse_yaml_file(&canonical)?;
    for nested in &doc.imports {
        import_document(nested, agent_root, visited, stack, tools, warnings)?;
    }
    tools.extend(doc.tools);
    stack.pop();
    Ok(())
}

/// Imported documents may themselves import, but contribute tools only.
#[derive(Debug, Default, serde::Deserialize)]
struct ImportedDoc {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    tools: Vec<RawTool>,
}

/// De-duplicate tools by name, last write wins.
fn merge_tools(tools: Vec<RawTool>, warnings: &mut Vec<String>) -> Vec<RawTool> {
    let mut merged: Vec<RawTool> = Vec::with_capacity(tools.len());
    for tool in tools {
        if let Some(existing) = merged.iter_mut().find(|t| t.name == tool.name) {
            warnings.push(format!(
                "tool {:?} defined more than once; the later definition wins",
                tool.name
            ));
            *existing = tool;
        } else {
            merged.push(tool);
        }
    }
    merged
}

/// Load hook configuration, preferring `hooks.yaml` over the deprecated
/// inline `lifecycle_hooks` section.
fn load_hooks(
    agent_root: &Path,
    config: &AgentConfig,
    warnings: &mut Vec<String>,
) -> Result<HooksConfig> {
    let hooks_path = agent_root.join(HOOKS_FILE);

    match (hooks_path.is_file(), config.lifecycle_hooks.as_ref()) {
        (true, Some(_)) => {
            warnings.push(format!(
                "both {} and lifecycle_hooks are present; {} wins",
                HOOKS_FILE, HOOKS_FILE
            ));
            parse_yaml_file(&hooks_path)
        }
        (true, None) => parse_yaml_file(&hooks_path),
        (false, Some(legacy)) => {
            warnings.push(format!(
                "lifecycle_hooks in the main config is deprecated; move it to {}",
                HOOKS_FILE
            ));
            Ok(legacy.clone())
        }
        (false, None) => Ok(HooksConfig::default()),
    }
}

/// Parse a standalone tool file (or any config document with a `tools:`
/// list) and expand every tool. Used by the `tool expand` diagnostic.
pub fn load_tools_file(path: &Path) -> Result<Vec<ToolDefinition>> {
    let doc: ImportedDoc = parse_yaml_file(path)?;
    if doc.tools.is_empty() {
        return Err(Error::Validation(format!(
            "{} declares no tools",
            path.display()
        )));
    }
    let mut tools = Vec::with_capacity(doc.tools.len());
    for raw in &doc.tools {
        tools.push(expand_tool(raw)?);
    }
    Ok(tools)
}

/// Load the required context manifest.
fn load_context_manifest(agent_root: &Path) -> Result<ContextManifest> {
    let path = agent_root.join(CONTEXT_FILE);
    if !path.is_file() {
        return Err(Error::MissingContextManifest {
            expected: path,
            suggestion: ContextManifest::SUGGESTED_DEFAULT.to_string(),
        });
    }
    let manifest: ContextManifest = parse_yaml_file(&path)?;
    if manifest.sources.is_empty() {
        return Err(Error::Validation(format!(
            "{} declares no sources",
            path.display()
        )));
    }
    Ok(manifest)
}
