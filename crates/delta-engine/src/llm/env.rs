//! Adapter credential resolution.
//!
//! `.env` files are parsed without mutating the process environment so two
//! runs in one test process cannot leak credentials into each other. The
//! chain, highest priority first: workspace `.env`, agent `.env`,
//! project-root `.env` (nearest ancestor containing `.git`), process env.

use std::collections::HashMap;
use std::path::Path;

/// Canonical and legacy key names for the API credential
const API_KEY_VARS: &[&str] = &["DELTA_API_KEY", "OPENAI_API_KEY"];

/// Canonical and legacy key names for the endpoint override
const BASE_URL_VARS: &[&str] = &["DELTA_BASE_URL", "OPENAI_BASE_URL", "OPENAI_API_BASE"];

#[derive(Debug, Default)]
pub struct EnvResolver {
    /// Layered maps, highest priority first
    layers: Vec<HashMap<String, String>>,
}

impl EnvResolver {
    /// Build the resolution chain for one run.
    pub fn load(workspace: &Path, agent_root: &Path) -> Self {
        let mut layers = Vec::new();
        for dir in [workspace, agent_root] {
            if let Some(layer) = parse_env_file(&dir.join(".env")) {
                layers.push(layer);
            }
        }
        if let Some(project_root) = find_project_root(agent_root)
            && let Some(layer) = parse_env_file(&project_root.join(".env"))
        {
            layers.push(layer);
        }
        Self { layers }
    }

    /// Look up one key through the chain, falling back to the process env.
    pub fn get(&self, key: &str) -> Option<String> {
        for layer in &self.layers {
            if let Some(value) = layer.get(key) {
                return Some(value.clone());
            }
        }
        std::env::var(key).ok()
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn api_key(&self) -> Option<String> {
        self.first_of(API_KEY_VARS)
    }

    pub fn base_url(&self) -> Option<String> {
        self.first_of(BASE_URL_VARS)
    }
}

fn parse_env_file(path: &Path) -> Option<HashMap<String, String>> {
    if !path.is_file() {
        return None;
    }
    let iter = dotenvy::from_path_iter(path).ok()?;
    let mut map = HashMap::new();
    for item in iter {
        // A malformed line invalidates nothing but itself.
        if let Ok((key, value)) = item {
            map.insert(key, value);
        }
    }
    Some(map)
}

/// Walk upward from `start` to the nearest directory containing `.git`.
fn find_project_root(start: &Path) -> Option<std::path::PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_env_wins_over_agent_env() {
        let temp = TempDir::new().unwrap();
        let agent = temp.path().join("agent");
        let workspace = agent.join("workspaces/W001");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(agent.join(".env"), "DELTA_API_KEY=agent-key\n").unwrap();
        std::fs::write(workspace.join(".env"), "DELTA_API_KEY=workspace-key\n").unwrap();

        let resolver = EnvResolver::load(&workspace, &agent);
        assert_eq!(resolver.api_key().as_deref(), Some("workspace-key"));
    }

    #[test]
    fn test_project_root_env_via_git_marker() {
        let temp = TempDir::new().unwrap();
        let project = temp.path();
        std::fs::create_dir_all(project.join(".git")).unwrap();
        std::fs::write(project.join(".env"), "DELTA_BASE_URL=http://proxy.internal\n").unwrap();

        let agent = project.join("agents/demo");
        let workspace = agent.join("workspaces/W001");
        std::fs::create_dir_all(&workspace).unwrap();

        let resolver = EnvResolver::load(&workspace, &agent);
        assert_eq!(
            resolver.base_url().as_deref(),
            Some("http://proxy.internal")
        );
    }

    #[test]
    fn test_legacy_alias_fallback() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("w");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join(".env"), "OPENAI_API_KEY=legacy\n").unwrap();

        let resolver = EnvResolver::load(&workspace, temp.path());
        assert_eq!(resolver.api_key().as_deref(), Some("legacy"));
    }
}
