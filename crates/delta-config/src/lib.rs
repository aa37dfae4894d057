mod error;
mod expand;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use expand::expand_tool;
pub use loader::{LoadedAgent, load_agent, load_tools_file};
pub use schema::{AgentConfig, LlmConfig, RawParameter, RawTool};
