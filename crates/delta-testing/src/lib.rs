//! TestWorld pattern for declarative integration test setup.
//!
//! Provides a fluent interface for:
//! - Scaffolding complete agent projects in isolated temp directories
//! - Driving the `delta` binary with proper environment
//! - Stubbing the LLM endpoint with canned chat-completions responses
//! - Asserting over journals and run directories

pub mod assertions;
pub mod server;
pub mod world;

pub use assertions::{audit_tree, journal_events, journal_kinds, latest_run_dir, run_metadata};
pub use server::StubLlmServer;
pub use world::TestWorld;
