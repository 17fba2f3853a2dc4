//! Chat turn orchestration
//!
//! - `ToolCallAccumulator` - assembles streamed tool-call fragments
//! - `ChatOrchestrator` / `ChatTurn` - stream, execute tools, follow up

pub mod accumulator;
pub mod config;
pub mod orchestrator;

pub use accumulator::ToolCallAccumulator;
pub use config::OrchestratorConfig;
pub use orchestrator::{ChatOrchestrator, ChatTurn, TurnState};

#[cfg(test)]
pub(crate) use orchestrator::tests as test_support;
