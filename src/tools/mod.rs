//! Agronomy tools the diagnosis model can ask for.
//!
//! The catalog owns metadata, parameter validation and prompt generation. The
//! executor runs a batch of requested calls concurrently under a per-call
//! deadline, so one slow lookup never holds up the rest.

pub mod builtin;
pub mod catalog;
pub mod executor;

pub use catalog::{ParamDef, ParamType, Tool, ToolEntry, ToolRegistry};
pub use executor::{ToolCall, ToolExecutor, ToolResult};
