//! Remote agent provider implementations.

pub mod llama_stack;
pub mod scripted;

pub use llama_stack::{LlamaStackAgent, LlamaStackClient};
pub use scripted::{ScriptedAgent, ScriptedTurn};
