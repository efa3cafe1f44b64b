//! Command handlers for the Conference Concierge CLI.

pub mod ask;
pub mod chat;
pub mod status;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use status::StatusCommand;
