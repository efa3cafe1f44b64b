//! Turn-based conversation management for the Conference Concierge.
//!
//! - [`SessionStore`]: active session id and ordered exchange history
//! - [`TurnDispatcher`]: opens a streamed turn for one query
//! - [`StreamAggregator`]: reduces turn events to the answer text
//! - [`ConversationController`]: ties the three together, one turn at a time
//!
//! # Example
//! ```no_run
//! use concierge_conversation::ConversationController;
//! use concierge_core::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let agent = concierge_agent::connect(&config).await?;
//! let mut controller = ConversationController::from_config(agent, &config);
//!
//! let exchange = controller.submit_query("Which talks cover Rust?").await?;
//! println!("{}", exchange.response());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod controller;
pub mod dispatcher;
pub mod session;

pub use aggregator::{Aggregation, StreamAggregator};
pub use controller::{ControllerOptions, ControllerState, ConversationController};
pub use dispatcher::TurnDispatcher;
pub use session::{Exchange, SessionStore};
