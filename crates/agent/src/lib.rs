//! Remote agent integration for the Conference Concierge.
//!
//! This crate wraps the retrieval agent hosted on a Llama Stack server behind
//! the provider-agnostic [`RemoteAgent`] trait: sessions are created under a
//! label and each turn is answered as a stream of [`StreamEvent`]s.
//!
//! # Providers
//! - **Llama Stack**: agents API over HTTP with Server-Sent Events
//! - **Scripted**: in-memory replay for tests and offline development
//!
//! # Example
//! ```no_run
//! use concierge_agent::{connect, TurnRequest};
//! use concierge_core::AppConfig;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let agent = connect(&config).await?;
//! let session = agent.create_session(&config.session_label).await?;
//! let mut events = agent
//!     .create_turn(&session, &TurnRequest::user_query("What's on after lunch?"))
//!     .await?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod sse;
pub mod types;

// Re-export main types
pub use client::{RemoteAgent, Role, SessionId, StreamEvent, TurnMessage, TurnRequest, TurnStream};
pub use factory::{connect, check_connection, create_client, select_model, select_vector_db};
pub use providers::{LlamaStackAgent, LlamaStackClient, ScriptedAgent, ScriptedTurn};
pub use types::{AgentConfig, ConnectionStatus, ModelInfo, Toolgroup, VectorDbInfo};
