//! Agent construction and connection diagnostics.
//!
//! `connect` performs the startup sequence: discover the model and vector
//! database to use, then register the retrieval agent. `check_connection` runs the same
//! discovery but reports what it found instead of failing.

use crate::client::RemoteAgent;
use crate::providers::{LlamaStackAgent, LlamaStackClient};
use crate::types::{AgentConfig, ConnectionStatus, ModelInfo, VectorDbInfo};
use concierge_core::config::DEFAULT_MODEL;
use concierge_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Create a server client from application configuration.
pub fn create_client(config: &AppConfig) -> LlamaStackClient {
    LlamaStackClient::with_base_url(&config.base_url)
        .with_request_timeout(config.request_timeout())
}

/// Choose the model turns run on.
///
/// A configured model must be listed by the server (when the server lists
/// any). Otherwise the first LLM is used, then the first model of any kind,
/// then [`DEFAULT_MODEL`].
pub fn select_model(models: &[ModelInfo], preferred: Option<&str>) -> AppResult<String> {
    if let Some(preferred) = preferred {
        if models.is_empty() || models.iter().any(|m| m.identifier == preferred) {
            return Ok(preferred.to_string());
        }
        return Err(AppError::Connection(format!(
            "Model '{}' is not available. Available: {}",
            preferred,
            identifiers(models.iter().map(|m| m.identifier.as_str()))
        )));
    }

    let chosen = models
        .iter()
        .find(|m| m.is_llm())
        .or_else(|| models.first())
        .map(|m| m.identifier.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    Ok(chosen)
}

/// Choose the vector database the agent searches.
pub fn select_vector_db(dbs: &[VectorDbInfo], preferred: Option<&str>) -> AppResult<String> {
    match preferred {
        Some(preferred) if dbs.iter().any(|db| db.identifier == preferred) => {
            Ok(preferred.to_string())
        }
        Some(preferred) => Err(AppError::Connection(format!(
            "Vector database '{}' is not registered. Available: {}",
            preferred,
            identifiers(dbs.iter().map(|db| db.identifier.as_str()))
        ))),
        None => dbs.first().map(|db| db.identifier.clone()).ok_or_else(|| {
            AppError::Connection(
                "No vector databases are registered; ingest documents first".to_string(),
            )
        }),
    }
}

fn identifiers<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let ids: Vec<&str> = ids.collect();
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

/// Connect to the server and register the retrieval agent.
///
/// # Errors
/// Returns `AppError::Connection` if the server cannot be reached, the
/// configured model or vector database is missing, or registration fails.
pub async fn connect(config: &AppConfig) -> AppResult<Arc<dyn RemoteAgent>> {
    config.validate()?;

    let client = create_client(config);
    tracing::info!("Connecting to Llama Stack at {}", client.base_url());

    let models = client.list_models().await?;
    let model = select_model(&models, config.model.as_deref())?;

    let vector_dbs = client.list_vector_dbs().await?;
    let vector_db = select_vector_db(&vector_dbs, config.vector_db.as_deref())?;

    tracing::info!("Using model {} with vector database {}", model, vector_db);

    let agent_config = AgentConfig::rag(model, &config.instructions, vector_db);
    let agent = LlamaStackAgent::register(client, agent_config).await?;

    Ok(Arc::new(agent))
}

/// Check connectivity without registering anything.
pub async fn check_connection(config: &AppConfig) -> ConnectionStatus {
    let client = create_client(config);
    let mut status = ConnectionStatus {
        base_url: client.base_url().to_string(),
        connected: false,
        models: Vec::new(),
        vector_dbs: Vec::new(),
        selected_model: None,
        selected_vector_db: None,
        error: None,
    };

    let models = match client.list_models().await {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!("Connection check failed: {}", e);
            status.error = Some(e.to_string());
            return status;
        }
    };
    status.connected = true;
    status.models = models.iter().map(|m| m.identifier.clone()).collect();

    match select_model(&models, config.model.as_deref()) {
        Ok(model) => status.selected_model = Some(model),
        Err(e) => status.error = Some(e.to_string()),
    }

    match client.list_vector_dbs().await {
        Ok(dbs) => {
            status.vector_dbs = dbs.iter().map(|db| db.identifier.clone()).collect();
            match select_vector_db(&dbs, config.vector_db.as_deref()) {
                Ok(db) => status.selected_vector_db = Some(db),
                Err(e) => {
                    status.error.get_or_insert(e.to_string());
                }
            }
        }
        Err(e) => {
            status.error.get_or_insert(e.to_string());
        }
    }

    status
}
