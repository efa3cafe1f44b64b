//! Llama Stack agent provider.
//!
//! This module talks to the agents API of a Llama Stack server:
//! model and vector database discovery, agent registration, sessions, and
//! streamed turns.

use crate::client::{RemoteAgent, SessionId, TurnRequest, TurnStream};
use crate::sse::decode_turn_stream;
use crate::types::{AgentConfig, ListResponse, ModelInfo, VectorDbInfo};
use concierge_core::config::DEFAULT_BASE_URL;
use concierge_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct CreateAgentRequest<'a> {
    agent_config: &'a AgentConfig,
}

#[derive(Debug, Deserialize)]
struct CreateAgentResponse {
    agent_id: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    session_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

/// HTTP client for a Llama Stack server.
#[derive(Debug, Clone)]
pub struct LlamaStackClient {
    /// Base URL of the server, without the `/v1` prefix
    base_url: String,

    /// Timeout for calls that do not stream
    request_timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl LlamaStackClient {
    /// Create a client for the default local server.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client for a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Set the timeout for non-streaming calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    /// List registered models.
    pub async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        let list: ListResponse<ModelInfo> = self.get_json("models").await?;
        tracing::debug!("Server lists {} models", list.data.len());
        Ok(list.data)
    }

    /// List registered vector databases.
    pub async fn list_vector_dbs(&self) -> AppResult<Vec<VectorDbInfo>> {
        let list: ListResponse<VectorDbInfo> = self.get_json("vector-dbs").await?;
        tracing::debug!("Server lists {} vector databases", list.data.len());
        Ok(list.data)
    }

    /// Register an agent and return its id.
    pub async fn create_agent(&self, config: &AgentConfig) -> AppResult<String> {
        tracing::info!("Registering agent with model {}", config.model);
        tracing::debug!("Agent config: {:?}", config);

        let response = self
            .client
            .post(self.url("agents"))
            .timeout(self.request_timeout)
            .json(&CreateAgentRequest {
                agent_config: config,
            })
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to register agent: {}", e)))?;

        let created: CreateAgentResponse = read_json(response, AppError::Connection).await?;
        Ok(created.agent_id)
    }

    /// Create a session for an agent.
    pub async fn create_session(&self, agent_id: &str, label: &str) -> AppResult<SessionId> {
        let response = self
            .client
            .post(self.url(&format!("agents/{}/session", agent_id)))
            .timeout(self.request_timeout)
            .json(&CreateSessionRequest {
                session_name: label,
            })
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to create session: {}", e)))?;

        let created: CreateSessionResponse = read_json(response, AppError::Connection).await?;
        Ok(SessionId::new(created.session_id))
    }

    /// Start a streamed turn.
    pub async fn create_turn(
        &self,
        agent_id: &str,
        session: &SessionId,
        request: &TurnRequest,
    ) -> AppResult<TurnStream> {
        tracing::debug!("Turn request: {:?}", request);

        let url = self.url(&format!("agents/{}/session/{}/turn", agent_id, session));
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Dispatch(format!("Failed to send turn: {}", e)))?;

        if !response.status().is_success() || !is_event_stream(&response) {
            return Err(AppError::Dispatch(error_message(response).await));
        }

        let bytes = response
            .bytes_stream()
            .map(|result| result.map_err(|e| AppError::Stream(format!("Stream error: {}", e))));

        Ok(decode_turn_stream(bytes))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                AppError::Connection(format!("Failed to reach {}: {}", self.base_url, e))
            })?;

        read_json(response, AppError::Connection).await
    }
}

impl Default for LlamaStackClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a JSON body, mapping HTTP and parse failures with `kind`.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    kind: fn(String) -> AppError,
) -> AppResult<T> {
    if !response.status().is_success() {
        return Err(kind(error_message(response).await));
    }

    response
        .json()
        .await
        .map_err(|e| kind(format!("Failed to parse server response: {}", e)))
}

/// Whether the response body is a Server-Sent Events stream.
fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("text/event-stream")
        })
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    format!("Llama Stack API error ({}): {}", status, error_text)
}

/// An agent registered on a Llama Stack server.
#[derive(Debug, Clone)]
pub struct LlamaStackAgent {
    client: LlamaStackClient,
    agent_id: String,
}

impl LlamaStackAgent {
    /// Register `config` with the server.
    pub async fn register(client: LlamaStackClient, config: AgentConfig) -> AppResult<Self> {
        let agent_id = client.create_agent(&config).await?;
        tracing::info!("Registered agent {}", agent_id);
        Ok(Self { client, agent_id })
    }
}

#[async_trait::async_trait]
impl RemoteAgent for LlamaStackAgent {
    fn provider_name(&self) -> &str {
        "llama-stack"
    }

    async fn create_session(&self, label: &str) -> AppResult<SessionId> {
        let session = self.client.create_session(&self.agent_id, label).await?;
        tracing::info!("Created session {} ({})", session, label);
        Ok(session)
    }

    async fn create_turn(
        &self,
        session: &SessionId,
        request: &TurnRequest,
    ) -> AppResult<TurnStream> {
        self.client
            .create_turn(&self.agent_id, session, request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlamaStackClient::new();
        assert_eq!(client.base_url(), "http://localhost:8321");
    }

    #[test]
    fn test_url_building_strips_trailing_slash() {
        let client = LlamaStackClient::with_base_url("http://lsd.rag.svc:8321/");
        assert_eq!(client.url("models"), "http://lsd.rag.svc:8321/v1/models");
        assert_eq!(
            client.url("agents/a1/session"),
            "http://lsd.rag.svc:8321/v1/agents/a1/session"
        );
    }

    #[test]
    fn test_create_agent_request_shape() {
        let config = AgentConfig::rag("llama-model", "Be brief.", "sessions");
        let json = serde_json::to_value(CreateAgentRequest {
            agent_config: &config,
        })
        .unwrap();
        assert_eq!(json["agent_config"]["model"], "llama-model");
        assert_eq!(json["agent_config"]["instructions"], "Be brief.");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Port 9 (discard) is closed on test machines
        let client = LlamaStackClient::with_base_url("http://127.0.0.1:9")
            .with_request_timeout(Duration::from_secs(2));
        let result = client.list_models().await;
        assert!(matches!(result, Err(AppError::Connection(_))));
    }

    /// Serve one canned HTTP response on a local port and return its base URL.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the request head and body before answering
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_turn_with_json_body_is_dispatch_error() {
        let base_url =
            serve_once("200 OK", "application/json", r#"{"detail":"not a stream"}"#).await;
        let client = LlamaStackClient::with_base_url(base_url);

        let result = client
            .create_turn("agent", &SessionId::new("s"), &TurnRequest::user_query("hi"))
            .await;

        match result {
            Err(AppError::Dispatch(message)) => {
                assert!(message.contains("200"));
                assert!(message.contains("not a stream"));
            }
            Err(other) => panic!("expected Dispatch error, got {:?}", other),
            Ok(_) => panic!("expected Dispatch error, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_rejected_turn_is_dispatch_error() {
        let base_url = serve_once(
            "400 Bad Request",
            "application/json",
            r#"{"detail":"invalid session"}"#,
        )
        .await;
        let client = LlamaStackClient::with_base_url(base_url);

        let result = client
            .create_turn("agent", &SessionId::new("s"), &TurnRequest::user_query("hi"))
            .await;

        match result {
            Err(AppError::Dispatch(message)) => {
                assert!(message.contains("400"));
                assert!(message.contains("invalid session"));
            }
            Err(other) => panic!("expected Dispatch error, got {:?}", other),
            Ok(_) => panic!("expected Dispatch error, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_event_stream_turn_is_decoded() {
        let base_url = serve_once(
            "200 OK",
            "text/event-stream",
            "data: {\"event\":{\"payload\":{\"event_type\":\"step_progress\",\"delta\":{\"type\":\"text\",\"text\":\"Hello\"}}}}\n\n",
        )
        .await;
        let client = LlamaStackClient::with_base_url(base_url);

        let mut stream = client
            .create_turn("agent", &SessionId::new("s"), &TurnRequest::user_query("hi"))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        assert_eq!(events, vec![crate::client::StreamEvent::delta("Hello")]);
    }

    #[tokio::test]
    async fn test_unreachable_server_turn_is_dispatch_error() {
        let client = LlamaStackClient::with_base_url("http://127.0.0.1:9");
        let result = client
            .create_turn("agent", &SessionId::new("s"), &TurnRequest::user_query("hi"))
            .await;
        assert!(matches!(result, Err(AppError::Dispatch(_))));
    }
}
