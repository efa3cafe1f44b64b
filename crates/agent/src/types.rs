//! Agent configuration and discovery types.

use serde::{Deserialize, Serialize};

/// Name of the built-in retrieval tool the agent answers with.
pub const RAG_TOOL_NAME: &str = "builtin::rag/knowledge_search";

/// A model registered with the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub identifier: String,

    /// "llm" or "embedding"
    #[serde(default)]
    pub model_type: Option<String>,

    #[serde(default)]
    pub provider_id: Option<String>,
}

impl ModelInfo {
    /// Whether this model can serve chat turns.
    pub fn is_llm(&self) -> bool {
        self.model_type.as_deref().map_or(true, |t| t == "llm")
    }
}

/// A vector database registered with the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbInfo {
    pub identifier: String,

    #[serde(default)]
    pub embedding_model: Option<String>,
}

/// `{"data": [...]}` wrapper used by list endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
}

/// A tool group attached to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toolgroup {
    pub name: String,
    pub args: serde_json::Value,
}

impl Toolgroup {
    /// Knowledge search over the given vector databases.
    pub fn knowledge_search(vector_db_ids: &[String]) -> Self {
        Self {
            name: RAG_TOOL_NAME.to_string(),
            args: serde_json::json!({ "vector_db_ids": vector_db_ids }),
        }
    }
}

/// Configuration the agent is registered with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    pub instructions: String,
    pub toolgroups: Vec<Toolgroup>,

    /// Server-side persistence is never requested; history lives with the session
    #[serde(default)]
    pub enable_session_persistence: bool,
}

impl AgentConfig {
    /// Agent answering through knowledge search over one vector database.
    pub fn rag(
        model: impl Into<String>,
        instructions: impl Into<String>,
        vector_db_id: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            instructions: instructions.into(),
            toolgroups: vec![Toolgroup::knowledge_search(&[vector_db_id.into()])],
            enable_session_persistence: false,
        }
    }
}

/// Result of a connectivity check against the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub base_url: String,
    pub connected: bool,
    pub models: Vec<String>,
    pub vector_dbs: Vec<String>,

    /// Model turns would use, when one could be chosen
    pub selected_model: Option<String>,

    /// Vector database turns would search, when one could be chosen
    pub selected_vector_db: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_agent_config() {
        let config = AgentConfig::rag("llama-model", "Be helpful.", "sessions-db");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["model"], "llama-model");
        assert_eq!(json["toolgroups"][0]["name"], RAG_TOOL_NAME);
        assert_eq!(
            json["toolgroups"][0]["args"]["vector_db_ids"],
            serde_json::json!(["sessions-db"])
        );
        assert_eq!(json["enable_session_persistence"], false);
    }

    #[test]
    fn test_model_info_kind() {
        let models: ListResponse<ModelInfo> = serde_json::from_str(
            r#"{"data": [
                {"identifier": "all-MiniLM-L6-v2", "model_type": "embedding"},
                {"identifier": "llama-model", "model_type": "llm", "provider_id": "vllm"},
                {"identifier": "untyped"}
            ]}"#,
        )
        .unwrap();

        let kinds: Vec<bool> = models.data.iter().map(ModelInfo::is_llm).collect();
        assert_eq!(kinds, vec![false, true, true]);
    }
}
