//! Status command handler.
//!
//! Connection diagnostics: can the server be reached, and which model and
//! vector database would a conversation use.

use clap::Args;
use concierge_agent::ConnectionStatus;
use concierge_core::{config::AppConfig, AppError, AppResult};

/// Check the connection to the Llama Stack server
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn render(status: &ConnectionStatus) -> String {
    let mut out = String::new();

    if status.connected {
        out.push_str(&format!("Connected to Llama Stack at {}\n", status.base_url));
        out.push_str(&format!("Available models: {}\n", status.models.len()));
        out.push_str(&format!(
            "Using model: {}\n",
            status.selected_model.as_deref().unwrap_or("(none)")
        ));
        out.push_str(&format!("Vector databases: {}\n", status.vector_dbs.len()));
        out.push_str(&format!(
            "Using vector database: {}\n",
            status.selected_vector_db.as_deref().unwrap_or("(none)")
        ));
    } else {
        out.push_str(&format!("Connection failed: {}\n", status.base_url));
        out.push_str("Please check:\n");
        out.push_str("  1. Is the server URL correct? (--url or LLAMA_STACK_URL)\n");
        out.push_str("  2. Is the Llama Stack service running?\n");
        out.push_str("  3. Can this machine reach the service (network/firewall)?\n");
    }

    if let Some(ref error) = status.error {
        out.push_str(&format!("Error: {}\n", error));
    }

    out
}

impl StatusCommand {
    /// Execute the status command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        config.validate()?;
        let status = concierge_agent::check_connection(config).await;

        if self.json {
            let json = serde_json::to_string_pretty(&status)?;
            println!("{}", json);
        } else {
            print!("{}", render(&status));
        }

        if status.connected {
            Ok(())
        } else {
            Err(AppError::Connection(
                status
                    .error
                    .unwrap_or_else(|| "server unreachable".to_string()),
            ))
        }
    }
}
