//! Ask command handler.
//!
//! Runs a single question as one turn in a fresh session.

use clap::Args;
use concierge_conversation::ConversationController;
use concierge_core::{config::AppConfig, AppError, AppResult};
use std::io::Write;
use std::path::PathBuf;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub prompt: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// Print the answer only once it is complete
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_prompt()?;

        let agent = concierge_agent::connect(config).await?;
        let mut controller = ConversationController::from_config(agent, config);

        let live = !self.json && !self.no_stream;
        let mut streamed = false;
        let exchange = controller
            .submit_query_with(&question, |chunk| {
                if live {
                    streamed = true;
                    print!("{}", chunk);
                    std::io::stdout().flush().ok();
                }
            })
            .await?;

        if self.json {
            let mut output = serde_json::to_value(&exchange)?;
            output["session"] =
                serde_json::json!(controller.session_id().map(|s| s.to_string()));
            let json = serde_json::to_string_pretty(&output)?;
            println!("{}", json);
        } else if streamed {
            // Terminate the streamed line
            println!();
        } else {
            println!("{}", exchange.response());
        }

        Ok(())
    }

    /// Get the question from the argument or the file.
    fn get_prompt(&self) -> AppResult<String> {
        let text = match (&self.prompt, &self.file) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(AppError::Config("No question provided".to_string()));
            }
        };

        if text.trim().is_empty() {
            return Err(AppError::Config("Question must not be empty".to_string()));
        }

        Ok(text)
    }
}
