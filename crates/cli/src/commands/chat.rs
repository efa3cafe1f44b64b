//! Chat command handler.
//!
//! Interactive conversation over stdin. Each line is a query; lines starting
//! with `/` are commands.

use clap::Args;
use concierge_conversation::{ConversationController, Exchange};
use concierge_core::{config::AppConfig, AppError, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /clear (start over), /history, /help, /quit";

/// Interactive chat session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Print answers only once they are complete
    #[arg(long)]
    pub no_stream: bool,
}

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Query(&'a str),
    Clear,
    History,
    Help,
    Quit,
    Empty,
    UnknownCommand(&'a str),
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }

    match line.strip_prefix('/') {
        Some("clear") | Some("reset") => ChatInput::Clear,
        Some("history") => ChatInput::History,
        Some("help") => ChatInput::Help,
        Some("quit") | Some("exit") => ChatInput::Quit,
        Some(other) => ChatInput::UnknownCommand(other),
        None => ChatInput::Query(line),
    }
}

fn print_history(history: &[Exchange]) {
    if history.is_empty() {
        println!("(no messages yet)");
        return;
    }

    for exchange in history {
        println!("you: {}", exchange.query());
        println!("concierge: {}", exchange.response());
        println!();
    }
}

/// Print a turn error and keep chatting, or hand back errors that end the chat.
fn report(error: AppError) -> AppResult<()> {
    if error.is_recoverable() {
        eprintln!("Error: {}", error);
        Ok(())
    } else {
        Err(error)
    }
}

fn prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let agent = concierge_agent::connect(config).await?;
        let mut controller = ConversationController::from_config(agent, config);
        controller.start().await?;

        println!("Conference Concierge. Ask me about the conference.");
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        prompt();

        while let Some(line) = lines.next_line().await? {
            match parse_input(&line) {
                ChatInput::Empty => {}
                ChatInput::Quit => break,
                ChatInput::Help => println!("{}", HELP),
                ChatInput::History => print_history(controller.history()),
                ChatInput::UnknownCommand(command) => {
                    println!("Unknown command '/{}'. {}", command, HELP);
                }
                ChatInput::Clear => match controller.reset_conversation().await {
                    Ok(_) => println!("Chat history cleared."),
                    Err(e) => report(e)?,
                },
                ChatInput::Query(query) => self.run_turn(&mut controller, query).await?,
            }
            prompt();
        }

        tracing::info!(
            "Chat ended after {} exchanges",
            controller.history().len()
        );
        Ok(())
    }

    async fn run_turn(
        &self,
        controller: &mut ConversationController,
        query: &str,
    ) -> AppResult<()> {
        let live = !self.no_stream;
        let mut streamed = false;

        let result = controller
            .submit_query_with(query, |chunk| {
                if live {
                    if !streamed {
                        print!("concierge: ");
                        streamed = true;
                    }
                    print!("{}", chunk);
                    std::io::stdout().flush().ok();
                }
            })
            .await;

        match result {
            Ok(exchange) => {
                if streamed {
                    println!();
                } else {
                    println!("concierge: {}", exchange.response());
                }
                Ok(())
            }
            Err(e) => {
                if streamed {
                    println!();
                }
                report(e)
            }
        }
    }
}
