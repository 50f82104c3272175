//! The interactive read-eval-print loop: banner, prompt, and `/`-prefixed
//! command parsing. Deliberately thin — all real behavior lives in
//! `weft_core::Engine`; this module only reads lines and dispatches.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use weft_core::{Engine, StrategyKind};

use crate::build_llm_client;

const BANNER: &str = "\nweft — interactive LLM assistant\ntype a message, or /help for commands\n";

/// One parsed slash command. `Unknown` carries the raw line so the caller
/// can echo it back in an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Quit,
    Help,
    Reset,
    SwapStrategy(StrategyKind),
    SwapProvider(String),
    Unknown(String),
}

/// Parses a line starting with `/`. Returns `None` for anything that isn't a
/// slash command at all (the common case: a plain chat message).
pub fn parse_slash_command(line: &str) -> Option<SlashCommand> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let cmd = parts.next().unwrap_or("");

    Some(match cmd {
        "quit" | "exit" | "q" => SlashCommand::Quit,
        "help" | "h" | "?" => SlashCommand::Help,
        "reset" | "clear" => SlashCommand::Reset,
        "strategy" => match parts.next() {
            Some("simple") => SlashCommand::SwapStrategy(StrategyKind::Simple),
            Some("react") => SlashCommand::SwapStrategy(StrategyKind::React),
            Some("tooluse") => SlashCommand::SwapStrategy(StrategyKind::ToolUse),
            _ => SlashCommand::Unknown(trimmed.to_string()),
        },
        "provider" => match parts.next() {
            Some(name) => SlashCommand::SwapProvider(name.to_string()),
            None => SlashCommand::Unknown(trimmed.to_string()),
        },
        _ => SlashCommand::Unknown(trimmed.to_string()),
    })
}

const HELP_TEXT: &str = "Commands:\n\
  /help                 show this message\n\
  /quit                 exit\n\
  /reset                clear the current conversation\n\
  /strategy <name>      hot-swap inference strategy: simple | react | tooluse\n\
  /provider <name>      hot-swap LLM provider: groq | openai | claude | gemini";

/// Runs the interactive loop against stdin/stdout until `/quit` or EOF.
pub async fn run_repl_loop(engine: &mut Engine, config: &weft_config::AppConfig) {
    println!("{BANNER}");
    println!("provider: {}  strategy: {}", engine.provider_name(), engine.strategy_kind().as_str());

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) => {
                eprintln!("error reading input: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        if let Some(command) = parse_slash_command(&line) {
            match command {
                SlashCommand::Quit => break,
                SlashCommand::Help => println!("{HELP_TEXT}"),
                SlashCommand::Reset => {
                    engine.reset_conversation();
                    println!("conversation reset.");
                }
                SlashCommand::SwapStrategy(kind) => {
                    engine.swap_strategy(kind);
                    println!("strategy swapped to {}.", kind.as_str());
                }
                SlashCommand::SwapProvider(name) => match build_llm_client(&name, config) {
                    Ok(client) => {
                        engine.swap_llm(Arc::from(client));
                        println!("provider swapped to {name}.");
                    }
                    Err(e) => eprintln!("could not swap provider: {e}"),
                },
                SlashCommand::Unknown(raw) => eprintln!("unrecognized command: {raw} (try /help)"),
            }
            continue;
        }

        let reply = engine.process_query(&line).await;
        println!("{reply}");
    }

    println!("Bye.");
}

/// Runs exactly one turn, for non-interactive `weft -m "..."` invocations.
pub async fn run_one_turn(engine: &mut Engine, message: &str) -> String {
    engine.process_query(message).await
}
