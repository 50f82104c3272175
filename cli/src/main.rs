//! `weft` binary: wires configuration, the MCP registry, and the engine
//! together, then either runs one turn (`-m`) or drops into the interactive
//! REPL.

mod log_format;
mod logging;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use weft_config::{AppConfig, ProviderName};
use weft_core::llm::{ClaudeClient, GeminiClient, GroqClient, LlmClient, OpenAiClient};
use weft_core::mcp::{manifest, McpRegistry};
use weft_core::{Engine, StrategyKind};

const DEFAULT_GROQ_MODEL: &str = "llama-3.1-70b-versatile";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(about = "weft — interactive LLM assistant with pluggable inference strategies")]
struct Args {
    /// User message; when set, runs one turn and exits instead of starting the REPL.
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    /// LLM provider: groq | openai | claude | gemini
    #[arg(short, long, default_value = "groq")]
    provider: String,

    /// Inference strategy: simple | react | tooluse
    #[arg(short, long, default_value = "simple")]
    strategy: String,

    /// Path to application.properties
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the .mcp.json tool-server manifest
    #[arg(long, value_name = "PATH")]
    mcp_manifest: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_strategy(name: &str) -> StrategyKind {
    match name {
        "react" => StrategyKind::React,
        "tooluse" | "tool-use" | "tool_use" => StrategyKind::ToolUse,
        _ => StrategyKind::Simple,
    }
}

/// Builds a boxed LLM client for `name` from resolved provider settings.
/// Public so the REPL's `/provider` command can hot-swap at runtime.
pub fn build_llm_client(name: &str, config: &AppConfig) -> Result<Box<dyn LlmClient>, String> {
    let provider = match name {
        "groq" => ProviderName::Groq,
        "openai" => ProviderName::OpenAi,
        "claude" | "anthropic" => ProviderName::Claude,
        "gemini" | "google" => ProviderName::Gemini,
        other => return Err(format!("unknown provider '{other}'")),
    };

    let settings = config.provider(provider);
    let api_key = settings
        .api_key
        .ok_or_else(|| format!("no API key configured for provider '{name}' ({})", provider.env_var()))?;

    let timeout_secs = settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

    let client: Box<dyn LlmClient> = match provider {
        ProviderName::Groq => {
            let model = settings.model.unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string());
            let mut client = GroqClient::new(api_key, model).with_timeout_secs(timeout_secs);
            if let Some(base_url) = settings.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client)
        }
        ProviderName::OpenAi => {
            let model = settings.model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let mut client = OpenAiClient::new(api_key, model).with_timeout_secs(timeout_secs);
            if let Some(base_url) = settings.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client)
        }
        ProviderName::Claude => {
            let model = settings.model.unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string());
            let mut client = ClaudeClient::new(api_key, model).with_timeout_secs(timeout_secs);
            if let Some(base_url) = settings.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client)
        }
        ProviderName::Gemini => {
            let model = settings.model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
            let mut client = GeminiClient::new(api_key, model).with_timeout_secs(timeout_secs);
            if let Some(base_url) = settings.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client)
        }
    };

    Ok(client)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".weft").join("logs");
    let _guard = logging::init(&log_dir, args.verbose);

    let config_path = args.config.unwrap_or_else(|| {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".weft").join("application.properties")
    });

    let config = match AppConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let llm = match build_llm_client(&args.provider, &config) {
        Ok(client) => Arc::from(client),
        Err(e) => {
            eprintln!("failed to initialize LLM provider '{}': {e}", args.provider);
            std::process::exit(1);
        }
    };

    let manifest_path = args
        .mcp_manifest
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".weft").join(".mcp.json"));

    let descriptors = match manifest::load_or_create(&manifest_path) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load MCP manifest, starting with no tool servers");
            Vec::new()
        }
    };

    let registry = Arc::new(McpRegistry::connect_all(descriptors).await);
    let strategy_kind = parse_strategy(&args.strategy);
    let mut engine = Engine::new(llm, strategy_kind, registry);

    match args.message {
        Some(message) => {
            let reply = repl::run_one_turn(&mut engine, &message).await;
            println!("{reply}");
        }
        None => repl::run_repl_loop(&mut engine, &config).await,
    }
}
