//! CLI entrypoint for Harbor
//!
//! Loads one Lua script, runs it once to completion (the script registers
//! its tools and may call the provider capabilities directly), then
//! optionally drives one conversation session against the registered tools.
//! Uncaught script failures are reported to the operator; the host process
//! itself never crashes on them.

use anyhow::{Context, Result};
use clap::Parser;
use harbor_application::{LlmGateway, RunConversationInput, RunConversationUseCase, WebSearchPort};
use harbor_infrastructure::{
    ConfigLoader, DuckDuckGoSearch, HttpChatGateway, JsonlConversationLogger, LuaScriptingEngine,
    RetryingGateway, ToolRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "harbor", version, about = "Script host with an LLM tool-calling loop")]
struct Cli {
    /// Path to the Lua script to load and run
    script: PathBuf,

    /// Run one conversation session with this prompt after the script completes
    #[arg(long)]
    ask: Option<String>,

    /// Explicit config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip config file discovery and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Arguments passed through to the script as the `arg` table
    #[arg(trailing_var_arg = true)]
    script_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting harbor");

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow::anyhow!("config error: {}", e))?
    };

    // === Dependency Injection ===
    let cancel = CancellationToken::new();
    let loop_config = config.loop_config();

    let registry = Arc::new(
        ToolRegistry::with_timeout(loop_config.tool_timeout()).with_cancellation(cancel.clone()),
    );
    let gateway = Arc::new(RetryingGateway::new(
        HttpChatGateway::new(config.provider.clone())?,
        config.retry_policy(),
    ));
    let search: Arc<dyn WebSearchPort> = Arc::new(DuckDuckGoSearch::new(config.search.clone())?);
    let script_gateway: Arc<dyn LlmGateway> = gateway.clone();

    let engine = Arc::new(LuaScriptingEngine::new(
        Arc::clone(&registry),
        script_gateway,
        search,
        cancel.clone(),
    )?);

    // Ctrl-C flips the session token; scripts observe it via harbor.interrupted()
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received; cancelling session");
                cancel.cancel();
            }
        });
    }

    // Run the script on a blocking thread: provider calls from Lua park the
    // calling thread, which must not be a runtime worker.
    let script_path = cli.script.clone();
    let script_args = cli.script_args.clone();
    let load_engine = Arc::clone(&engine);
    let load_result = tokio::task::spawn_blocking(move || {
        use harbor_application::ScriptingEnginePort;
        load_engine.set_script_args(&script_path.to_string_lossy(), &script_args)?;
        load_engine.load_script(&script_path)
    })
    .await
    .context("script thread panicked")?;

    if let Err(e) = load_result {
        // Script-level failure: report it, exit cleanly
        error!("Script failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }

    info!(tools = registry.len(), "Script completed");

    // Optional conversation session against the registered tools
    if let Some(prompt) = cli.ask {
        let mut use_case =
            RunConversationUseCase::new(Arc::clone(&gateway), Arc::clone(&registry), loop_config)
                .with_cancellation(cancel.clone());

        if let Some(log_path) = &config.log.conversation_log
            && let Some(logger) = JsonlConversationLogger::new(log_path)
        {
            info!(path = %logger.path().display(), "Conversation log enabled");
            use_case = use_case.with_logger(Arc::new(logger));
        }

        let output = use_case
            .execute(RunConversationInput::new(prompt))
            .await
            .context("conversation session failed")?;

        info!(
            model_calls = output.model_calls,
            tool_dispatches = output.tool_dispatches,
            "Session complete"
        );
        println!("{}", output.final_text);
    }

    Ok(())
}
