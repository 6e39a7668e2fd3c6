//! sp-gateway: SEO Pilot Gateway Main Binary
//!
//! Chat-driven headless-browser service: one browser session per
//! connected dashboard client, driven over a WebSocket event channel.
//!
//! Usage:
//!   sp-gateway           - Start the WebSocket server
//!   sp-gateway --help    - Show help
//!   sp-gateway --version - Show version

use std::sync::Arc;

use sp_browser::{BrowserConfig, ChromeLauncher, SessionRegistry};
use sp_core::{Assistant, Config};
use sp_ws::{WsState, start_ws_server};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Server mode
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args() {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("sp-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting sp-gateway...");
    if config.llm.api_key.is_empty() {
        tracing::warn!("No LLM API key configured; running with offline fallback responses");
    } else {
        tracing::info!("Model: {}", config.llm.model);
    }

    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("sp-gateway - SEO Pilot Gateway");
    println!();
    println!("Usage:");
    println!("  sp-gateway           Start the WebSocket server");
    println!("  sp-gateway --help    Show this help message");
    println!("  sp-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  LLM_API_KEY               API key (omit for offline fallback mode)");
    println!("  LLM_MODEL                 Model name (default: claude-sonnet-4-20250514)");
    println!("  LLM_PROVIDER              Provider: claude or openai (default: claude)");
    println!("  LLM_BASE_URL              Custom API endpoint");
    println!("  WS_PORT                   WebSocket server port (default: 3001)");
    println!("  ALLOWED_ORIGINS           Comma-separated CORS origins");
    println!("  BROWSER_HEADLESS          Run Chrome headless (default: true)");
    println!("  BROWSER_IDLE_TIMEOUT_SECS Idle session reclamation threshold");
}

/// Run server mode
async fn run_server(config: Config) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::new(&config.llm));

    // Session registry with the periodic idle sweep
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(ChromeLauncher::new()),
        BrowserConfig::from(&config.browser),
    ));
    let sweeper = registry.spawn_sweeper();
    tracing::info!(
        "Idle sweep every {}s, timeout {}s",
        config.browser.sweep_interval_secs,
        config.browser.idle_timeout_secs
    );

    let state = Arc::new(WsState {
        registry: Arc::clone(&registry),
        assistant,
        config,
    });

    let server = tokio::spawn(async move {
        if let Err(e) = start_ws_server(state).await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    tracing::info!("sp-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    server.abort();
    sweeper.abort();

    // Browser processes are external resources; close them explicitly
    registry.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
