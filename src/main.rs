//! MATLAB MCP server binary
//!
//! Starts a MATLAB-compatible interpreter, then serves `runMatlabCode` and
//! `getVariable` over stdio until the MCP client disconnects.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use matlab_mcp::config::BridgeConfig;
use matlab_mcp::session::ProcessSession;
use matlab_mcp::{logging, mcp_server, Bridge, ExecutionEngine};

#[derive(Parser)]
#[command(name = "matlab-mcp")]
#[command(about = "MCP server for running code in a MATLAB session")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interpreter executable, overriding the configuration
    #[arg(short, long)]
    executable: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if let Some(executable) = cli.executable {
        config.engine.executable = executable;
        config.validate()?;
    }
    logging::init(&config.log_filter, cli.verbose);

    let engine_config = config.engine.clone();
    let session = tokio::task::spawn_blocking(move || ProcessSession::spawn(&engine_config))
        .await
        .context("MATLAB startup task failed")?
        .map_err(|e| {
            error!("Could not start MATLAB session: {}", e);
            anyhow::anyhow!("could not start MATLAB session: {}", e)
        })?;
    info!(
        "Scratch scripts go to {}",
        config.scratch.resolved_directory().display()
    );

    let bridge = Bridge::new(Arc::new(session), ExecutionEngine::new(config.scratch));
    mcp_server::serve_stdio(bridge).await
}
