//! Scriptorium MCP server binary.
//!
//! Serves one text document to MCP clients over stdio (default) or
//! streamable HTTP.
//!
//! Usage:
//!   # stdio, for clients that spawn the server
//!   scriptorium
//!
//!   # HTTPS on localhost:5000/mcp with a bearer key
//!   SCRIPTORIUM_API_KEY=secret scriptorium --transport http
//!
//! Test with MCP inspector:
//!   npx @modelcontextprotocol/inspector cargo run -p scriptorium-mcp

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scriptorium_editor::spawn_editor;
use scriptorium_mcp::config::{Overrides, TransportConfig};
use scriptorium_mcp::lifecycle::spawn_listener;
use scriptorium_mcp::transport::Listener;

/// MCP server exposing a single text document.
#[derive(Parser, Debug)]
#[command(name = "scriptorium")]
#[command(about = "MCP server exposing a single text document", version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/scriptorium/config.ron)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport: stdio or http
    #[arg(short, long)]
    transport: Option<String>,

    /// Bind URL for the http transport, e.g. https://localhost:5000
    #[arg(long)]
    url: Option<String>,

    /// Path the MCP endpoint is served on
    #[arg(long)]
    mcp_path: Option<String>,

    /// File to open before accepting requests
    #[arg(long)]
    open: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Logs go to stderr: stdout carries the protocol in stdio mode
    let _otel_guard = init_tracing();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match args.config.or_else(TransportConfig::default_path) {
        Some(path) => TransportConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TransportConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_overrides(Overrides {
        mode: args.transport,
        url: args.url,
        mcp_path: args.mcp_path,
    });
    tracing::debug!(?config, "Effective configuration");

    let (editor, owner, ready) = spawn_editor(args.open).context("starting document owner")?;

    let listener = Listener::from_config(&config);
    tracing::info!(transport = listener.name(), "scriptorium starting");
    let listener = spawn_listener(listener, editor, owner.control(), ready)
        .context("starting listener thread")?;

    owner.join().context("document owner")?;
    let served = listener
        .join()
        .map_err(|_| anyhow::anyhow!("listener thread panicked"))?;

    tracing::info!("scriptorium shut down");
    served
}

#[cfg(feature = "telemetry")]
fn init_tracing() -> Option<scriptorium_telemetry::OtelGuard> {
    let registry = tracing_subscriber::registry().with(env_filter()).with(fmt_layer());

    if scriptorium_telemetry::otel_enabled() {
        match scriptorium_telemetry::otel_layer("scriptorium") {
            Ok((otel, guard)) => {
                registry.with(otel).init();
                return Some(guard);
            }
            Err(e) => eprintln!("OpenTelemetry disabled: {e}"),
        }
    }
    registry.init();
    None
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing() {
    tracing_subscriber::registry().with(env_filter()).with(fmt_layer()).init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer().with_writer(std::io::stderr).with_ansi(false)
}
