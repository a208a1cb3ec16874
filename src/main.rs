//! mcp-duplex: dual-transport Model Context Protocol server
//!
//! Demo host exposing calculator and echo tools plus a small documentation
//! resource/prompt set over stdio, HTTP + SSE, or both at once. All logging
//! goes to stderr; stdout belongs to the stdio transport.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use mcp_duplex::config::{HttpConfig, StdioConfig};
use mcp_duplex::engine::ServerBuilder;
use mcp_duplex::handlers::{CalculatorTools, Documentation, EchoTool, ToolSet};
use mcp_duplex::transport::{HttpSseTransport, StdioTransport, Transport};

/// Which transports to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HTTP + SSE only.
    Http,
    /// Standard streams only.
    Stdio,
    /// Both transports on one engine.
    Both,
}

/// Dual-transport Model Context Protocol server.
///
/// Serves tools, resources, and prompts to MCP clients over newline-
/// delimited stdio, HTTP + Server-Sent-Events, or both at once.
#[derive(Parser, Debug)]
#[command(name = "mcp-duplex")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transport mode
    #[arg(long, value_enum, default_value_t = Mode::Stdio)]
    mode: Mode,

    /// Bind address for the HTTP transport
    #[arg(long, value_name = "HOST:PORT", default_value = "127.0.0.1:8080")]
    addr: String,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
fn get_log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Splits a `host:port` string.
fn parse_addr(addr: &str) -> Result<(String, u16), String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| format!("expected HOST:PORT, got: {addr}"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid port in address: {addr}"))?;
    Ok((host.to_string(), port))
}

/// Cancels the root token on SIGINT or SIGTERM.
fn spawn_signal_handler(root: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("shutdown signal received");
        root.cancel();
    });
}

/// Builds the engine and runs the requested transports until shutdown.
async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ServerBuilder::new("mcp-duplex", env!("CARGO_PKG_VERSION"))
        .with_tool_handler(ToolSet::new().with(CalculatorTools::new()).with(EchoTool::new()))
        .with_resource_handler(Documentation::new())
        .with_prompt_handler(Documentation::new())
        .build();

    let root = CancellationToken::new();
    spawn_signal_handler(root.clone());

    let mut transports: Vec<Arc<dyn Transport>> = Vec::new();
    let mut lifetimes: Vec<CancellationToken> = Vec::new();

    if matches!(args.mode, Mode::Http | Mode::Both) {
        let (host, port) = parse_addr(&args.addr)?;
        let http = Arc::new(HttpSseTransport::new(HttpConfig::with_addr(host, port))?);

        // Engine-originated notifications fan out to the SSE sessions.
        engine.attach_transport(http.clone());
        http.start(root.child_token(), engine.message_handler())
            .await?;

        lifetimes.push(http.closed_token());
        transports.push(http);
    }

    if matches!(args.mode, Mode::Stdio | Mode::Both) {
        let stdio = Arc::new(StdioTransport::stdio(StdioConfig::default()));

        if args.mode == Mode::Stdio {
            engine.attach_transport(stdio.clone());
        }
        stdio
            .start(root.child_token(), engine.message_handler())
            .await?;

        lifetimes.push(stdio.closed_token());
        transports.push(stdio);
    }

    info!(mode = ?args.mode, "server ready, waiting for clients");

    // Run until the process is signalled or every transport has closed
    // on its own (stdio EOF, listener failure).
    tokio::select! {
        () = root.cancelled() => {}
        () = async {
            for lifetime in lifetimes {
                lifetime.cancelled_owned().await;
            }
        } => {}
    }

    for transport in &transports {
        if let Err(e) = transport.close().await {
            error!(error = %e, "error closing transport");
        }
    }

    Ok(())
}

/// Entry point for the mcp-duplex server.
fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(get_log_level(args.verbose, args.quiet));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting mcp-duplex server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parse_addr_splits_host_and_port() {
        assert_eq!(
            parse_addr("127.0.0.1:8080").unwrap(),
            ("127.0.0.1".to_string(), 8080)
        );
        assert!(parse_addr("no-port").is_err());
        assert!(parse_addr("host:not-a-port").is_err());
    }

    #[test]
    fn quiet_beats_verbose() {
        assert_eq!(get_log_level(3, true), Level::ERROR);
        assert_eq!(get_log_level(0, false), Level::INFO);
        assert_eq!(get_log_level(2, false), Level::TRACE);
    }
}
