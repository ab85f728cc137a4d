//! Genrun MCP Server.
//!
//! Exposes image and video generation as MCP tools over stdio or Streamable HTTP.

mod mcp;
mod summary;

use std::future::Future;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use genrun_engine::{Config, Engine};

use mcp::{create_mcp_router, GenrunMcpServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// MCP over stdin/stdout
    Stdio,
    /// MCP over Streamable HTTP at /mcp
    Http,
}

/// Genrun MCP server for image and video generation.
#[derive(Parser, Debug)]
#[command(name = "genrun-server", about = "Genrun MCP server for image and video generation")]
struct Args {
    /// Transport to serve MCP over
    #[arg(long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// HTTP listen address (http transport only)
    #[arg(long, default_value = "127.0.0.1:8765")]
    http_addr: String,

    /// API key for the generation providers
    #[arg(long, env = "GENRUN_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Image generation endpoint
    #[arg(long, env = "GENRUN_API_URL")]
    api_url: Option<String>,

    /// Image generation model
    #[arg(long, env = "GENRUN_MODEL")]
    model: Option<String>,

    /// Video job endpoint
    #[arg(long, env = "GENRUN_VIDEO_API_URL")]
    video_api_url: Option<String>,

    /// Default video model
    #[arg(long, env = "GENRUN_VIDEO_MODEL")]
    video_model: Option<String>,

    /// Timeout for one image generation call, in seconds
    #[arg(long, env = "GENRUN_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Timeout for downloads and job requests, in seconds
    #[arg(long, env = "GENRUN_FETCH_TIMEOUT_SECS")]
    fetch_timeout_secs: Option<u64>,

    /// Interval between video job status checks, in seconds
    #[arg(long, env = "GENRUN_POLL_INTERVAL_SECS")]
    poll_interval_secs: Option<u64>,

    /// Directory used when a caller passes an empty output_dir
    #[arg(long, env = "GENRUN_DEFAULT_OUTPUT_DIR")]
    default_output_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            api_key: self.api_key,
            api_url: self.api_url.unwrap_or(defaults.api_url),
            model: self.model.unwrap_or(defaults.model),
            video_api_url: self.video_api_url.unwrap_or(defaults.video_api_url),
            video_model: self.video_model.unwrap_or(defaults.video_model),
            request_timeout_secs: self.request_timeout_secs.unwrap_or(defaults.request_timeout_secs),
            fetch_timeout_secs: self.fetch_timeout_secs.unwrap_or(defaults.fetch_timeout_secs),
            poll_interval_secs: self.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
            default_output_dir: self.default_output_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Log to stderr; stdout carries the stdio protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("genrun=info".parse()?))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let transport = args.transport;
    let http_addr = args.http_addr.clone();
    let config = args.into_config();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    info!(
        transport = ?transport,
        model = %config.model,
        video_model = %config.video_model,
        "Genrun server starting"
    );

    let engine = Engine::from_config(&config);
    let ct = CancellationToken::new();
    spawn_signal_handler(ct.clone());

    match transport {
        Transport::Stdio => {
            let server = GenrunMcpServer::new(engine, ct.clone());
            let Some(service) = until_cancelled(&ct, server.serve(rmcp::transport::stdio())).await else {
                exit_on_shutdown();
            };
            let service = service?;

            match until_cancelled(&ct, service.waiting()).await {
                Some(Err(e)) => error!(error = %e, "MCP service error"),
                Some(Ok(_)) => {}
                None => exit_on_shutdown(),
            }
        }
        Transport::Http => {
            let router = create_mcp_router(engine, ct.clone()).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&http_addr).await?;
            info!(addr = %http_addr, "MCP HTTP server listening");

            let shutdown = ct.clone();
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;
        }
    }

    info!("Genrun server stopped");
    Ok(())
}

/// Race `fut` against shutdown. `None` means shutdown won.
async fn until_cancelled<F: Future>(ct: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = ct.cancelled() => None,
        output = fut => Some(output),
    }
}

/// Exit without waiting on the runtime.
///
/// Tokio reads stdin on a blocking thread that cannot be interrupted, so a
/// normal return would hang until the client closes its end.
fn exit_on_shutdown() -> ! {
    info!("Shutdown requested, abandoning in-flight work");
    info!("Genrun server stopped");
    std::process::exit(0)
}

/// Cancel `ct` on Ctrl-C or SIGTERM.
fn spawn_signal_handler(ct: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        info!("Received shutdown signal");
        ct.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_interrupts_pending_work() {
        let ct = CancellationToken::new();
        let trigger = ct.clone();
        tokio::spawn(async move { trigger.cancel() });

        let outcome = until_cancelled(&ct, std::future::pending::<()>()).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_work_finishes_without_shutdown() {
        let ct = CancellationToken::new();
        assert_eq!(until_cancelled(&ct, async { 7 }).await, Some(7));

        ct.cancel();
        assert_eq!(until_cancelled(&ct, async { 7 }).await, None);
    }

    #[test]
    fn test_arguments_override_defaults() {
        let args = Args::parse_from([
            "genrun-server",
            "--api-key",
            "sk-live",
            "--model",
            "other-model",
            "--poll-interval-secs",
            "3",
            "--transport",
            "http",
        ]);
        assert_eq!(args.transport, Transport::Http);

        let config = args.into_config();
        assert_eq!(config.api_key, "sk-live");
        assert_eq!(config.model, "other-model");
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.request_timeout_secs, Config::default().request_timeout_secs);
        assert!(config.validate().is_ok());
    }
}
