//! Daemon entry point for the docqa MCP server.
//!
//! Loads configuration from the environment, loads the documentation corpus,
//! and serves the MCP protocol over stdio or streamable HTTP. Diagnostics are
//! written to stderr so stdout carries protocol frames only.

mod config;

use docqa_core::service::DocQaService;
use docqa_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::DocQaConfig;

const DEFAULT_LOG_FILTER: &str = "docqa_core=info,docqa_mcp=info,docqa_mcpd=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = DocQaConfig::from_args()?;
    let service = DocQaService::from_config(config.service_config()).await?;
    let _reloader = spawn_reload_on_hangup(service.clone());

    if config.http {
        let http_config =
            McpHttpServerConfig::new(config.http_addr).with_stateful_mode(!config.http_stateless);
        serve_streamable_http(service, http_config).await
    } else {
        serve_stdio(service).await
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Reloads documentation and prompt fragments whenever the process gets SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(service: DocQaService) -> Option<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(err) => {
            tracing::warn!(error = %err, "SIGHUP reload disabled");
            return None;
        }
    };
    Some(tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            let snapshot = service.reload().await;
            info!(entries = snapshot.entries().len(), "documentation reloaded");
        }
    }))
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_service: DocQaService) -> Option<tokio::task::JoinHandle<()>> {
    None
}
