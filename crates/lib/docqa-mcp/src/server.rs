//! MCP server runners for docqa-mcp.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use docqa_core::service::DocQaService;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::DocQaMcp;

pub const DEFAULT_HTTP_PORT: u16 = 4020;

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_HTTP_PORT)))
    }
}

/// Serves the MCP server over stdio. Only protocol frames are written to stdout.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(
    service: DocQaService,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handler = DocQaMcp::new(service);
    let (stdin, stdout) = stdio();
    info!("docqa-mcp serving over stdio");
    let running = serve_server(handler, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Builds the HTTP application: `/health` for liveness and `/mcp` for the
/// streamable HTTP transport.
///
/// Every session shares the same service, so the description cache and the
/// documentation snapshot are common to all sessions.
#[must_use]
pub fn router(service: DocQaService, config: &McpHttpServerConfig) -> Router {
    let http_service: StreamableHttpService<DocQaMcp, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(DocQaMcp::new(service.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", http_service)
}

/// Serves the MCP server using streamable HTTP transport.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http(
    service: DocQaService,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(service, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        addr = %config.addr,
        stateful = config.stateful_mode,
        "docqa-mcp listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_config_binds_localhost() {
        let config = McpHttpServerConfig::default();
        assert_eq!(config.addr.to_string(), "127.0.0.1:4020");
        assert!(config.stateful_mode);
        assert!(!config.with_stateful_mode(false).stateful_mode);
    }
}
