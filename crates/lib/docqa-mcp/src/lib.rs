//! MCP server implementation for docqa-mcp.
//!
//! Exposes two tools, `create-query` and `documentation`, whose descriptions are
//! enriched with the lazily computed service description. Arguments are
//! validated here; prompt assembly and the upstream call live in `docqa-core`.

mod helpers;
pub mod server;
pub mod tools;

use std::error::Error;
use std::fmt;
use std::time::Instant;

use docqa_core::service::DocQaService;
use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    Content,
    ErrorCode,
    JsonObject,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
    Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use tracing::{info, warn};

use crate::tools::{FieldViolation, ToolName, ToolRequest};

const SERVER_INSTRUCTIONS: &str = r"docqa-mcp answers from a fixed local documentation corpus.

Tools:
- `create-query`: describe what you need in natural language; returns only the generated query.
- `documentation`: ask a question; the answer is based solely on the loaded documentation.

Both tools take a single non-empty string argument, `request`.
If the generation backend fails, the tool still returns text starting with `Error:`.";

/// Protocol-level rejection of a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    InvalidArguments(Vec<FieldViolation>),
    UnknownTool(String),
}

impl DispatchError {
    const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::UnknownTool(_) => "unknown_tool",
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments(violations) => {
                let details = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "invalid arguments: {details}")
            }
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
        }
    }
}

impl Error for DispatchError {}

impl From<DispatchError> for ErrorData {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::InvalidArguments(violations) => {
                let fields = violations
                    .iter()
                    .map(|violation| {
                        serde_json::json!({
                            "field": violation.field,
                            "reason": violation.reason,
                        })
                    })
                    .collect::<Vec<_>>();
                helpers::mcp_err_with_data(
                    ErrorCode::INVALID_PARAMS,
                    message,
                    Some(serde_json::json!({ "violations": fields })),
                )
            }
            DispatchError::UnknownTool(_) => helpers::mcp_err(ErrorCode::METHOD_NOT_FOUND, message),
        }
    }
}

/// Text reply of a routed call, flagged when it carries an upstream failure.
struct ToolReply {
    text: String,
    upstream_failed: bool,
}

/// MCP server wrapper around the documentation service.
#[derive(Clone)]
pub struct DocQaMcp {
    service: DocQaService,
}

impl DocQaMcp {
    #[must_use]
    pub const fn new(service: DocQaService) -> Self {
        Self { service }
    }

    #[must_use]
    pub const fn service(&self) -> &DocQaService {
        &self.service
    }

    /// Builds the advertised tools, computing the service description first if
    /// it is not cached yet.
    pub async fn tool_descriptors(&self) -> Vec<Tool> {
        let description = self.service.ensure_description().await;
        tools::tool_descriptors(Some(description.as_str()))
    }

    /// Validates and routes one tool call.
    ///
    /// # Errors
    /// Returns `INVALID_PARAMS` for malformed arguments and `METHOD_NOT_FOUND`
    /// for unknown tools. Upstream failures are returned as successful text.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        info!(tool = name, "tool call started");

        let routed = self.route(name, arguments).await;
        let elapsed_ms = started.elapsed().as_millis();
        match &routed {
            Ok(reply) if reply.upstream_failed => {
                warn!(tool = name, elapsed_ms, outcome = "upstream_error", "tool call finished");
            }
            Ok(_) => info!(tool = name, elapsed_ms, outcome = "ok", "tool call finished"),
            Err(err) => {
                warn!(tool = name, elapsed_ms, outcome = err.outcome(), error = %err, "tool call rejected");
            }
        }

        let reply = routed?;
        Ok(CallToolResult::success(vec![Content::text(reply.text)]))
    }

    async fn route(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<ToolReply, DispatchError> {
        let ToolRequest { request } =
            tools::validate_arguments(arguments).map_err(DispatchError::InvalidArguments)?;
        let tool =
            ToolName::parse(name).ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let outcome = match tool {
            ToolName::CreateQuery => self.service.generate_query(&request).await,
            ToolName::Documentation => self.service.answer_documentation(&request).await,
        };

        Ok(match outcome {
            Ok(text) => ToolReply {
                text,
                upstream_failed: false,
            },
            Err(err) => ToolReply {
                text: tool.failure_text(&request, &err),
                upstream_failed: true,
            },
        })
    }
}

impl ServerHandler for DocQaMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tool_descriptors().await))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.dispatch(&request.name, request.arguments.as_ref()).await
    }
}
