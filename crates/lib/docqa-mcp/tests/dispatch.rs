use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use docqa_core::generation::{
    BackendError,
    GenerateFuture,
    GenerationRequest,
    GenerationResponse,
    ResilientCaller,
    TextGenerator,
};
use docqa_core::service::DocQaService;
use docqa_core::store::{
    DocumentationEntry,
    DocumentationSnapshot,
    DocumentationStore,
    PromptFragments,
    StoreConfig,
};
use docqa_mcp::DocQaMcp;
use docqa_mcp::tools::{CREATE_QUERY_TOOL, DOCUMENTATION_TOOL, FALLBACK_SUBJECT};
use rmcp::model::{CallToolResult, ErrorCode, JsonObject};
use serde_json::{Value, json};

/// Answers description prompts with a fixed summary and echoes everything else.
struct FakeBackend {
    calls: AtomicUsize,
    description_calls: AtomicUsize,
    delay: Duration,
    fail_description: bool,
    reply: Result<GenerationResponse, BackendError>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            description_calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail_description: false,
            reply: Ok(GenerationResponse::text("SELECT * FROM items")),
        }
    }
}

impl TextGenerator for FakeBackend {
    fn generate(&self, request: GenerationRequest) -> GenerateFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_description = request.prompt.contains("describe what this service");
        if is_description {
            self.description_calls.fetch_add(1, Ordering::SeqCst);
        }
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            if is_description {
                if self.fail_description {
                    return Ok(GenerationResponse::default());
                }
                return Ok(GenerationResponse::text("An Inventory API."));
            }
            self.reply.clone()
        })
    }
}

fn handler_with(backend: Arc<FakeBackend>, timeout: Duration) -> DocQaMcp {
    let snapshot = DocumentationSnapshot::new(
        [DocumentationEntry::new("items.md", "Items have an id and a name.")],
        PromptFragments::default(),
    );
    let store = DocumentationStore::with_snapshot(StoreConfig::new("docs", "prompts"), snapshot);
    let caller = ResilientCaller::new(backend).with_timeout(timeout);
    DocQaMcp::new(DocQaService::new(store, caller))
}

fn handler(backend: Arc<FakeBackend>) -> DocQaMcp {
    handler_with(backend, Duration::from_secs(5))
}

fn args(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => panic!("arguments must be an object"),
    }
}

fn single_text(result: &CallToolResult) -> &str {
    assert_eq!(result.content.len(), 1, "expected a single content item");
    &result.content[0]
        .as_text()
        .expect("content should be text")
        .text
}

#[tokio::test]
async fn both_tools_return_single_text_item() {
    let backend = Arc::new(FakeBackend::new());
    let mcp = handler(backend);

    for tool in [CREATE_QUERY_TOOL, DOCUMENTATION_TOOL] {
        let arguments = args(json!({ "request": "list every item" }));
        let result = mcp
            .dispatch(tool, Some(&arguments))
            .await
            .unwrap_or_else(|err| panic!("{tool} should succeed: {err:?}"));
        assert_eq!(single_text(&result), "SELECT * FROM items");
    }
}

#[tokio::test]
async fn empty_request_is_invalid_for_both_tools() {
    let backend = Arc::new(FakeBackend::new());
    let mcp = handler(backend.clone());

    for tool in [CREATE_QUERY_TOOL, DOCUMENTATION_TOOL] {
        let arguments = args(json!({ "request": "" }));
        let err = mcp
            .dispatch(tool, Some(&arguments))
            .await
            .expect_err("empty request should be rejected");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("request"));
        let data = err.data.expect("violations should be attached");
        assert_eq!(data["violations"][0]["field"], "request");
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_arguments_are_invalid() {
    let mcp = handler(Arc::new(FakeBackend::new()));
    let err = mcp
        .dispatch(CREATE_QUERY_TOOL, None)
        .await
        .expect_err("missing arguments should be rejected");
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn unknown_tool_is_rejected() {
    let backend = Arc::new(FakeBackend::new());
    let mcp = handler(backend.clone());
    let arguments = args(json!({ "request": "anything" }));

    let err = mcp
        .dispatch("delete-everything", Some(&arguments))
        .await
        .expect_err("unknown tool should be rejected");

    assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
    assert!(err.message.contains("delete-everything"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timeout_becomes_error_text() {
    let mut backend = FakeBackend::new();
    backend.delay = Duration::from_secs(10);
    let mcp = handler_with(Arc::new(backend), Duration::from_millis(20));

    let arguments = args(json!({ "request": "list every item" }));
    let query = mcp
        .dispatch(CREATE_QUERY_TOOL, Some(&arguments))
        .await
        .expect("timeouts are returned as content");
    assert!(
        single_text(&query)
            .starts_with("Error: Unable to generate query for request: \"list every item\"")
    );

    let answer = mcp
        .dispatch(DOCUMENTATION_TOOL, Some(&arguments))
        .await
        .expect("timeouts are returned as content");
    assert!(
        single_text(&answer)
            .starts_with("Error: Unable to process documentation request: \"list every item\"")
    );
}

async fn assert_failure_texts(backend: FakeBackend, cause: &str) {
    let mcp = handler(Arc::new(backend));
    let arguments = args(json!({ "request": "list every item" }));

    let expected = [
        (CREATE_QUERY_TOOL, "Error: Unable to generate query for request: \"list every item\". "),
        (DOCUMENTATION_TOOL, "Error: Unable to process documentation request: \"list every item\". "),
    ];
    for (tool, prefix) in expected {
        let result = mcp
            .dispatch(tool, Some(&arguments))
            .await
            .unwrap_or_else(|err| panic!("{tool} failures are returned as content: {err:?}"));
        let text = single_text(&result);
        assert!(text.starts_with(prefix), "{tool}: {text}");
        assert!(text.contains(cause), "{tool}: {text}");
    }
}

#[tokio::test]
async fn malformed_reply_becomes_error_text() {
    let mut backend = FakeBackend::new();
    backend.reply = Ok(GenerationResponse::default());
    assert_failure_texts(backend, "response contained no content blocks").await;
}

#[tokio::test]
async fn backend_failure_becomes_error_text() {
    let mut backend = FakeBackend::new();
    backend.reply = Err(BackendError::new("HTTP 529: overloaded"));
    assert_failure_texts(backend, "HTTP 529: overloaded").await;
}

#[tokio::test]
async fn listing_tools_computes_description_once() {
    let backend = Arc::new(FakeBackend::new());
    let mcp = handler(backend.clone());
    assert_eq!(mcp.service().description(), None);

    let tools = mcp.tool_descriptors().await;
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, CREATE_QUERY_TOOL);
    assert_eq!(tools[1].name, DOCUMENTATION_TOOL);
    assert!(
        tools[0]
            .description
            .as_deref()
            .unwrap_or_default()
            .contains("an inventory api")
    );
    assert_eq!(
        mcp.service().description().as_deref(),
        Some("An Inventory API.")
    );

    let again = mcp.tool_descriptors().await;
    assert_eq!(again.len(), 2);
    assert_eq!(backend.description_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_listings_share_one_description_call() {
    let mut backend = FakeBackend::new();
    backend.delay = Duration::from_millis(20);
    let backend = Arc::new(backend);
    let mcp = handler(backend.clone());

    let listings = futures::future::join_all((0..4).map(|_| mcp.tool_descriptors())).await;

    assert!(listings.iter().all(|tools| tools.len() == 2));
    assert_eq!(backend.description_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_description_falls_back_without_blocking_listing() {
    let mut backend = FakeBackend::new();
    backend.fail_description = true;
    let mcp = handler(Arc::new(backend));

    let tools = mcp.tool_descriptors().await;

    assert_eq!(tools.len(), 2);
    assert!(
        tools[1]
            .description
            .as_deref()
            .unwrap_or_default()
            .contains(FALLBACK_SUBJECT)
    );
    assert_eq!(mcp.service().description(), None);
}
