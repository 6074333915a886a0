//! Deadline-bounded calls into the external text-generation backend.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Upper bound on a single generation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub type GenerateFuture<'a> = BoxFuture<'a, Result<GenerationResponse, BackendError>>;

/// A backend capable of turning a prompt into content blocks.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: GenerationRequest) -> GenerateFuture<'_>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
}

/// Raw backend reply before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    pub content: Vec<ContentBlock>,
}

impl GenerationResponse {
    /// Response holding a single text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text { text: String },
    Other { kind: String },
}

/// Transport or protocol failure reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for BackendError {}

/// Failure of one [`ResilientCaller::invoke`]. The context names the operation
/// for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Timeout { context: String, after: Duration },
    InvalidResponse { context: String, reason: &'static str },
    Backend { context: String, message: String },
}

impl CallError {
    #[must_use]
    pub fn context(&self) -> &str {
        match self {
            Self::Timeout { context, .. }
            | Self::InvalidResponse { context, .. }
            | Self::Backend { context, .. } => context,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { context, after } => {
                write!(f, "{context} timed out after {}ms", after.as_millis())
            }
            Self::InvalidResponse { context, reason } => {
                write!(f, "invalid response from generation backend during {context}: {reason}")
            }
            Self::Backend { context, message } => {
                write!(f, "generation backend failed during {context}: {message}")
            }
        }
    }
}

impl Error for CallError {}

/// Runs one backend request per call under a hard deadline and validates the
/// reply. Never retries.
pub struct ResilientCaller {
    backend: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl ResilientCaller {
    #[must_use]
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `prompt` with an optional system prompt and returns the text of the
    /// first content block.
    ///
    /// On expiry the backend future is dropped, which cancels the request for
    /// backends whose I/O is driven by that future. Backends that spawn their
    /// own work may keep running after the caller has been released.
    ///
    /// # Errors
    /// Returns `CallError::Timeout` when the deadline passes first,
    /// `CallError::Backend` when the backend fails, and
    /// `CallError::InvalidResponse` when the reply has no usable text block.
    pub async fn invoke(
        &self,
        prompt: String,
        context: &str,
        system: Option<&str>,
    ) -> Result<String, CallError> {
        let request = GenerationRequest {
            prompt,
            system: system
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string),
        };

        debug!(context, timeout_ms = self.timeout.as_millis(), "generation started");
        let response = match tokio::time::timeout(self.timeout, self.backend.generate(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(context, error = %err, "generation backend failed");
                return Err(CallError::Backend {
                    context: context.to_string(),
                    message: err.to_string(),
                });
            }
            Err(_) => {
                warn!(context, timeout_ms = self.timeout.as_millis(), "generation timed out");
                return Err(CallError::Timeout {
                    context: context.to_string(),
                    after: self.timeout,
                });
            }
        };

        extract_text(response).map_err(|reason| {
            warn!(context, reason, "generation response rejected");
            CallError::InvalidResponse {
                context: context.to_string(),
                reason,
            }
        })
    }
}

/// Returns the text of the first content block exactly as the backend sent it.
///
/// # Errors
/// Returns a short reason when there are no blocks, the first block is not
/// text, or its text is empty.
pub fn extract_text(response: GenerationResponse) -> Result<String, &'static str> {
    let Some(first) = response.content.into_iter().next() else {
        return Err("response contained no content blocks");
    };
    match first {
        ContentBlock::Text { text } if text.is_empty() => {
            Err("first content block has empty text")
        }
        ContentBlock::Text { text } => Ok(text),
        ContentBlock::Other { .. } => Err("first content block is not text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<GenerationResponse, BackendError>,
        delay: Option<Duration>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<GenerationResponse, BackendError>) -> Self {
            Self {
                reply,
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for Scripted {
        fn generate(&self, request: GenerationRequest) -> GenerateFuture<'_> {
            self.seen.lock().unwrap().push(request);
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                self.reply.clone()
            })
        }
    }

    #[tokio::test]
    async fn returns_first_text_block_verbatim() {
        let backend = Arc::new(Scripted::new(Ok(GenerationResponse {
            content: vec![
                ContentBlock::Text {
                    text: "  SELECT 1\n".to_string(),
                },
                ContentBlock::Text {
                    text: "ignored".to_string(),
                },
            ],
        })));
        let caller = ResilientCaller::new(backend.clone());

        let text = caller
            .invoke("prompt".to_string(), "test", Some("be terse"))
            .await
            .expect("invoke should succeed");

        assert_eq!(text, "  SELECT 1\n");
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].system.as_deref(), Some("be terse"));
    }

    #[tokio::test]
    async fn blank_system_prompt_is_omitted() {
        let backend = Arc::new(Scripted::new(Ok(GenerationResponse::text("ok"))));
        let caller = ResilientCaller::new(backend.clone());
        caller
            .invoke("prompt".to_string(), "test", Some("   "))
            .await
            .expect("invoke should succeed");
        assert_eq!(backend.seen.lock().unwrap()[0].system, None);
    }

    #[tokio::test]
    async fn times_out_slow_backend() {
        let mut scripted = Scripted::new(Ok(GenerationResponse::text("late")));
        scripted.delay = Some(Duration::from_secs(10));
        let caller =
            ResilientCaller::new(Arc::new(scripted)).with_timeout(Duration::from_millis(20));

        let err = caller
            .invoke("prompt".to_string(), "query generation", None)
            .await
            .expect_err("slow backend should time out");

        assert!(matches!(err, CallError::Timeout { .. }));
        assert_eq!(err.context(), "query generation");
    }

    #[tokio::test]
    async fn rejects_empty_content() {
        let caller = ResilientCaller::new(Arc::new(Scripted::new(Ok(GenerationResponse::default()))));
        let err = caller
            .invoke("prompt".to_string(), "test", None)
            .await
            .expect_err("empty content should be rejected");
        assert!(matches!(err, CallError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn rejects_non_text_first_block() {
        let caller = ResilientCaller::new(Arc::new(Scripted::new(Ok(GenerationResponse {
            content: vec![
                ContentBlock::Other {
                    kind: "tool_use".to_string(),
                },
                ContentBlock::Text {
                    text: "text".to_string(),
                },
            ],
        }))));
        let err = caller
            .invoke("prompt".to_string(), "test", None)
            .await
            .expect_err("non-text block should be rejected");
        assert_eq!(
            err,
            CallError::InvalidResponse {
                context: "test".to_string(),
                reason: "first content block is not text",
            }
        );
    }

    #[tokio::test]
    async fn rejects_empty_text() {
        let caller =
            ResilientCaller::new(Arc::new(Scripted::new(Ok(GenerationResponse::text("")))));
        let err = caller
            .invoke("prompt".to_string(), "test", None)
            .await
            .expect_err("empty text should be rejected");
        assert_eq!(
            err,
            CallError::InvalidResponse {
                context: "test".to_string(),
                reason: "first content block has empty text",
            }
        );
    }

    #[tokio::test]
    async fn whitespace_text_passes_through() {
        let caller =
            ResilientCaller::new(Arc::new(Scripted::new(Ok(GenerationResponse::text(" ")))));
        let text = caller
            .invoke("prompt".to_string(), "test", None)
            .await
            .expect("whitespace is still text");
        assert_eq!(text, " ");

        assert_eq!(
            extract_text(GenerationResponse::text("SELECT 1;\n")),
            Ok("SELECT 1;\n".to_string())
        );
    }

    #[tokio::test]
    async fn surfaces_backend_failure() {
        let caller = ResilientCaller::new(Arc::new(Scripted::new(Err(BackendError::new(
            "HTTP 500",
        )))));
        let err = caller
            .invoke("prompt".to_string(), "test", None)
            .await
            .expect_err("backend failure should surface");
        assert_eq!(
            err.to_string(),
            "generation backend failed during test: HTTP 500"
        );
    }
}
