//! Service composition: store, caller and description cache behind one handle.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::anthropic::{
    AnthropicClient,
    AnthropicConfig,
    DEFAULT_API_BASE_URL,
    DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL,
};
use crate::description::ServiceDescriptionCache;
use crate::generation::{BackendError, CallError, DEFAULT_TIMEOUT, ResilientCaller};
use crate::prompts::{self, PromptKind};
use crate::store::{DocumentationSnapshot, DocumentationStore, StoreConfig};

/// Name of the credential the service cannot start without.
pub const API_KEY_SETTING: &str = "ANTHROPIC_API_KEY";

#[derive(Debug)]
pub enum ServiceError {
    ConfigurationMissing(&'static str),
    Backend(BackendError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationMissing(name) => write!(f, "missing required configuration: {name}"),
            Self::Backend(err) => write!(f, "failed to initialize generation backend: {err}"),
        }
    }
}

impl Error for ServiceError {}

/// Settings needed to construct a [`DocQaService`].
#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub api_base_url: String,
    pub docs_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub timeout: Duration,
}

impl ServiceConfig {
    #[must_use]
    pub fn new(docs_dir: impl Into<PathBuf>, prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            docs_dir: docs_dir.into(),
            prompts_dir: prompts_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.docs_dir.clone(), self.prompts_dir.clone())
    }
}

/// Shared handle used by every request. Clones share all state.
#[derive(Clone)]
pub struct DocQaService {
    store: Arc<DocumentationStore>,
    caller: Arc<ResilientCaller>,
    description: Arc<ServiceDescriptionCache>,
}

impl DocQaService {
    /// Builds the Anthropic-backed service and performs the initial load.
    ///
    /// # Errors
    /// Returns `ServiceError::ConfigurationMissing` when no API key is set and
    /// `ServiceError::Backend` when the HTTP client cannot be built.
    pub async fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ServiceError::ConfigurationMissing(API_KEY_SETTING))?;

        let client = AnthropicClient::new(
            AnthropicConfig::new(api_key)
                .with_model(config.model.clone())
                .with_max_tokens(config.max_tokens)
                .with_base_url(config.api_base_url.clone()),
        )
        .map_err(ServiceError::Backend)?;
        info!(model = client.model(), timeout_ms = config.timeout.as_millis(), "generation backend ready");

        let caller = ResilientCaller::new(Arc::new(client)).with_timeout(config.timeout);
        Ok(Self::open(DocumentationStore::new(config.store_config()), caller).await)
    }

    /// Loads `store` from disk, then wraps it.
    pub async fn open(store: DocumentationStore, caller: ResilientCaller) -> Self {
        store.load().await;
        Self::new(store, caller)
    }

    /// Wraps an already populated store. A persisted description in the
    /// current snapshot seeds the cache.
    #[must_use]
    pub fn new(store: DocumentationStore, caller: ResilientCaller) -> Self {
        let description = ServiceDescriptionCache::new();
        description.reset(persisted_description(&store.snapshot()));
        Self {
            store: Arc::new(store),
            caller: Arc::new(caller),
            description: Arc::new(description),
        }
    }

    #[must_use]
    pub fn store(&self) -> &DocumentationStore {
        &self.store
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<DocumentationSnapshot> {
        self.store.snapshot()
    }

    /// Cached description, without triggering a computation.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.description.get()
    }

    /// Returns the description, computing it once if absent. Failures are
    /// logged and yield an empty string.
    pub async fn ensure_description(&self) -> String {
        let store = self.store.clone();
        let caller = self.caller.clone();
        self.description
            .ensure(move || {
                let snapshot = store.snapshot();
                Box::pin(async move {
                    let kind = PromptKind::DescriptionAnalysis;
                    let prompt = prompts::description_prompt(&snapshot);
                    match caller
                        .invoke(prompt, kind.context(), snapshot.fragments().system_prompt())
                        .await
                    {
                        Ok(description) => {
                            info!(description = %description, "service description computed");
                            Some(description)
                        }
                        Err(err) => {
                            warn!(error = %err, "service description unavailable");
                            None
                        }
                    }
                })
            })
            .await
    }

    /// Generates a query for `request` from the current snapshot.
    ///
    /// # Errors
    /// Returns the `CallError` of the single upstream attempt.
    pub async fn generate_query(&self, request: &str) -> Result<String, CallError> {
        self.run(PromptKind::QueryGeneration, request).await
    }

    /// Answers `request` from the current snapshot.
    ///
    /// # Errors
    /// Returns the `CallError` of the single upstream attempt.
    pub async fn answer_documentation(&self, request: &str) -> Result<String, CallError> {
        self.run(PromptKind::DocumentationAnswer, request).await
    }

    /// Re-reads the corpus and fragments, swaps the snapshot in one step and
    /// restarts the description cycle.
    pub async fn reload(&self) -> Arc<DocumentationSnapshot> {
        let snapshot = self.store.load().await;
        self.description.reset(persisted_description(&snapshot));
        snapshot
    }

    async fn run(&self, kind: PromptKind, request: &str) -> Result<String, CallError> {
        let snapshot = self.store.snapshot();
        let prompt = prompts::assemble(kind, &snapshot, request);
        self.caller
            .invoke(prompt, kind.context(), snapshot.fragments().system_prompt())
            .await
    }
}

fn persisted_description(snapshot: &DocumentationSnapshot) -> Option<String> {
    snapshot
        .fragments()
        .service_description()
        .map(str::to_string)
}
