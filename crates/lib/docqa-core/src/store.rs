//! Documentation corpus and prompt fragment storage.
//!
//! A load cycle reads everything into an immutable [`DocumentationSnapshot`]
//! and swaps it in with a single pointer replacement. Readers clone the current
//! `Arc` once per request, so they always observe documentation and fragments
//! from the same load cycle.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

/// File extensions accepted into the documentation corpus.
pub const DOC_EXTENSIONS: [&str; 3] = ["txt", "md", "json"];

pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";
pub const TOOL_METADATA_FILE: &str = "tool_metadata.txt";
pub const QUERY_METADATA_FILE: &str = "query_metadata.txt";
pub const SERVICE_DESCRIPTION_FILE: &str = "service_description.txt";

/// A single documentation file keyed by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationEntry {
    pub name: String,
    pub content: String,
}

impl DocumentationEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Optional prompt augmentations. An empty value means "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptFragments {
    system_prompt: String,
    tool_metadata: String,
    query_metadata: String,
    service_description: String,
}

impl PromptFragments {
    #[must_use]
    pub fn with_system_prompt(mut self, value: impl Into<String>) -> Self {
        self.system_prompt = normalize_fragment(value.into());
        self
    }

    #[must_use]
    pub fn with_tool_metadata(mut self, value: impl Into<String>) -> Self {
        self.tool_metadata = normalize_fragment(value.into());
        self
    }

    #[must_use]
    pub fn with_query_metadata(mut self, value: impl Into<String>) -> Self {
        self.query_metadata = normalize_fragment(value.into());
        self
    }

    #[must_use]
    pub fn with_service_description(mut self, value: impl Into<String>) -> Self {
        self.service_description = normalize_fragment(value.into());
        self
    }

    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        present(&self.system_prompt)
    }

    #[must_use]
    pub fn tool_metadata(&self) -> Option<&str> {
        present(&self.tool_metadata)
    }

    #[must_use]
    pub fn query_metadata(&self) -> Option<&str> {
        present(&self.query_metadata)
    }

    /// Description persisted by a setup step, if any.
    #[must_use]
    pub fn service_description(&self) -> Option<&str> {
        present(&self.service_description)
    }
}

/// Everything produced by one load cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentationSnapshot {
    entries: Vec<DocumentationEntry>,
    fragments: PromptFragments,
}

impl DocumentationSnapshot {
    /// Builds a snapshot, keeping discovery order. A repeated name overwrites
    /// the earlier content in place.
    #[must_use]
    pub fn new(
        entries: impl IntoIterator<Item = DocumentationEntry>,
        fragments: PromptFragments,
    ) -> Self {
        let mut deduped: Vec<DocumentationEntry> = Vec::new();
        for entry in entries {
            if let Some(existing) = deduped.iter_mut().find(|item| item.name == entry.name) {
                existing.content = entry.content;
            } else {
                deduped.push(entry);
            }
        }
        Self {
            entries: deduped,
            fragments,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[DocumentationEntry] {
        &self.entries
    }

    #[must_use]
    pub const fn fragments(&self) -> &PromptFragments {
        &self.fragments
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenates all entry contents separated by a blank line.
    #[must_use]
    pub fn all_documentation(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Filesystem locations for the corpus and the prompt fragments.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub docs_dir: PathBuf,
    pub prompts_dir: PathBuf,
}

impl StoreConfig {
    #[must_use]
    pub fn new(docs_dir: impl Into<PathBuf>, prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            prompts_dir: prompts_dir.into(),
        }
    }
}

/// Holds the current snapshot and replaces it wholesale on reload.
pub struct DocumentationStore {
    config: StoreConfig,
    current: RwLock<Arc<DocumentationSnapshot>>,
}

impl DocumentationStore {
    /// Creates a store with an empty snapshot. Call [`Self::load`] to populate it.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self::with_snapshot(config, DocumentationSnapshot::default())
    }

    #[must_use]
    pub fn with_snapshot(config: StoreConfig, snapshot: DocumentationSnapshot) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the snapshot in effect right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DocumentationSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn all_documentation(&self) -> String {
        self.snapshot().all_documentation()
    }

    /// Reads the configured locations into a new snapshot and swaps it in.
    ///
    /// Per-file failures are logged and skipped; this never fails as a whole.
    pub async fn load(&self) -> Arc<DocumentationSnapshot> {
        let snapshot = Arc::new(read_snapshot(&self.config).await);
        self.replace(snapshot.clone());
        snapshot
    }

    /// Installs `snapshot` in one step and returns the one it replaced.
    pub fn replace(&self, snapshot: Arc<DocumentationSnapshot>) -> Arc<DocumentationSnapshot> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, snapshot)
    }
}

/// Reads the corpus and fragments without touching any store.
pub async fn read_snapshot(config: &StoreConfig) -> DocumentationSnapshot {
    let entries = read_documentation(&config.docs_dir).await;
    let fragments = PromptFragments::default()
        .with_system_prompt(read_fragment(&config.prompts_dir, SYSTEM_PROMPT_FILE).await)
        .with_tool_metadata(read_fragment(&config.prompts_dir, TOOL_METADATA_FILE).await)
        .with_query_metadata(read_fragment(&config.prompts_dir, QUERY_METADATA_FILE).await)
        .with_service_description(
            read_fragment(&config.prompts_dir, SERVICE_DESCRIPTION_FILE).await,
        );

    let snapshot = DocumentationSnapshot::new(entries, fragments);
    let fragments = snapshot.fragments();
    info!(
        entries = snapshot.entries().len(),
        system_prompt = fragments.system_prompt().is_some(),
        tool_metadata = fragments.tool_metadata().is_some(),
        query_metadata = fragments.query_metadata().is_some(),
        service_description = fragments.service_description().is_some(),
        "documentation loaded"
    );
    snapshot
}

/// Returns true for visible files with an allowed extension.
#[must_use]
pub fn is_documentation_file(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            DOC_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

async fn read_documentation(dir: &Path) -> Vec<DocumentationEntry> {
    let mut listing = match tokio::fs::read_dir(dir).await {
        Ok(listing) => listing,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "documentation directory unreadable");
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    loop {
        match listing.next_entry().await {
            Ok(Some(item)) => {
                let Some(name) = item.file_name().to_str().map(str::to_string) else {
                    warn!(path = %item.path().display(), "skipping non UTF-8 file name");
                    continue;
                };
                if is_documentation_file(&name) {
                    candidates.push((name, item.path()));
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "documentation listing interrupted");
                break;
            }
        }
    }
    candidates.sort_by(|left, right| left.0.cmp(&right.0));

    let mut entries = Vec::with_capacity(candidates.len());
    for (name, path) in candidates {
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                debug!(path = %path.display(), "skipping non-file entry");
                continue;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable documentation file");
                continue;
            }
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => entries.push(DocumentationEntry::new(name, content)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable documentation file");
            }
        }
    }
    entries
}

async fn read_fragment(dir: &Path, file: &str) -> String {
    let path = dir.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "prompt fragment unreadable");
            String::new()
        }
    }
}

fn normalize_fragment(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

const fn present(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}
