//! Prompt assembly for each supported operation.
//!
//! Prompts are a pure function of the snapshot and the caller's request.

use std::fmt::Write as _;

use crate::store::DocumentationSnapshot;

/// Placeholder used when the corpus is empty.
pub const NO_DOCUMENTATION: &str = "No documentation available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    QueryGeneration,
    DocumentationAnswer,
    DescriptionAnalysis,
}

impl PromptKind {
    /// Label attached to diagnostics for calls of this kind.
    #[must_use]
    pub const fn context(self) -> &'static str {
        match self {
            Self::QueryGeneration => "query generation",
            Self::DocumentationAnswer => "documentation answer",
            Self::DescriptionAnalysis => "description analysis",
        }
    }
}

/// Builds the prompt for `kind`. The request is ignored for description analysis.
#[must_use]
pub fn assemble(kind: PromptKind, snapshot: &DocumentationSnapshot, request: &str) -> String {
    match kind {
        PromptKind::QueryGeneration => query_prompt(snapshot, request),
        PromptKind::DocumentationAnswer => documentation_prompt(snapshot, request),
        PromptKind::DescriptionAnalysis => description_prompt(snapshot),
    }
}

#[must_use]
pub fn query_prompt(snapshot: &DocumentationSnapshot, request: &str) -> String {
    let mut prompt = preamble(snapshot);
    push_block(
        &mut prompt,
        "Query guidelines",
        snapshot.fragments().query_metadata(),
    );
    let _ = write!(
        prompt,
        "Generate a query for this request: \"{request}\"\n\n\
         Return ONLY the query, with no explanation or surrounding text."
    );
    prompt
}

#[must_use]
pub fn documentation_prompt(snapshot: &DocumentationSnapshot, request: &str) -> String {
    let mut prompt = preamble(snapshot);
    push_block(
        &mut prompt,
        "Query guidelines",
        snapshot.fragments().query_metadata(),
    );
    let _ = write!(
        prompt,
        "Answer this question about the documentation: \"{request}\"\n\n\
         Base your answer solely on the provided documentation and context. \
         If the documentation does not cover the question, say so."
    );
    prompt
}

#[must_use]
pub fn description_prompt(snapshot: &DocumentationSnapshot) -> String {
    let mut prompt = preamble(snapshot);
    push_block(
        &mut prompt,
        "Tool metadata",
        snapshot.fragments().tool_metadata(),
    );
    prompt.push_str(
        "In 1-2 sentences, describe what this service or API is about. \
         Return ONLY the description.",
    );
    prompt
}

fn preamble(snapshot: &DocumentationSnapshot) -> String {
    let documentation = if snapshot.is_empty() {
        NO_DOCUMENTATION.to_string()
    } else {
        snapshot.all_documentation()
    };
    format!("Given this documentation:\n\n{documentation}\n\n")
}

fn push_block(prompt: &mut String, title: &str, body: Option<&str>) {
    if let Some(body) = body {
        let _ = write!(prompt, "{title}:\n\n{body}\n\n");
    }
}
