//! Core services for docqa-mcp.
//!
//! This crate owns the documentation corpus and prompt fragments, assembles
//! prompts for each supported operation, runs the external generation backend
//! under a hard deadline, and memoizes the one-line service description used to
//! enrich tool listings.

pub mod anthropic;
pub mod description;
pub mod generation;
pub mod prompts;
pub mod service;
pub mod store;
