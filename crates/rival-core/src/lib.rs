//! Rival Core Library
//!
//! Competitive-offer intelligence for household budgets:
//! - Charge classification and cost normalization by household sharing
//! - Suggestion cache with expiry, backed by SQLite (optionally SQLCipher)
//! - Competitor search through pluggable AI backends (Ollama, OpenAI-compatible)
//! - Result curation (savings, self-match filter, ranking, cap)
//! - Single-charge and bulk analysis with explicit cache provenance
//! - Background cache janitor and country invalidation
//! - Prompt library and engine config with user overrides

pub mod ai;
pub mod classify;
pub mod clock;
pub mod config;
pub mod curate;
pub mod db;
pub mod engine;
pub mod error;
pub mod janitor;
pub mod models;
pub mod prompts;
pub mod search;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, MockResponse, OllamaBackend, OpenAICompatibleBackend};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, SearchMode};
pub use db::Database;
pub use engine::SuggestionEngine;
pub use error::{Error, Result};
pub use janitor::CacheJanitor;
pub use models::*;
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use search::CompetitorSearchGateway;
