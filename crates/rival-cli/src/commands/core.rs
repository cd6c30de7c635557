//! Shared command utilities
//!
//! - `open_db` - Open the suggestion store
//! - `load_config` - Resolve the engine config
//! - `build_engine` - Wire the AI backend, prompt and store into an engine

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rival_core::{
    AIClient, CompetitorSearchGateway, Database, EngineConfig, PromptLibrary, SuggestionEngine,
};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).with_context(|| {
            format!(
                "Failed to open database (set {} or use --no-encrypt)",
                rival_core::db::DB_KEY_ENV
            )
        })
    }
}

pub fn load_config() -> Result<EngineConfig> {
    EngineConfig::load().context("Failed to load engine config")
}

/// Build an engine around the AI backend selected from the environment
pub fn build_engine(
    db: Database,
    config: EngineConfig,
    model: Option<&str>,
) -> Result<SuggestionEngine> {
    let client = AIClient::from_env().ok_or_else(|| {
        anyhow!(
            "No AI backend configured.\n\
             Set OLLAMA_HOST (and optionally OLLAMA_MODEL), or AI_BACKEND=openai_compatible \
             with OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_MODEL"
        )
    })?;
    let client = match model {
        Some(model) => client.with_model(model),
        None => client,
    };

    engine_with_client(db, config, client)
}

pub fn engine_with_client(
    db: Database,
    config: EngineConfig,
    client: AIClient,
) -> Result<SuggestionEngine> {
    let gateway = CompetitorSearchGateway::from_library(
        client,
        &PromptLibrary::new(),
        config.search.clone(),
    )
    .context("Failed to load competitor search prompt")?;

    tracing::debug!(model = %gateway.model(), "Competitor search backend ready");
    Ok(SuggestionEngine::new(db, gateway, config))
}
