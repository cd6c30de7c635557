//! Analysis command implementations (analyze, bulk)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rival_core::{AnalysisRequest, Charge, Locale, SearchMode, SuggestionEngine};

/// Run the single-charge pipeline and print the outcome as JSON
///
/// A failed search still prints an (empty, degraded) suggestion.
pub async fn cmd_analyze(
    engine: &SuggestionEngine,
    request: &AnalysisRequest,
    mode: SearchMode,
) -> Result<()> {
    let outcome = engine
        .analyze(request, mode)
        .await
        .context("Analysis rejected")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Analyze every charge in a JSON file and print the aggregate as JSON
pub async fn cmd_bulk(
    engine: &SuggestionEngine,
    file: &Path,
    locale: &Locale,
    household_size: u32,
) -> Result<()> {
    let charges = load_charges(file)?;
    tracing::info!(charges = charges.len(), file = %file.display(), "Loaded charges");

    let result = engine
        .analyze_batch(&charges, locale, household_size)
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Read a JSON array of charges
pub fn load_charges(file: &Path) -> Result<Vec<Charge>> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid charge list in {}", file.display()))
}
