//! CLI command tests

use std::io::Write;

use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use rival_core::{
    AIClient, AnalysisRequest, Database, EngineConfig, Locale, MarketSuggestion, MockBackend,
    OllamaBackend, SearchMode,
};

use crate::cli::{Cli, Commands};
use crate::commands;

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn stale_suggestion(category: &str, country: &str) -> MarketSuggestion {
    let computed = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    MarketSuggestion {
        category: category.to_string(),
        country: country.to_string(),
        merchant_name: None,
        competitors: vec![],
        last_updated: computed,
        expires_at: computed + Duration::days(30),
    }
}

fn fresh_suggestion(category: &str, country: &str) -> MarketSuggestion {
    let computed = Utc::now();
    MarketSuggestion {
        last_updated: computed,
        expires_at: computed + Duration::days(30),
        ..stale_suggestion(category, country)
    }
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_analyze() {
    let cli = Cli::try_parse_from([
        "rival",
        "analyze",
        "--category",
        "MOBILE",
        "--amount",
        "60",
        "--country",
        "FR",
        "--currency",
        "EUR",
        "--merchant",
        "Orange",
        "--household",
        "3",
        "--quick",
        "--no-encrypt",
    ])
    .unwrap();

    assert!(cli.no_encrypt);
    match cli.command {
        Commands::Analyze {
            category,
            amount,
            merchant,
            household,
            quick,
            ..
        } => {
            assert_eq!(category, "MOBILE");
            assert_eq!(amount, 60.0);
            assert_eq!(merchant.as_deref(), Some("Orange"));
            assert_eq!(household, 3);
            assert!(quick);
        }
        _ => panic!("expected analyze"),
    }
}

#[test]
fn test_parse_requires_country() {
    assert!(Cli::try_parse_from(["rival", "invalidate"]).is_err());
    assert!(Cli::try_parse_from(["rival", "--db", "x.db", "invalidate", "--country", "BE"]).is_ok());
}

// ========== Analysis Command Tests ==========

#[tokio::test]
async fn test_cmd_analyze_populates_cache() {
    let db = setup_test_db();
    let mock = MockBackend::new();
    let engine =
        commands::engine_with_client(db.clone(), EngineConfig::default(), AIClient::Mock(mock.clone()))
            .unwrap();

    let request = AnalysisRequest::new("INTERNET", 40.0, &Locale::new("FR", "EUR"));
    commands::cmd_analyze(&engine, &request, SearchMode::Quick)
        .await
        .unwrap();
    commands::cmd_analyze(&engine, &request, SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(mock.call_count(), 1);
    let cached = db.list_suggestions(Some("FR")).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].competitors.len(), 3);
}

#[tokio::test]
async fn test_cmd_analyze_rejects_invalid_amount() {
    let db = setup_test_db();
    let engine = commands::engine_with_client(db, EngineConfig::default(), AIClient::mock()).unwrap();

    let request = AnalysisRequest::new("INTERNET", -5.0, &Locale::new("FR", "EUR"));
    assert!(commands::cmd_analyze(&engine, &request, SearchMode::Full)
        .await
        .is_err());
}

#[tokio::test]
async fn test_cmd_bulk_from_file() {
    let db = setup_test_db();
    let engine =
        commands::engine_with_client(db.clone(), EngineConfig::default(), AIClient::mock()).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"id": "a", "label": "Phone", "category": "MOBILE", "amount": 40, "merchant_name": "Orange"}},
            {{"id": "b", "label": "Groceries", "category": "GROCERIES", "amount": 400}}
        ]"#
    )
    .unwrap();

    commands::cmd_bulk(&engine, file.path(), &Locale::new("FR", "EUR"), 2)
        .await
        .unwrap();

    let cached = db.list_suggestions(None).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].merchant_name.as_deref(), Some("Orange"));
}

#[test]
fn test_load_charges_errors() {
    assert!(commands::load_charges(std::path::Path::new("/nonexistent/charges.json")).is_err());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"not": "a list"}}"#).unwrap();
    assert!(commands::load_charges(file.path()).is_err());
}

// ========== Cache Command Tests ==========

#[tokio::test]
async fn test_cmd_sweep() {
    let db = setup_test_db();
    db.put_suggestion(&stale_suggestion("MOBILE", "FR")).unwrap();
    db.put_suggestion(&fresh_suggestion("ENERGY", "FR")).unwrap();

    commands::cmd_sweep(&db, &EngineConfig::default())
        .await
        .unwrap();

    let remaining = db.list_suggestions(None).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].category, "ENERGY");
}

#[test]
fn test_cmd_invalidate() {
    let db = setup_test_db();
    db.put_suggestion(&fresh_suggestion("MOBILE", "FR")).unwrap();
    db.put_suggestion(&fresh_suggestion("MOBILE", "BE")).unwrap();

    commands::cmd_invalidate(&db, &EngineConfig::default(), "fr").unwrap();

    let remaining = db.list_suggestions(None).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].country, "BE");
}

#[tokio::test]
async fn test_cmd_stats() {
    let db = setup_test_db();
    assert!(commands::cmd_stats(&db, 30, None).await.is_ok());

    db.put_suggestion(&fresh_suggestion("MOBILE", "FR")).unwrap();
    assert!(commands::cmd_stats(&db, 0, Some(&AIClient::mock()))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_cmd_stats_with_unreachable_backend() {
    let db = setup_test_db();
    let backend = AIClient::Ollama(
        OllamaBackend::new("http://127.0.0.1:9", "llama3.2")
            .with_health_timeout(std::time::Duration::from_millis(200)),
    );
    assert!(commands::cmd_stats(&db, 7, Some(&backend)).await.is_ok());

    let unhealthy = AIClient::Mock(MockBackend::unhealthy());
    assert!(commands::cmd_stats(&db, 7, Some(&unhealthy)).await.is_ok());
}

#[test]
fn test_open_db_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rival.db");

    let db = commands::open_db(&path, true).unwrap();
    assert!(!db.is_encrypted());
    assert!(path.exists());
}
