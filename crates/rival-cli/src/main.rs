//! Rival CLI - competitive-offer suggestions for household charges
//!
//! Usage:
//!   rival analyze --category MOBILE --amount 60 --country FR --currency EUR
//!   rival bulk --file charges.json --country FR --currency EUR --household 3
//!   rival sweep                  Remove expired suggestions
//!   rival invalidate --country FR
//!   rival janitor                Sweep periodically until Ctrl-C
//!   rival stats                  Cache and search metrics

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use rival_core::{AIClient, AnalysisRequest, Locale, SearchMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let config = commands::load_config()?;

    match cli.command {
        Commands::Analyze {
            category,
            amount,
            country,
            currency,
            merchant,
            household,
            details,
            quick,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::build_engine(db, config, cli.model.as_deref())?;

            let locale = Locale::new(&country, &currency);
            let mut request =
                AnalysisRequest::new(&category, amount, &locale).with_household_size(household);
            if let Some(merchant) = merchant.as_deref() {
                request = request.with_merchant(merchant);
            }
            if let Some(details) = details.as_deref() {
                request = request.with_details(details);
            }
            let mode = if quick {
                SearchMode::Quick
            } else {
                SearchMode::Full
            };

            commands::cmd_analyze(&engine, &request, mode).await
        }
        Commands::Bulk {
            file,
            country,
            currency,
            household,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::build_engine(db, config, cli.model.as_deref())?;
            commands::cmd_bulk(&engine, &file, &Locale::new(&country, &currency), household).await
        }
        Commands::Sweep => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_sweep(&db, &config).await
        }
        Commands::Invalidate { country } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_invalidate(&db, &config, &country)
        }
        Commands::Janitor => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_janitor(&db, &config).await
        }
        Commands::Stats { days } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let backend = AIClient::from_env();
            let backend = match (backend, cli.model.as_deref()) {
                (Some(client), Some(model)) => Some(client.with_model(model)),
                (client, _) => client,
            };
            commands::cmd_stats(&db, days, backend.as_ref()).await
        }
    }
}
