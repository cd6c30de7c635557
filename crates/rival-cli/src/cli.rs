//! CLI argument definitions using clap
//!
//! This module contains the clap structs for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Rival - Find cheaper offers for recurring household charges
#[derive(Parser)]
#[command(name = "rival")]
#[command(about = "Competitive-offer suggestions for household budgets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "rival.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set RIVAL_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Override the AI model used for competitor search
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find cheaper competitors for a single charge (prints JSON)
    Analyze {
        /// Charge category (MOBILE, ENERGY, INTERNET, ...)
        #[arg(long)]
        category: String,

        /// Monthly amount paid by the whole household
        #[arg(long)]
        amount: f64,

        /// ISO country code
        #[arg(long)]
        country: String,

        /// ISO currency code
        #[arg(long)]
        currency: String,

        /// Current provider
        #[arg(short, long)]
        merchant: Option<String>,

        /// Number of people in the household
        #[arg(long, default_value = "1")]
        household: u32,

        /// Technical specifics (data allowance, surface area, coverage level)
        #[arg(long)]
        details: Option<String>,

        /// Use the short search deadline
        #[arg(long)]
        quick: bool,
    },

    /// Analyze every charge of a budget from a JSON file (prints JSON)
    Bulk {
        /// JSON array of charges ({id, label, category, amount, merchant_name?, details?})
        #[arg(short, long)]
        file: PathBuf,

        /// ISO country code
        #[arg(long)]
        country: String,

        /// ISO currency code
        #[arg(long)]
        currency: String,

        /// Number of people in the household
        #[arg(long, default_value = "1")]
        household: u32,
    },

    /// Remove expired suggestions once
    Sweep,

    /// Drop every cached suggestion for a country
    Invalidate {
        /// ISO country code
        #[arg(long)]
        country: String,
    },

    /// Run the cache janitor until Ctrl-C
    Janitor,

    /// Show cache contents and search call statistics
    Stats {
        /// Metric window in days
        #[arg(long, default_value = "30")]
        days: i64,
    },
}
