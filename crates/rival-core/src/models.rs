//! Domain models for rival

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How an expense is shared inside a household
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    /// Billed once for the whole household (electricity, home insurance)
    Household,
    /// Paid separately by each member (personal phone plan)
    PerIndividual,
}

impl ChargeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Household => "household",
            Self::PerIndividual => "per_individual",
        }
    }
}

impl std::str::FromStr for ChargeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "household" => Ok(Self::Household),
            "per_individual" | "individual" => Ok(Self::PerIndividual),
            _ => Err(format!("Unknown charge type: {}", s)),
        }
    }
}

impl std::fmt::Display for ChargeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Country and currency a request is evaluated under
///
/// Supplied by the caller's locale resolver; the engine never infers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub country: String,
    pub currency: String,
}

impl Locale {
    pub fn new(country: &str, currency: &str) -> Self {
        Self {
            country: country.trim().to_uppercase(),
            currency: currency.trim().to_uppercase(),
        }
    }
}

/// A single-charge analysis request
///
/// Built per call and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub category: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    /// Amount currently paid per month, for the whole household
    pub total_amount: f64,
    pub country: String,
    pub currency: String,
    pub household_size: u32,
    /// Technical specifics (surface area, data allowance, coverage level)
    #[serde(default)]
    pub details: Option<String>,
}

impl AnalysisRequest {
    pub fn new(category: &str, total_amount: f64, locale: &Locale) -> Self {
        Self {
            category: category.to_string(),
            merchant_name: None,
            total_amount,
            country: locale.country.clone(),
            currency: locale.currency.clone(),
            household_size: 1,
            details: None,
        }
    }

    pub fn with_merchant(mut self, merchant: &str) -> Self {
        self.merchant_name = Some(merchant.to_string());
        self
    }

    pub fn with_household_size(mut self, household_size: u32) -> Self {
        self.household_size = household_size;
        self
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    /// Merchant name with surrounding whitespace removed, if any
    pub fn merchant(&self) -> Option<&str> {
        self.merchant_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// Reject requests the pipeline cannot run on
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(Error::Validation("category is required".into()));
        }
        if !self.total_amount.is_finite() || self.total_amount <= 0.0 {
            return Err(Error::Validation(format!(
                "amount must be positive, got {}",
                self.total_amount
            )));
        }
        if self.country.trim().is_empty() {
            return Err(Error::Validation("country is required".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(Error::Validation("currency is required".into()));
        }
        Ok(())
    }
}

/// Request after household-sharing rules have been applied
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    /// Upper-cased category identifier
    pub category: String,
    pub merchant_name: Option<String>,
    pub total_amount: f64,
    /// Amount actually compared against market offers
    pub effective_amount: f64,
    pub charge_type: ChargeType,
    pub country: String,
    pub currency: String,
    /// Household size, floored at 1
    pub household_size: u32,
    pub details: Option<String>,
}

impl NormalizedRequest {
    /// Whether savings on this request scale to every household member
    pub fn is_shared_per_member(&self) -> bool {
        self.charge_type == ChargeType::PerIndividual && self.household_size > 1
    }
}

/// A market alternative for the expense being compared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorOffer {
    pub name: String,
    /// Monthly price, in the request currency, on the same basis as the
    /// effective amount (per person or per household)
    pub typical_price: f64,
    pub offer_description: String,
    /// Annual saving for the household
    pub potential_savings: f64,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub website_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact_available: bool,
}

impl CompetitorOffer {
    /// Whether the offer carries a link the user can verify it with
    pub fn has_reference(&self) -> bool {
        let website = !self.website_url.trim().is_empty();
        let affiliate = self
            .affiliate_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        website || affiliate
    }
}

/// A cached competitive analysis
///
/// Keyed by (category, country, merchant). A `None` merchant is the generic
/// category-level entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSuggestion {
    pub category: String,
    pub country: String,
    pub merchant_name: Option<String>,
    pub competitors: Vec<CompetitorOffer>,
    pub last_updated: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MarketSuggestion {
    /// A cache entry is only usable strictly before its expiry
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Highest-ranked competitor, if any
    pub fn best_offer(&self) -> Option<&CompetitorOffer> {
        self.competitors.first()
    }

    pub fn best_savings(&self) -> f64 {
        self.best_offer().map(|o| o.potential_savings).unwrap_or(0.0)
    }
}

/// Where a returned suggestion came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// Served from the suggestion cache
    CacheHit,
    /// Freshly computed by the search collaborator
    Computed,
    /// The collaborator failed; the suggestion is empty and was not cached
    Degraded { reason: String },
}

impl Provenance {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Self::CacheHit)
    }
}

/// Result of a single-charge analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub suggestion: MarketSuggestion,
    pub provenance: Provenance,
    pub effective_amount: f64,
    pub charge_type: ChargeType,
}

/// A recurring charge of a budget, as handed to the bulk analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub label: String,
    pub category: String,
    /// Monthly amount for the whole household
    pub amount: f64,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Suggestion produced for one charge of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSuggestion {
    pub charge_id: String,
    pub charge_label: String,
    pub suggestion: MarketSuggestion,
    pub provenance: Provenance,
}

/// A charge the bulk analyzer could not process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeFailure {
    pub charge_id: String,
    pub charge_label: String,
    pub error: String,
}

/// Aggregate result of analyzing every charge of a budget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkAnalysisResult {
    pub suggestions: Vec<ChargeSuggestion>,
    pub cache_hits: u32,
    pub ai_calls: u32,
    /// Sum of the best offer's annual saving across charges
    pub total_potential_savings: f64,
    pub household_size: u32,
    /// Charges whose category is not suggestion-relevant
    pub skipped: u32,
    pub failures: Vec<ChargeFailure>,
}

/// Snapshot of the suggestion cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total: i64,
    pub live: i64,
    pub expired: i64,
    pub by_country: Vec<(String, i64)>,
}

/// A collaborator call to record
#[derive(Debug, Clone)]
pub struct NewSearchMetric {
    pub category: String,
    pub country: String,
    pub model: String,
    pub latency_ms: i64,
    pub success: bool,
    pub offer_count: i64,
    pub error_message: Option<String>,
}

/// Aggregated collaborator call statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchMetricSummary {
    pub total_calls: i64,
    pub successful: i64,
    pub failed: i64,
    pub avg_latency_ms: f64,
}
