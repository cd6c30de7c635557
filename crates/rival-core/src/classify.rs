//! Charge classification and cost normalization
//!
//! Some expenses are billed once per household, others once per member. Before
//! an amount is compared against market offers it is brought onto the same
//! basis as the offers: a household total, or a per-person share.
//!
//! The tables below are plain data so new categories only need a new row.

use crate::models::{AnalysisRequest, ChargeType, NormalizedRequest};

/// Categories billed once for the whole household
const HOUSEHOLD_CATEGORIES: &[&str] = &[
    "ENERGY",
    "ELECTRICITY",
    "GAS",
    "WATER",
    "INTERNET",
    "INSURANCE",
    "INSURANCE_HOME",
    "INSURANCE_AUTO",
    "LOAN",
    "BANK",
    "HOUSING",
    "SUBSCRIPTION",
    "LEISURE_STREAMING",
];

/// Categories each household member pays separately
const PER_INDIVIDUAL_CATEGORIES: &[&str] = &[
    "MOBILE",
    "INSURANCE_HEALTH",
    "INSURANCE_LIFE",
    "TRANSPORT",
    "LEISURE",
    "LEISURE_SPORT",
];

/// Categories worth asking the market about
const SUGGESTION_RELEVANT_CATEGORIES: &[&str] = &[
    "ENERGY",
    "ELECTRICITY",
    "GAS",
    "INTERNET",
    "MOBILE",
    "INSURANCE",
    "INSURANCE_HOME",
    "INSURANCE_AUTO",
    "INSURANCE_HEALTH",
    "INSURANCE_LIFE",
    "LOAN",
    "BANK",
    "TRANSPORT",
    "LEISURE",
    "LEISURE_SPORT",
    "LEISURE_STREAMING",
    "SUBSCRIPTION",
    "HOUSING",
];

/// Canonical form of a category identifier
pub fn canonical_category(category: &str) -> String {
    category.trim().to_uppercase()
}

/// Classify a category as a household or per-individual charge
///
/// Unknown categories are treated as a single household cost.
pub fn classify(category: &str) -> ChargeType {
    let category = canonical_category(category);
    if PER_INDIVIDUAL_CATEGORIES.contains(&category.as_str()) {
        return ChargeType::PerIndividual;
    }
    if !HOUSEHOLD_CATEGORIES.contains(&category.as_str()) {
        tracing::debug!(category = %category, "Unknown category, treating as household charge");
    }
    ChargeType::Household
}

/// Whether the bulk analyzer should look for alternatives in this category
pub fn is_suggestion_relevant(category: &str) -> bool {
    SUGGESTION_RELEVANT_CATEGORIES.contains(&canonical_category(category).as_str())
}

/// Compute the amount compared against market offers
///
/// Per-individual charges are divided across the household; household
/// charges are compared as-is. A household size below 1 counts as 1.
pub fn normalize(category: &str, total_amount: f64, household_size: u32) -> (f64, ChargeType) {
    let charge_type = classify(category);
    let household_size = household_size.max(1);

    let effective = match charge_type {
        ChargeType::PerIndividual if household_size > 1 => total_amount / household_size as f64,
        _ => total_amount,
    };

    (effective, charge_type)
}

/// Apply household-sharing rules to a whole request
pub fn normalize_request(request: &AnalysisRequest) -> NormalizedRequest {
    let (effective_amount, charge_type) = normalize(
        &request.category,
        request.total_amount,
        request.household_size,
    );

    NormalizedRequest {
        category: canonical_category(&request.category),
        merchant_name: request.merchant().map(str::to_string),
        total_amount: request.total_amount,
        effective_amount,
        charge_type,
        country: request.country.trim().to_uppercase(),
        currency: request.currency.trim().to_uppercase(),
        household_size: request.household_size.max(1),
        details: request
            .details
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    }
}
