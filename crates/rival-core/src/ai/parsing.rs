//! Parsing and validation of collaborator responses
//!
//! Model output is untrusted. It often wraps the JSON payload in extra text,
//! quotes prices as strings, or leaves fields null. The raw payload is decoded
//! into loose `Raw*` structs and then validated field by field into
//! `CompetitorOffer`s.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::CompetitorOffer;

const MAX_NAME_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_URL_LEN: usize = 2048;
const MAX_LIST_ITEMS: usize = 5;
const MAX_LIST_ITEM_LEN: usize = 200;
const MAX_CONTACT_LEN: usize = 120;

/// Raw response envelope
///
/// Entries stay untyped here so one badly shaped entry cannot sink the
/// others.
#[derive(Debug, Deserialize)]
struct RawCompetitorResponse {
    competitors: Vec<serde_json::Value>,
}

/// Raw competitor entry as produced by the model
#[derive(Debug, Deserialize)]
struct RawCompetitor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    typical_price: Option<RawPrice>,
    #[serde(default)]
    best_offer: Option<String>,
    #[serde(default)]
    pros: Option<Vec<String>>,
    #[serde(default)]
    cons: Option<Vec<String>>,
    #[serde(default)]
    website_url: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    contact_email: Option<String>,
    #[serde(default)]
    contact_available: Option<bool>,
}

/// Prices arrive as numbers or as strings like "12,99 €"
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    fn value(&self) -> Option<f64> {
        match self {
            RawPrice::Number(n) => Some(*n),
            RawPrice::Text(s) => parse_price_text(s),
        }
    }
}

/// Read a price written with either decimal convention
///
/// The last separator is the decimal point when one or two digits follow
/// it, so "1.299,00 €", "1,299.00" and "12,99" all parse. Any other comma
/// is a thousands separator.
fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let normalized = match cleaned.rfind([',', '.']) {
        Some(pos) if cleaned[pos..].starts_with(',') => {
            let decimals = cleaned.len() - pos - 1;
            if (1..=2).contains(&decimals) {
                format!(
                    "{}.{}",
                    cleaned[..pos].replace(['.', ','], ""),
                    &cleaned[pos + 1..]
                )
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned.replace(',', ""),
    };

    normalized.parse::<f64>().ok()
}

/// Locate the outermost JSON object in a model response
fn extract_json_object(response: &str) -> Result<&str> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::MalformedResponse(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

/// Parse a competitor search response into validated offers
///
/// An empty `competitors` array is a valid answer. Entries failing
/// validation are dropped; if every entry fails, the whole response is
/// considered malformed.
pub fn parse_competitor_response(response: &str) -> Result<Vec<CompetitorOffer>> {
    let json_str = extract_json_object(response)?;
    let raw: RawCompetitorResponse = serde_json::from_str(json_str).map_err(|e| {
        Error::MalformedResponse(format!(
            "Invalid competitor JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })?;

    let received = raw.competitors.len();
    let offers: Vec<CompetitorOffer> = raw
        .competitors
        .into_iter()
        .filter_map(|entry| match decode_competitor(entry) {
            Ok(offer) => Some(offer),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Rejected competitor entry from AI");
                None
            }
        })
        .collect();

    if received > 0 && offers.is_empty() {
        return Err(Error::MalformedResponse(format!(
            "All {} competitor entries failed validation",
            received
        )));
    }

    Ok(offers)
}

fn decode_competitor(entry: serde_json::Value) -> std::result::Result<CompetitorOffer, String> {
    let raw: RawCompetitor =
        serde_json::from_value(entry).map_err(|e| format!("unreadable entry: {}", e))?;
    validate_competitor(raw)
}

fn validate_competitor(raw: RawCompetitor) -> std::result::Result<CompetitorOffer, String> {
    let name = raw.name.as_deref().map(str::trim).unwrap_or("");
    if name.is_empty() {
        return Err("missing name".into());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("name longer than {} characters", MAX_NAME_LEN));
    }

    let typical_price = raw
        .typical_price
        .as_ref()
        .ok_or_else(|| format!("missing price for {}", name))?
        .value()
        .ok_or_else(|| format!("unreadable price for {}", name))?;
    if !typical_price.is_finite() || typical_price < 0.0 {
        return Err(format!("invalid price {} for {}", typical_price, name));
    }

    let phone = clean_optional(raw.phone_number, MAX_CONTACT_LEN);
    let email = clean_optional(raw.contact_email, MAX_CONTACT_LEN).filter(|e| e.contains('@'));
    let contact_available = raw.contact_available.unwrap_or(false) || phone.is_some() || email.is_some();

    Ok(CompetitorOffer {
        name: name.to_string(),
        typical_price,
        offer_description: truncate(raw.best_offer.as_deref().unwrap_or("").trim(), MAX_DESCRIPTION_LEN),
        // Recomputed by the curator against the caller's numbers
        potential_savings: 0.0,
        pros: clean_list(raw.pros),
        cons: clean_list(raw.cons),
        website_url: raw.website_url.as_deref().and_then(clean_url).unwrap_or_default(),
        affiliate_url: None,
        phone,
        email,
        contact_available,
    })
}

/// Accept http(s) URLs and bare `www.` hosts; anything else is dropped
fn clean_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() || url.len() > MAX_URL_LEN || url.contains(char::is_whitespace) {
        return None;
    }
    let lower = url.to_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        Some(url.to_string())
    } else if lower.starts_with("www.") {
        Some(format!("https://{}", url))
    } else {
        None
    }
}

fn clean_optional(value: Option<String>, max_len: usize) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v.chars().count() <= max_len)
}

fn clean_list(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .take(MAX_LIST_ITEMS)
        .map(|item| truncate(&item, MAX_LIST_ITEM_LEN))
        .collect()
}

/// Truncate on a character boundary
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
