//! Result curation
//!
//! Turns a raw list of competitor offers into what the user is shown:
//! savings recomputed against the caller's live numbers, unverifiable and
//! self-matching offers removed, best offers first, at most three.

use std::cmp::Ordering;

use crate::models::{ChargeType, CompetitorOffer};

/// Maximum number of competitors kept per suggestion
pub const MAX_COMPETITORS: usize = 3;

/// Merchant names this short are too generic to match against
const MIN_SELF_MATCH_LEN: usize = 4;

/// Inputs the curation is computed against
#[derive(Debug, Clone, Copy)]
pub struct CurationContext<'a> {
    pub merchant_name: Option<&'a str>,
    pub effective_amount: f64,
    pub household_size: u32,
    pub charge_type: ChargeType,
}

/// Annual household saving of switching to an offer at `typical_price`
pub fn annual_savings(
    effective_amount: f64,
    typical_price: f64,
    household_size: u32,
    charge_type: ChargeType,
) -> f64 {
    let per_basis = (effective_amount - typical_price) * 12.0;
    match charge_type {
        ChargeType::PerIndividual if household_size > 1 => per_basis * household_size as f64,
        _ => per_basis,
    }
}

/// Whether a competitor name overlaps the current merchant
///
/// Equality, substring and superstring all count, case-insensitively. Short
/// merchant names never match.
pub fn is_self_match(competitor: &str, merchant: &str) -> bool {
    let merchant = merchant.trim().to_lowercase();
    if merchant.chars().count() < MIN_SELF_MATCH_LEN {
        return false;
    }
    let competitor = competitor.trim().to_lowercase();
    if competitor.is_empty() {
        return false;
    }
    competitor == merchant || competitor.contains(&merchant) || merchant.contains(&competitor)
}

/// Curate offers against the caller's current situation
pub fn curate(offers: Vec<CompetitorOffer>, ctx: &CurationContext<'_>) -> Vec<CompetitorOffer> {
    curate_with_limit(offers, ctx, MAX_COMPETITORS)
}

/// Same as [`curate`] with an explicit cap (never above [`MAX_COMPETITORS`])
pub fn curate_with_limit(
    offers: Vec<CompetitorOffer>,
    ctx: &CurationContext<'_>,
    limit: usize,
) -> Vec<CompetitorOffer> {
    let raw_count = offers.len();

    let mut curated: Vec<CompetitorOffer> = offers
        .into_iter()
        .map(|mut offer| {
            offer.potential_savings = annual_savings(
                ctx.effective_amount,
                offer.typical_price,
                ctx.household_size,
                ctx.charge_type,
            );
            offer
        })
        .filter(|offer| offer.potential_savings.is_finite() && offer.potential_savings > 0.0)
        .filter(|offer| offer.has_reference())
        .filter(|offer| match ctx.merchant_name {
            Some(merchant) => !is_self_match(&offer.name, merchant),
            None => true,
        })
        .collect();

    // Stable sort keeps the collaborator's order for equal savings
    curated.sort_by(|a, b| {
        b.potential_savings
            .partial_cmp(&a.potential_savings)
            .unwrap_or(Ordering::Equal)
    });
    curated.truncate(limit.min(MAX_COMPETITORS));

    tracing::debug!(
        raw = raw_count,
        kept = curated.len(),
        "Curated competitor offers"
    );

    curated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(name: &str, price: f64) -> CompetitorOffer {
        CompetitorOffer {
            name: name.to_string(),
            typical_price: price,
            offer_description: format!("{} offer", name),
            potential_savings: 0.0,
            pros: vec!["cheap".into()],
            cons: vec![],
            website_url: format!("https://{}.example.com", name.to_lowercase()),
            affiliate_url: None,
            phone: None,
            email: None,
            contact_available: false,
        }
    }

    fn ctx(merchant: Option<&str>, amount: f64, household: u32, ct: ChargeType) -> CurationContext<'_> {
        CurationContext {
            merchant_name: merchant,
            effective_amount: amount,
            household_size: household,
            charge_type: ct,
        }
    }

    #[test]
    fn test_per_individual_savings_scale_with_household() {
        // MOBILE, 60 total for 3 people -> 20 per person
        let result = curate(
            vec![offer("Free", 10.0)],
            &ctx(Some("Orange"), 20.0, 3, ChargeType::PerIndividual),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].potential_savings, 360.0);
    }

    #[test]
    fn test_household_savings_not_multiplied() {
        let result = curate(
            vec![offer("TotalEnergies", 100.0)],
            &ctx(None, 150.0, 4, ChargeType::Household),
        );
        assert_eq!(result[0].potential_savings, 600.0);
    }

    #[test]
    fn test_self_match_filtered() {
        let result = curate(
            vec![offer("orange mobile", 5.0), offer("Free", 10.0)],
            &ctx(Some("Orange"), 20.0, 1, ChargeType::PerIndividual),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Free");
    }

    #[test]
    fn test_self_match_rules() {
        assert!(is_self_match("Orange", "orange"));
        assert!(is_self_match("Orange Mobile", "ORANGE"));
        assert!(is_self_match("EDF", "EDF Energie"));
        assert!(is_self_match("edf energie", "EDF Energie"));
        // Short merchant names are too generic
        assert!(!is_self_match("SFR Box", "SFR"));
        assert!(!is_self_match("Free", "Orange"));
        assert!(!is_self_match("", "Orange"));
    }

    #[test]
    fn test_short_merchant_does_not_filter() {
        let result = curate(
            vec![offer("SFR Red", 10.0)],
            &ctx(Some("SFR"), 20.0, 1, ChargeType::PerIndividual),
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_non_positive_savings_dropped() {
        let result = curate(
            vec![offer("Same", 20.0), offer("Pricier", 25.0), offer("Cheaper", 15.0)],
            &ctx(None, 20.0, 1, ChargeType::Household),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Cheaper");
        assert!(result.iter().all(|o| o.potential_savings > 0.0));
    }

    #[test]
    fn test_offers_without_reference_dropped() {
        let mut no_link = offer("NoLink", 5.0);
        no_link.website_url = String::new();
        let mut affiliate_only = offer("Affiliate", 6.0);
        affiliate_only.website_url = String::new();
        affiliate_only.affiliate_url = Some("https://aff.example.com/a".into());

        let result = curate(
            vec![no_link, affiliate_only],
            &ctx(None, 20.0, 1, ChargeType::Household),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Affiliate");
    }

    #[test]
    fn test_sorted_and_capped() {
        // Five candidates, four with positive savings -> top three
        let result = curate(
            vec![
                offer("A", 18.0),
                offer("B", 5.0),
                offer("C", 25.0),
                offer("D", 12.0),
                offer("E", 9.0),
            ],
            &ctx(None, 20.0, 1, ChargeType::Household),
        );
        let names: Vec<_> = result.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["B", "E", "D"]);
        assert!(result
            .windows(2)
            .all(|w| w[0].potential_savings >= w[1].potential_savings));
    }

    #[test]
    fn test_explicit_limit_never_exceeds_max() {
        let offers: Vec<_> = (0..6).map(|i| offer(&format!("P{}", i), i as f64)).collect();
        assert_eq!(
            curate_with_limit(offers.clone(), &ctx(None, 50.0, 1, ChargeType::Household), 10).len(),
            MAX_COMPETITORS
        );
        assert_eq!(
            curate_with_limit(offers, &ctx(None, 50.0, 1, ChargeType::Household), 1).len(),
            1
        );
    }
}
