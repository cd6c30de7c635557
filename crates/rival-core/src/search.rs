//! Competitor search gateway
//!
//! Builds the competitor-search prompt from a normalized request, sends it to
//! the AI collaborator under a deadline, and decodes the answer into typed
//! offers. Nothing here touches the cache: a failed or timed-out search only
//! ever produces an error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::ai::parsing::parse_competitor_response;
use crate::ai::{AIBackend, AIClient, CompletionOptions};
use crate::config::{SearchConfig, SearchMode};
use crate::curate::MAX_COMPETITORS;
use crate::error::{Error, Result};
use crate::models::{CompetitorOffer, NormalizedRequest};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// Placeholder used when the caller does not know the current provider
const UNKNOWN_MERCHANT: &str = "their current provider";

/// Hint for categories without a dedicated row
const DEFAULT_GUIDANCE: &str =
    "Compare offers with equivalent features and service level to the current one.";

/// Per-category hints steering the collaborator towards comparable offers
const CATEGORY_GUIDANCE: &[(&str, &str)] = &[
    ("ENERGY", "Compare the price per kWh and the fixed monthly subscription for the same meter power and consumption profile."),
    ("ELECTRICITY", "Compare the price per kWh and the fixed monthly subscription for the same meter power and consumption profile."),
    ("GAS", "Compare the price per kWh and the subscription for the same yearly consumption."),
    ("INTERNET", "Compare offers with at least the same download speed and technology (fibre, DSL, cable). Ignore promotional prices shorter than 12 months."),
    ("MOBILE", "Compare plans with at least the same data allowance, unlimited calls and texts, and similar network coverage."),
    ("INSURANCE", "Compare policies with the same coverage level and deductible."),
    ("INSURANCE_HOME", "Compare home insurance for the same surface area, number of rooms, occupancy status and coverage level."),
    ("INSURANCE_AUTO", "Compare car insurance for the same vehicle, driver profile and coverage level (third party vs comprehensive)."),
    ("INSURANCE_HEALTH", "Compare health insurance with the same reimbursement levels for care, optical and dental."),
    ("INSURANCE_LIFE", "Compare borrower or life insurance for the same insured capital and guarantees."),
    ("LOAN", "Compare the effective annual rate (APR) for the same remaining capital and duration, including insurance and fees."),
    ("BANK", "Compare yearly account fees including cards, transfers and overdraft charges for everyday use."),
    ("TRANSPORT", "Compare passes or subscriptions for the same area and frequency of travel."),
    ("LEISURE", "Compare memberships with similar access and opening hours."),
    ("LEISURE_SPORT", "Compare gym or club memberships with similar facilities, location and access hours."),
    ("LEISURE_STREAMING", "Compare streaming services with similar catalogue, video quality and simultaneous screens."),
    ("SUBSCRIPTION", "Compare subscriptions offering the same service and usage limits."),
    ("HOUSING", "Compare rent or housing costs for the same surface area and location."),
];

/// Guidance text for a category
pub fn category_guidance(category: &str) -> &'static str {
    CATEGORY_GUIDANCE
        .iter()
        .find(|(key, _)| *key == category)
        .map(|(_, hint)| *hint)
        .unwrap_or(DEFAULT_GUIDANCE)
}

/// Gateway to the AI collaborator for competitor searches
#[derive(Clone)]
pub struct CompetitorSearchGateway {
    client: AIClient,
    prompt: Prompt,
    config: SearchConfig,
}

impl CompetitorSearchGateway {
    pub fn new(client: AIClient, prompt: Prompt, config: SearchConfig) -> Self {
        Self {
            client,
            prompt,
            config,
        }
    }

    /// Create a gateway using the competitor-search prompt from a library
    pub fn from_library(
        client: AIClient,
        library: &PromptLibrary,
        config: SearchConfig,
    ) -> Result<Self> {
        let prompt = library.load(PromptId::CompetitorSearch)?;
        Ok(Self::new(client, prompt, config))
    }

    /// Model name of the underlying backend (for metrics)
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Render the prompt for a request
    ///
    /// Deterministic: the same request always yields the same prompt.
    pub fn build_prompt(&self, request: &NormalizedRequest, max_competitors: usize) -> String {
        let household_context = if request.household_size <= 1 {
            "single person".to_string()
        } else {
            format!("{}-person household", request.household_size)
        };
        let comparison_basis = if request.is_shared_per_member() {
            "per person"
        } else {
            "for the whole household"
        };
        let current_price = format!("{:.2}", request.effective_amount);
        let max_competitors = max_competitors.clamp(1, MAX_COMPETITORS).to_string();

        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("country", &request.country);
        vars.insert("currency", &request.currency);
        vars.insert("household_context", &household_context);
        vars.insert("category", &request.category);
        vars.insert(
            "merchant",
            request.merchant_name.as_deref().unwrap_or(UNKNOWN_MERCHANT),
        );
        vars.insert("current_price", &current_price);
        vars.insert("comparison_basis", comparison_basis);
        vars.insert("category_guidance", category_guidance(&request.category));
        vars.insert("max_competitors", &max_competitors);
        if let Some(details) = request.details.as_deref() {
            vars.insert("details", details);
        }

        self.prompt.render(&vars)
    }

    /// Search for competitors under the deadline of the given mode
    pub async fn search(
        &self,
        request: &NormalizedRequest,
        mode: SearchMode,
        max_competitors: usize,
    ) -> Result<Vec<CompetitorOffer>> {
        self.search_with_deadline(request, self.config.timeout(mode), max_competitors)
            .await
    }

    /// Search for competitors, giving up after `deadline`
    ///
    /// Timeouts and transport failures are `SearchUnavailable`; an answer that
    /// does not decode is `MalformedResponse`.
    pub async fn search_with_deadline(
        &self,
        request: &NormalizedRequest,
        deadline: Duration,
        max_competitors: usize,
    ) -> Result<Vec<CompetitorOffer>> {
        let prompt = self.build_prompt(request, max_competitors);
        let options = CompletionOptions {
            temperature: self.config.temperature,
            timeout: deadline,
        };

        debug!(
            category = %request.category,
            country = %request.country,
            prompt_len = prompt.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Searching competitors"
        );

        let started = Instant::now();
        let text = tokio::time::timeout(deadline, self.client.complete(&prompt, &options))
            .await
            .map_err(|_| {
                Error::SearchUnavailable(format!(
                    "competitor search timed out after {} ms",
                    deadline.as_millis()
                ))
            })??;

        let offers = parse_competitor_response(&text)?;
        debug!(
            category = %request.category,
            offers = offers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Competitor search answered"
        );

        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockResponse};
    use crate::classify::normalize_request;
    use crate::config::EngineConfig;
    use crate::models::{AnalysisRequest, Locale};

    fn gateway_with(mock: MockBackend) -> CompetitorSearchGateway {
        CompetitorSearchGateway::from_library(
            AIClient::Mock(mock),
            &PromptLibrary::embedded_only(),
            EngineConfig::default().search,
        )
        .unwrap()
    }

    fn mobile_request() -> NormalizedRequest {
        let locale = Locale::new("fr", "eur");
        normalize_request(
            &AnalysisRequest::new("mobile", 60.0, &locale)
                .with_merchant("Orange")
                .with_household_size(3)
                .with_details("100 GB 5G"),
        )
    }

    #[test]
    fn test_prompt_contains_context() {
        let gateway = gateway_with(MockBackend::new());
        let prompt = gateway.build_prompt(&mobile_request(), 3);

        assert!(prompt.contains("Country: FR"));
        assert!(prompt.contains("Household: 3-person household"));
        assert!(prompt.contains("Current provider: Orange"));
        assert!(prompt.contains("Current monthly price: 20.00 EUR per person"));
        assert!(prompt.contains("100 GB 5G"));
        assert!(prompt.contains("at most 3 competitors"));
        assert!(prompt.contains("Never propose Orange"));
        assert!(prompt.contains("same data allowance"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_prompt_household_basis_and_placeholder() {
        let gateway = gateway_with(MockBackend::new());
        let locale = Locale::new("FR", "EUR");
        let request =
            normalize_request(&AnalysisRequest::new("ENERGY", 150.0, &locale).with_household_size(4));
        let prompt = gateway.build_prompt(&request, 3);

        assert!(prompt.contains("150.00 EUR for the whole household"));
        assert!(prompt.contains("Current provider: their current provider"));
        assert!(!prompt.contains("Details of the current contract"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let gateway = gateway_with(MockBackend::new());
        let request = mobile_request();
        assert_eq!(
            gateway.build_prompt(&request, 3),
            gateway.build_prompt(&request, 3)
        );
    }

    #[test]
    fn test_injected_placeholders_are_inert() {
        let gateway = gateway_with(MockBackend::new());
        let locale = Locale::new("FR", "EUR");
        let request = normalize_request(
            &AnalysisRequest::new("MOBILE", 20.0, &locale).with_merchant("{{country}} Telecom"),
        );
        let prompt = gateway.build_prompt(&request, 3);
        assert!(!prompt.contains("FR Telecom"));
    }

    #[tokio::test]
    async fn test_search_decodes_offers() {
        let mock = MockBackend::new();
        let gateway = gateway_with(mock.clone());
        let offers = gateway
            .search(&mobile_request(), SearchMode::Full, 3)
            .await
            .unwrap();

        assert_eq!(offers.len(), 3);
        assert_eq!(offers[0].name, "Budget Direct");
        assert_eq!(offers[0].typical_price, 12.0);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_search_malformed() {
        let mock = MockBackend::new();
        mock.push_text("no idea, sorry");
        let gateway = gateway_with(mock);
        let err = gateway
            .search(&mobile_request(), SearchMode::Full, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_search_unavailable() {
        let mock = MockBackend::new();
        mock.push(MockResponse::Unavailable("connection refused".into()));
        let gateway = gateway_with(mock);
        let err = gateway
            .search(&mobile_request(), SearchMode::Quick, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_search_deadline() {
        let mock = MockBackend::new();
        mock.push(MockResponse::Delayed(
            Duration::from_secs(5),
            r#"{"competitors": []}"#.into(),
        ));
        let gateway = gateway_with(mock);
        let err = gateway
            .search_with_deadline(&mobile_request(), Duration::from_millis(50), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(_)));
    }

    #[test]
    fn test_category_guidance_fallback() {
        assert!(category_guidance("MOBILE").contains("data allowance"));
        assert_eq!(category_guidance("PETS"), DEFAULT_GUIDANCE);
    }
}
