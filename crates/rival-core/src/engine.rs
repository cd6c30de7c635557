//! Suggestion engine
//!
//! Runs the pipeline for one charge (normalize, cache lookup, search on miss,
//! curate, store) and for a whole budget at once.
//!
//! Store failures never fail a request: a failed read is a cache miss and a
//! failed write is logged and dropped. Search failures never reach the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::classify::{is_suggestion_relevant, normalize_request};
use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, SearchMode};
use crate::curate::{curate_with_limit, CurationContext};
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    AnalysisOutcome, AnalysisRequest, BulkAnalysisResult, Charge, ChargeFailure,
    ChargeSuggestion, CompetitorOffer, Locale, MarketSuggestion, NewSearchMetric,
    NormalizedRequest, Provenance,
};
use crate::search::CompetitorSearchGateway;

/// Competitive-offer engine backed by the suggestion cache
#[derive(Clone)]
pub struct SuggestionEngine {
    db: Database,
    gateway: CompetitorSearchGateway,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl SuggestionEngine {
    pub fn new(db: Database, gateway: CompetitorSearchGateway, config: EngineConfig) -> Self {
        Self {
            db,
            gateway,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the time source (tests use a `FixedClock`)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time at storage precision
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }

    /// Analyze one charge, returning every failure to the caller
    pub async fn lookup(
        &self,
        request: &AnalysisRequest,
        mode: SearchMode,
    ) -> Result<AnalysisOutcome> {
        self.lookup_within(request, self.config.search.timeout(mode))
            .await
    }

    /// Same as [`lookup`](Self::lookup) with an explicit search deadline
    pub async fn lookup_within(
        &self,
        request: &AnalysisRequest,
        deadline: Duration,
    ) -> Result<AnalysisOutcome> {
        request.validate()?;
        let normalized = normalize_request(request);
        let now = self.now();

        if let Some(cached) = self.cached(&normalized, now) {
            let mut suggestion = cached;
            suggestion.competitors = self.curate(suggestion.competitors, &normalized);
            return Ok(outcome(suggestion, Provenance::CacheHit, &normalized));
        }

        let offers = self.search(&normalized, deadline, now).await?;

        let suggestion = MarketSuggestion {
            category: normalized.category.clone(),
            country: normalized.country.clone(),
            merchant_name: normalized.merchant_name.clone(),
            competitors: self.curate(offers, &normalized),
            last_updated: now,
            expires_at: now + self.config.cache.ttl,
        };
        self.store(&suggestion);

        Ok(outcome(suggestion, Provenance::Computed, &normalized))
    }

    /// Analyze one charge, failing open on search errors
    ///
    /// Invalid requests are still rejected. When the collaborator is
    /// unreachable or answers garbage, an empty suggestion tagged
    /// [`Provenance::Degraded`] is returned; it is never cached.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        mode: SearchMode,
    ) -> Result<AnalysisOutcome> {
        match self.lookup(request, mode).await {
            Err(e) if e.is_search_failure() => {
                warn!(
                    category = %request.category,
                    country = %request.country,
                    error = %e,
                    "Competitor search failed, returning empty suggestion"
                );
                let normalized = normalize_request(request);
                let now = self.now();
                let suggestion = MarketSuggestion {
                    category: normalized.category.clone(),
                    country: normalized.country.clone(),
                    merchant_name: normalized.merchant_name.clone(),
                    competitors: Vec::new(),
                    last_updated: now,
                    expires_at: now + self.config.cache.ttl,
                };
                Ok(outcome(
                    suggestion,
                    Provenance::Degraded {
                        reason: e.to_string(),
                    },
                    &normalized,
                ))
            }
            other => other,
        }
    }

    /// Analyze every relevant charge of a budget
    ///
    /// Charges run concurrently (bounded by `bulk.concurrency`) and results
    /// keep the input order. A failing charge is reported in `failures` and
    /// never aborts the batch.
    pub async fn analyze_batch(
        &self,
        charges: &[Charge],
        locale: &Locale,
        household_size: u32,
    ) -> BulkAnalysisResult {
        let household_size = household_size.max(1);
        let mut result = BulkAnalysisResult {
            household_size,
            ..Default::default()
        };

        let relevant: Vec<&Charge> = charges
            .iter()
            .filter(|charge| {
                let relevant = is_suggestion_relevant(&charge.category);
                if !relevant {
                    debug!(charge = %charge.id, category = %charge.category, "Skipping charge");
                }
                relevant
            })
            .collect();
        result.skipped = (charges.len() - relevant.len()) as u32;

        let outcomes: Vec<(&Charge, Result<AnalysisOutcome>)> = stream::iter(relevant)
            .map(|charge| async move {
                let request = charge_request(charge, locale, household_size);
                let outcome = self.lookup(&request, SearchMode::Full).await;
                (charge, outcome)
            })
            .buffered(self.config.bulk_concurrency.max(1))
            .collect()
            .await;

        for (charge, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    if outcome.provenance.is_cache_hit() {
                        result.cache_hits += 1;
                    } else {
                        result.ai_calls += 1;
                    }
                    result.total_potential_savings += outcome.suggestion.best_savings();
                    result.suggestions.push(ChargeSuggestion {
                        charge_id: charge.id.clone(),
                        charge_label: charge.label.clone(),
                        suggestion: outcome.suggestion,
                        provenance: outcome.provenance,
                    });
                }
                Err(e) => {
                    warn!(charge = %charge.id, error = %e, "Charge analysis failed");
                    result.failures.push(ChargeFailure {
                        charge_id: charge.id.clone(),
                        charge_label: charge.label.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            analyzed = result.suggestions.len(),
            cache_hits = result.cache_hits,
            ai_calls = result.ai_calls,
            skipped = result.skipped,
            failed = result.failures.len(),
            "Bulk analysis complete"
        );

        result
    }

    /// Read a live cache entry; store errors count as a miss
    fn cached(&self, request: &NormalizedRequest, now: DateTime<Utc>) -> Option<MarketSuggestion> {
        match self.db.get_suggestion(
            &request.category,
            &request.country,
            request.merchant_name.as_deref(),
            now,
        ) {
            Ok(Some(suggestion)) => {
                debug!(
                    category = %request.category,
                    country = %request.country,
                    merchant = request.merchant_name.as_deref().unwrap_or(""),
                    "Cache hit"
                );
                Some(suggestion)
            }
            Ok(None) => {
                debug!(
                    category = %request.category,
                    country = %request.country,
                    merchant = request.merchant_name.as_deref().unwrap_or(""),
                    "Cache miss"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Suggestion cache read failed, treating as miss");
                None
            }
        }
    }

    async fn search(
        &self,
        request: &NormalizedRequest,
        deadline: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompetitorOffer>> {
        let started = Instant::now();
        let result = self
            .gateway
            .search_with_deadline(request, deadline, self.config.cache.max_competitors)
            .await;

        let metric = NewSearchMetric {
            category: request.category.clone(),
            country: request.country.clone(),
            model: self.gateway.model().to_string(),
            latency_ms: started.elapsed().as_millis() as i64,
            success: result.is_ok(),
            offer_count: result.as_ref().map(|o| o.len() as i64).unwrap_or(0),
            error_message: result.as_ref().err().map(|e| e.to_string()),
        };
        if let Err(e) = self.db.record_search_metric(&metric, now) {
            warn!(error = %e, "Failed to record search metric");
        }

        result
    }

    fn curate(
        &self,
        offers: Vec<CompetitorOffer>,
        request: &NormalizedRequest,
    ) -> Vec<CompetitorOffer> {
        let ctx = CurationContext {
            merchant_name: request.merchant_name.as_deref(),
            effective_amount: request.effective_amount,
            household_size: request.household_size,
            charge_type: request.charge_type,
        };
        curate_with_limit(offers, &ctx, self.config.cache.max_competitors)
    }

    /// Best-effort cache write
    fn store(&self, suggestion: &MarketSuggestion) {
        match self.db.put_suggestion(suggestion) {
            Ok(true) => info!(
                category = %suggestion.category,
                country = %suggestion.country,
                competitors = suggestion.competitors.len(),
                "Cached market suggestion"
            ),
            Ok(false) => debug!(
                category = %suggestion.category,
                country = %suggestion.country,
                "Suggestion already cached by a concurrent search, keeping stored entry"
            ),
            Err(e) => warn!(error = %e, "Failed to cache market suggestion"),
        }
    }
}

fn outcome(
    suggestion: MarketSuggestion,
    provenance: Provenance,
    request: &NormalizedRequest,
) -> AnalysisOutcome {
    AnalysisOutcome {
        suggestion,
        provenance,
        effective_amount: request.effective_amount,
        charge_type: request.charge_type,
    }
}

/// Build the single-charge request for a budget charge
fn charge_request(charge: &Charge, locale: &Locale, household_size: u32) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(&charge.category, charge.amount, locale)
        .with_household_size(household_size);
    if let Some(merchant) = charge.merchant_name.as_deref() {
        request = request.with_merchant(merchant);
    }
    if let Some(details) = charge.details.as_deref() {
        request = request.with_details(details);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend, MockResponse};
    use crate::clock::FixedClock;
    use crate::error::Error;
    use crate::models::ChargeType;
    use crate::prompts::PromptLibrary;
    use chrono::TimeZone;

    struct Harness {
        engine: SuggestionEngine,
        mock: MockBackend,
        clock: FixedClock,
    }

    fn harness() -> Harness {
        let mock = MockBackend::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap());
        let config = EngineConfig::default();
        let gateway = CompetitorSearchGateway::from_library(
            AIClient::Mock(mock.clone()),
            &PromptLibrary::embedded_only(),
            config.search.clone(),
        )
        .unwrap();
        let engine = SuggestionEngine::new(Database::in_memory().unwrap(), gateway, config)
            .with_clock(Arc::new(clock.clone()));
        Harness {
            engine,
            mock,
            clock,
        }
    }

    fn locale() -> Locale {
        Locale::new("FR", "EUR")
    }

    fn mobile() -> AnalysisRequest {
        AnalysisRequest::new("MOBILE", 60.0, &locale())
            .with_merchant("Orange")
            .with_household_size(3)
    }

    #[tokio::test]
    async fn test_miss_then_hit_calls_search_once() {
        let h = harness();

        let first = h.engine.lookup(&mobile(), SearchMode::Quick).await.unwrap();
        assert_eq!(first.provenance, Provenance::Computed);
        assert_eq!(first.effective_amount, 20.0);
        assert_eq!(first.charge_type, ChargeType::PerIndividual);

        let second = h.engine.lookup(&mobile(), SearchMode::Quick).await.unwrap();
        assert_eq!(second.provenance, Provenance::CacheHit);
        assert_eq!(h.mock.call_count(), 1);

        let names = |o: &AnalysisOutcome| {
            o.suggestion
                .competitors
                .iter()
                .map(|c| c.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[tokio::test]
    async fn test_hit_recomputes_savings_for_caller() {
        let h = harness();
        let first = h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();
        // Budget Direct at 12.00 vs 20.00 per person, 3 people
        assert_eq!(first.suggestion.competitors[0].potential_savings, 288.0);

        // Same key, now a 2-person household paying 60 in total
        let request = mobile().with_household_size(2);
        let second = h.engine.lookup(&request, SearchMode::Full).await.unwrap();
        assert!(second.provenance.is_cache_hit());
        assert_eq!(second.effective_amount, 30.0);
        assert_eq!(second.suggestion.competitors[0].potential_savings, 432.0);
        assert_eq!(h.mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_fresh_search() {
        let h = harness();
        h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();

        h.clock.advance(chrono::Duration::days(30));
        let again = h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();
        assert_eq!(again.provenance, Provenance::Computed);
        assert_eq!(h.mock.call_count(), 2);

        // The refreshed entry is served from cache afterwards
        let third = h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();
        assert!(third.provenance.is_cache_hit());
        assert_eq!(h.mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_validation_error_skips_pipeline() {
        let h = harness();
        let request = AnalysisRequest::new("MOBILE", 0.0, &locale());
        assert!(matches!(
            h.engine.analyze(&request, SearchMode::Quick).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(h.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_failure_is_not_cached() {
        let h = harness();
        h.mock.push(MockResponse::Unavailable("down".into()));

        let err = h.engine.lookup(&mobile(), SearchMode::Quick).await.unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(_)));
        assert!(h.engine.db().list_suggestions(None).unwrap().is_empty());

        // Next call searches again and succeeds
        let ok = h.engine.lookup(&mobile(), SearchMode::Quick).await.unwrap();
        assert_eq!(ok.provenance, Provenance::Computed);
        assert_eq!(h.mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_analyze_degrades_on_malformed_response() {
        let h = harness();
        h.mock.push_text("Here are some offers: Free, Sosh");

        let outcome = h.engine.analyze(&mobile(), SearchMode::Quick).await.unwrap();
        assert!(matches!(outcome.provenance, Provenance::Degraded { .. }));
        assert!(outcome.suggestion.competitors.is_empty());
        assert!(h.engine.db().list_suggestions(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_entry() {
        let h = harness();
        h.mock.push(MockResponse::Delayed(
            Duration::from_secs(5),
            r#"{"competitors": []}"#.into(),
        ));

        let err = h
            .engine
            .lookup_within(&mobile(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(_)));
        assert!(h.engine.db().list_suggestions(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_answer_is_cached() {
        let h = harness();
        h.mock.push_text(r#"{"competitors": []}"#);

        let first = h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();
        assert!(first.suggestion.competitors.is_empty());
        let second = h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();
        assert!(second.provenance.is_cache_hit());
        assert_eq!(h.mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_search_metrics_recorded() {
        let h = harness();
        h.mock.push(MockResponse::Unavailable("down".into()));
        let _ = h.engine.lookup(&mobile(), SearchMode::Full).await;
        h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();
        h.engine.lookup(&mobile(), SearchMode::Full).await.unwrap();

        let since = h.clock.now() - chrono::Duration::hours(1);
        let summary = h.engine.db().search_metric_summary(since).unwrap();
        assert_eq!(summary.total_calls, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_batch_counts_and_order() {
        let h = harness();
        let charges = vec![
            Charge {
                id: "c1".into(),
                label: "Phones".into(),
                category: "MOBILE".into(),
                amount: 60.0,
                merchant_name: Some("Orange".into()),
                details: None,
            },
            Charge {
                id: "c2".into(),
                label: "Groceries".into(),
                category: "FOOD".into(),
                amount: 400.0,
                merchant_name: None,
                details: None,
            },
            Charge {
                id: "c3".into(),
                label: "Power".into(),
                category: "ENERGY".into(),
                amount: 150.0,
                merchant_name: None,
                details: None,
            },
        ];

        // Warm the cache for the energy charge only
        h.engine
            .lookup(
                &AnalysisRequest::new("ENERGY", 150.0, &locale()).with_household_size(3),
                SearchMode::Full,
            )
            .await
            .unwrap();

        let result = h.engine.analyze_batch(&charges, &locale(), 3).await;
        assert_eq!(result.household_size, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.cache_hits, 1);
        assert_eq!(result.ai_calls, 1);
        assert!(result.failures.is_empty());

        let ids: Vec<_> = result.suggestions.iter().map(|s| s.charge_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);

        // MOBILE: (20 - 12) * 12 * 3 = 288; ENERGY: (150 - 90) * 12 = 720
        assert_eq!(result.total_potential_savings, 288.0 + 720.0);
    }

    #[tokio::test]
    async fn test_batch_reports_failures_without_aborting() {
        let h = harness();
        h.mock.push(MockResponse::Unavailable("down".into()));

        let charges = vec![
            Charge {
                id: "bad".into(),
                label: "Phones".into(),
                category: "MOBILE".into(),
                amount: 60.0,
                merchant_name: None,
                details: None,
            },
            Charge {
                id: "good".into(),
                label: "Internet".into(),
                category: "INTERNET".into(),
                amount: 40.0,
                merchant_name: None,
                details: None,
            },
        ];

        let mut engine = h.engine.clone();
        engine.config.bulk_concurrency = 1;
        let result = engine.analyze_batch(&charges, &locale(), 2).await;

        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].charge_id, "good");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].charge_id, "bad");
        assert_eq!(result.ai_calls, 1);
        assert_eq!(result.cache_hits, 0);
    }
}
