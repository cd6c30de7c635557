//! Background cache janitor
//!
//! Removes expired suggestions on a fixed interval, independently of request
//! handling. Each sweep runs on the blocking pool under its own timeout so a
//! slow store can never stall the runtime.
//!
//! Country invalidation is triggered explicitly by whoever edits the budget
//! locale, not by the timer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::JanitorConfig;
use crate::db::Database;
use crate::error::{Error, Result};

/// Sweeps expired entries out of the suggestion cache
#[derive(Clone)]
pub struct CacheJanitor {
    db: Database,
    clock: Arc<dyn Clock>,
    config: JanitorConfig,
}

impl CacheJanitor {
    pub fn new(db: Database, config: JanitorConfig) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the time source (tests use a `FixedClock`)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Remove every entry expired as of the clock's current time
    ///
    /// Fails if the store does not answer within `sweep_timeout`.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.sweep_expired_at(self.clock.now()).await
    }

    /// Remove every entry expired as of `now`
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || db.delete_expired_suggestions(now));

        let removed = match tokio::time::timeout(self.config.sweep_timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(Error::Io(std::io::Error::other(format!(
                    "cache sweep task failed: {}",
                    join_error
                ))))
            }
            Err(_) => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "cache sweep exceeded {} ms",
                        self.config.sweep_timeout.as_millis()
                    ),
                )))
            }
        };

        info!(removed, "Swept expired suggestions");
        Ok(removed)
    }

    /// Drop every cached suggestion for a country
    ///
    /// Called when a budget's country or currency changes, so suggestions
    /// computed under the old locale are never served.
    pub fn invalidate_country(&self, country: &str) -> Result<usize> {
        let removed = self.db.invalidate_country(country)?;
        info!(country = %country, removed, "Invalidated suggestions for country");
        Ok(removed)
    }

    /// Run sweeps forever on the configured interval
    ///
    /// The first sweep happens one interval after start. Abort the returned
    /// handle to stop the janitor.
    pub fn start(self) -> JoinHandle<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting cache janitor"
        );

        tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);

            // Skip the first immediate tick - no sweep on startup
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if let Err(e) = self.sweep_expired().await {
                    error!(error = %e, "Cache sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::MarketSuggestion;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;

    fn entry(country: &str, category: &str, computed: DateTime<Utc>) -> MarketSuggestion {
        MarketSuggestion {
            category: category.to_string(),
            country: country.to_string(),
            merchant_name: None,
            competitors: vec![],
            last_updated: computed,
            expires_at: computed + ChronoDuration::days(30),
        }
    }

    fn config(interval: Duration) -> JanitorConfig {
        JanitorConfig {
            interval,
            sweep_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_sweep_uses_clock() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        let db = Database::in_memory().unwrap();
        db.put_suggestion(&entry("FR", "MOBILE", start)).unwrap();
        db.put_suggestion(&entry("FR", "ENERGY", start + ChronoDuration::days(5)))
            .unwrap();

        let janitor =
            CacheJanitor::new(db.clone(), config(Duration::from_secs(3600))).with_clock(Arc::new(clock.clone()));

        assert_eq!(janitor.sweep_expired().await.unwrap(), 0);

        clock.advance(ChronoDuration::days(31));
        assert_eq!(janitor.sweep_expired().await.unwrap(), 1);
        assert_eq!(db.list_suggestions(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_country() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let db = Database::in_memory().unwrap();
        db.put_suggestion(&entry("FR", "MOBILE", now)).unwrap();
        db.put_suggestion(&entry("DE", "MOBILE", now)).unwrap();

        let janitor = CacheJanitor::new(db.clone(), config(Duration::from_secs(3600)));
        assert_eq!(janitor.invalidate_country("FR").unwrap(), 1);
        assert_eq!(janitor.invalidate_country("FR").unwrap(), 0);
        assert_eq!(db.list_suggestions(None).unwrap()[0].country, "DE");
    }

    #[tokio::test]
    async fn test_background_task_sweeps() {
        let long_ago = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let db = Database::in_memory().unwrap();
        db.put_suggestion(&entry("FR", "MOBILE", long_ago)).unwrap();

        let handle = CacheJanitor::new(db.clone(), config(Duration::from_millis(50))).start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();

        assert!(db.list_suggestions(None).unwrap().is_empty());
    }
}
