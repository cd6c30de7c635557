//! Suggestion cache operations
//!
//! Rows are keyed by (category, country, merchant_key). Writes are
//! insert-or-ignore against live rows: when two searches for the same key
//! race, the first committed row wins and later writes are discarded. A row
//! that had already expired when the new result was computed is replaced, so
//! a refresh does not have to wait for the janitor. Reads never modify rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::classify::canonical_category;
use crate::curate::MAX_COMPETITORS;
use crate::error::{Error, Result};
use crate::models::{CacheStats, CompetitorOffer, MarketSuggestion};

/// Cache key for a merchant name
///
/// Trimmed and lower-cased; `None` or blank maps to `""`, the generic
/// category-level entry.
pub fn merchant_key(merchant: Option<&str>) -> String {
    merchant
        .map(|m| m.trim().to_lowercase())
        .unwrap_or_default()
}

fn country_key(country: &str) -> String {
    country.trim().to_uppercase()
}

impl Database {
    /// Get a live cache entry for an exact key
    ///
    /// A merchant-specific lookup never falls back to the generic entry, and
    /// vice versa. Entries with `expires_at <= now` are treated as absent.
    pub fn get_suggestion(
        &self,
        category: &str,
        country: &str,
        merchant: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<MarketSuggestion>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            r#"
            SELECT category, country, merchant_name, competitors, last_updated, expires_at
            FROM market_suggestions
            WHERE category = ? AND country = ? AND merchant_key = ? AND expires_at > ?
            "#,
            params![
                canonical_category(category),
                country_key(country),
                merchant_key(merchant),
                format_datetime(&now),
            ],
            |row| self.row_to_suggestion(row),
        );

        match result {
            Ok(suggestion) => Ok(Some(suggestion)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a computed suggestion
    ///
    /// Returns `false` when a live row already existed for the key, in which
    /// case the stored row is left untouched.
    pub fn put_suggestion(&self, suggestion: &MarketSuggestion) -> Result<bool> {
        if suggestion.expires_at <= suggestion.last_updated {
            return Err(Error::Validation(
                "suggestion must expire after it was computed".into(),
            ));
        }
        if suggestion.competitors.len() > MAX_COMPETITORS {
            return Err(Error::Validation(format!(
                "suggestion holds {} competitors, at most {} allowed",
                suggestion.competitors.len(),
                MAX_COMPETITORS
            )));
        }

        let competitors = serde_json::to_string(&suggestion.competitors)?;
        let merchant_name = suggestion
            .merchant_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT INTO market_suggestions (
                category, country, merchant_key, merchant_name, competitors,
                last_updated, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(category, country, merchant_key) DO UPDATE SET
                merchant_name = excluded.merchant_name,
                competitors = excluded.competitors,
                last_updated = excluded.last_updated,
                expires_at = excluded.expires_at
            WHERE market_suggestions.expires_at <= excluded.last_updated
            "#,
            params![
                canonical_category(&suggestion.category),
                country_key(&suggestion.country),
                merchant_key(merchant_name),
                merchant_name,
                competitors,
                format_datetime(&suggestion.last_updated),
                format_datetime(&suggestion.expires_at),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Delete every entry whose expiry is at or before `now`
    pub fn delete_expired_suggestions(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM market_suggestions WHERE expires_at <= ?",
            params![format_datetime(&now)],
        )?;
        Ok(removed)
    }

    /// Delete every entry for a country, live or not
    pub fn invalidate_country(&self, country: &str) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM market_suggestions WHERE country = ?",
            params![country_key(country)],
        )?;
        Ok(removed)
    }

    /// Count entries, split by liveness and country
    pub fn cache_stats(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let conn = self.conn()?;

        let (total, live): (i64, i64) = conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN expires_at > ? THEN 1 ELSE 0 END), 0)
            FROM market_suggestions
            "#,
            params![format_datetime(&now)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT country, COUNT(*) FROM market_suggestions
            GROUP BY country
            ORDER BY country
            "#,
        )?;
        let by_country = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(String, i64)>, _>>()?;

        Ok(CacheStats {
            total,
            live,
            expired: total - live,
            by_country,
        })
    }

    /// List stored entries, optionally for one country
    pub fn list_suggestions(&self, country: Option<&str>) -> Result<Vec<MarketSuggestion>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category, country, merchant_name, competitors, last_updated, expires_at
            FROM market_suggestions
            WHERE ?1 IS NULL OR country = ?1
            ORDER BY country, category, merchant_key
            "#,
        )?;

        let suggestions = stmt
            .query_map(params![country.map(country_key)], |row| {
                self.row_to_suggestion(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(suggestions)
    }

    fn row_to_suggestion(&self, row: &Row) -> rusqlite::Result<MarketSuggestion> {
        let competitors_json: String = row.get(3)?;
        let competitors: Vec<CompetitorOffer> = serde_json::from_str(&competitors_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(MarketSuggestion {
            category: row.get(0)?,
            country: row.get(1)?,
            merchant_name: row.get(2)?,
            competitors,
            last_updated: datetime_column(row, 4)?,
            expires_at: datetime_column(row, 5)?,
        })
    }
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {}", raw).into(),
        )
    })
}
