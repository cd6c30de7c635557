//! Competitor search metrics database operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, Database};
use crate::error::Result;
use crate::models::{NewSearchMetric, SearchMetricSummary};

impl Database {
    /// Record a competitor search call
    pub fn record_search_metric(
        &self,
        metric: &NewSearchMetric,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO search_metrics (
                category, country, model, latency_ms, success,
                offer_count, error_message, started_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                metric.category,
                metric.country,
                metric.model,
                metric.latency_ms,
                metric.success,
                metric.offer_count,
                metric.error_message,
                format_datetime(&started_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Aggregate search calls started at or after `since`
    pub fn search_metric_summary(&self, since: DateTime<Utc>) -> Result<SearchMetricSummary> {
        let conn = self.conn()?;

        let summary = conn.query_row(
            r#"
            SELECT
                COUNT(*) as total,
                COALESCE(SUM(CASE WHEN success THEN 1 ELSE 0 END), 0) as successful,
                COALESCE(SUM(CASE WHEN NOT success THEN 1 ELSE 0 END), 0) as failed,
                COALESCE(AVG(latency_ms), 0.0) as avg_latency
            FROM search_metrics
            WHERE started_at >= ?
            "#,
            params![format_datetime(&since)],
            |row| {
                Ok(SearchMetricSummary {
                    total_calls: row.get(0)?,
                    successful: row.get(1)?,
                    failed: row.get(2)?,
                    avg_latency_ms: row.get(3)?,
                })
            },
        )?;

        Ok(summary)
    }
}
