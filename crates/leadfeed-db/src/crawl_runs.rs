//! Database operations for `crawl_runs`.
//!
//! One row is written per pipeline run that reached the store. Rows are
//! append-only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a run's delivery handoff ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Delivered,
    NothingToDeliver,
    HandoffFailed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Delivered => "delivered",
            RunStatus::NothingToDeliver => "nothing_to_deliver",
            RunStatus::HandoffFailed => "handoff_failed",
        }
    }
}

/// Summary counters for a finished run, as handed to [`record_crawl_run`].
#[derive(Debug, Clone)]
pub struct NewCrawlRun {
    pub query_ref: String,
    pub search_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub crawl_state: String,
    pub nodes_found: i64,
    pub extracted: i64,
    pub extraction_errors: i64,
    pub inserted: i64,
    pub duplicates: i64,
    pub storage_errors: i64,
    pub backlog: i64,
    pub delivered: i64,
    pub status: RunStatus,
    pub error_message: Option<String>,
}

/// A row from the `crawl_runs` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CrawlRunRow {
    pub id: i64,
    pub query_ref: String,
    pub search_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub crawl_state: String,
    pub nodes_found: i64,
    pub extracted: i64,
    pub extraction_errors: i64,
    pub inserted: i64,
    pub duplicates: i64,
    pub storage_errors: i64,
    pub backlog: i64,
    pub delivered: i64,
    /// One of `delivered`, `nothing_to_deliver`, `handoff_failed`.
    pub status: String,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Appends a run summary and returns the new row's id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_crawl_run(pool: &SqlitePool, run: &NewCrawlRun) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO crawl_runs \
             (query_ref, search_url, started_at, finished_at, crawl_state, \
              nodes_found, extracted, extraction_errors, inserted, duplicates, \
              storage_errors, backlog, delivered, status, error_message) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(&run.query_ref)
    .bind(&run.search_url)
    .bind(run.started_at)
    .bind(run.finished_at)
    .bind(&run.crawl_state)
    .bind(run.nodes_found)
    .bind(run.extracted)
    .bind(run.extraction_errors)
    .bind(run.inserted)
    .bind(run.duplicates)
    .bind(run.storage_errors)
    .bind(run.backlog)
    .bind(run.delivered)
    .bind(run.status.as_str())
    .bind(&run.error_message)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns the most recent runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_crawl_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<CrawlRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CrawlRunRow>(
        "SELECT id, query_ref, search_url, started_at, finished_at, crawl_state, \
                nodes_found, extracted, extraction_errors, inserted, duplicates, \
                storage_errors, backlog, delivered, status, error_message \
         FROM crawl_runs \
         ORDER BY started_at DESC, id DESC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
