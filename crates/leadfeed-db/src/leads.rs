//! Database operations for the `leads` table.
//!
//! `post_url` carries a UNIQUE constraint and is the only dedup key. A row's
//! `is_emailed` flag moves from false to true exactly once and is never reset;
//! rows are never deleted here.

use chrono::{DateTime, Utc};
use leadfeed_core::NewLead;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::DbError;

/// Keeps each `IN (...)` list well below SQLite's bound-parameter limit.
const MARK_CHUNK_SIZE: usize = 500;

/// A row from the `leads` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LeadRow {
    pub id: i64,
    pub profile_url: Option<String>,
    pub user_name: Option<String>,
    pub post_content: Option<String>,
    pub posted_timestamp: Option<DateTime<Utc>>,
    pub post_url: String,
    pub scraped_at: DateTime<Utc>,
    /// `true` once the lead has been handed to downstream reporting.
    pub is_emailed: bool,
    pub search_query_ref: Option<String>,
}

/// Inserts a lead unless its `post_url` is already stored.
///
/// Returns `true` if a new row was created and `false` if the `post_url`
/// already exists. A duplicate is an expected outcome, not an error.
///
/// # Errors
///
/// Returns [`DbError::MissingPostUrl`] if `post_url` is blank, or
/// [`DbError::Sqlx`] for any other backing-store failure.
pub async fn insert_lead(pool: &SqlitePool, lead: &NewLead) -> Result<bool, DbError> {
    if lead.post_url.trim().is_empty() {
        return Err(DbError::MissingPostUrl);
    }

    let result = sqlx::query(
        "INSERT INTO leads \
             (profile_url, user_name, post_content, posted_timestamp, post_url, \
              scraped_at, is_emailed, search_query_ref) \
         VALUES (?, ?, ?, ?, ?, ?, FALSE, ?) \
         ON CONFLICT (post_url) DO NOTHING",
    )
    .bind(&lead.profile_url)
    .bind(&lead.user_name)
    .bind(&lead.post_content)
    .bind(lead.posted_at)
    .bind(&lead.post_url)
    .bind(lead.scraped_at)
    .bind(&lead.query_ref)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns every lead not yet delivered, newest capture first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_undelivered_leads(pool: &SqlitePool) -> Result<Vec<LeadRow>, DbError> {
    let rows = sqlx::query_as::<_, LeadRow>(
        "SELECT id, profile_url, user_name, post_content, posted_timestamp, post_url, \
                scraped_at, is_emailed, search_query_ref \
         FROM leads \
         WHERE is_emailed = FALSE \
         ORDER BY scraped_at DESC, posted_timestamp DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks the given leads as delivered.
///
/// Ids that are unknown or already delivered are ignored, so repeating a call
/// is a no-op. An empty slice does not touch the database. Returns the number
/// of rows that flipped from undelivered to delivered.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails; no row is changed in that
/// case because all chunks run in one transaction.
pub async fn mark_leads_delivered(pool: &SqlitePool, ids: &[i64]) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut flipped: u64 = 0;

    for chunk in ids.chunks(MARK_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "UPDATE leads SET is_emailed = TRUE WHERE is_emailed = FALSE AND id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&mut *tx).await?;
        flipped += result.rows_affected();
    }

    tx.commit().await?;
    Ok(flipped)
}

/// Fetches a single lead by its canonical `post_url`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_lead_by_post_url(
    pool: &SqlitePool,
    post_url: &str,
) -> Result<Option<LeadRow>, DbError> {
    let row = sqlx::query_as::<_, LeadRow>(
        "SELECT id, profile_url, user_name, post_content, posted_timestamp, post_url, \
                scraped_at, is_emailed, search_query_ref \
         FROM leads \
         WHERE post_url = ?",
    )
    .bind(post_url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Total number of stored leads, delivered or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_leads(pool: &SqlitePool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
#[path = "leads_test.rs"]
mod tests;
