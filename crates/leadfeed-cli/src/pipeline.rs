//! Crawl → extract/normalize → dedup-insert → handoff → mark-delivered.
//!
//! Re-running is always safe: inserts are idempotent on `post_url`, and rows
//! are only marked delivered after the reporter confirms the handoff. A
//! failed handoff leaves the whole backlog in place for the next run.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use leadfeed_core::NewLead;
use leadfeed_db::{NewCrawlRun, RunStatus};
use leadfeed_scraper::{
    normalize_posted_date, CrawlState, ErrorRecord, ExtractedPost, FieldExtractor, PageCrawler,
    PageDriver,
};
use sqlx::SqlitePool;

use crate::report::Reporter;

/// Where a non-dry run writes and delivers.
pub(crate) struct Delivery<'a> {
    pub pool: &'a SqlitePool,
    pub reporter: &'a dyn Reporter,
}

pub(crate) struct PipelineRequest<'a> {
    pub search_url: &'a str,
    pub query_ref: &'a str,
    /// Pause between posts while extracting.
    pub post_delay: Duration,
}

/// How the backlog handoff ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Handoff {
    /// Dry run, or the crawl produced nothing.
    Skipped,
    NothingToDeliver,
    Delivered,
    Failed(String),
}

#[derive(Debug)]
pub(crate) struct PipelineReport {
    pub crawl_state: CrawlState,
    pub nodes_found: usize,
    pub leads: Vec<NewLead>,
    pub extraction_errors: Vec<ErrorRecord>,
    pub inserted: usize,
    pub duplicates: usize,
    pub storage_errors: usize,
    pub backlog: usize,
    pub delivered: u64,
    pub handoff: Handoff,
    pub diagnostics: Vec<PathBuf>,
}

impl PipelineReport {
    fn new(crawl_state: CrawlState, nodes_found: usize, diagnostics: Vec<PathBuf>) -> Self {
        Self {
            crawl_state,
            nodes_found,
            leads: Vec::new(),
            extraction_errors: Vec::new(),
            inserted: 0,
            duplicates: 0,
            storage_errors: 0,
            backlog: 0,
            delivered: 0,
            handoff: Handoff::Skipped,
            diagnostics,
        }
    }

    #[must_use]
    pub fn crawl_empty(&self) -> bool {
        self.nodes_found == 0
    }
}

/// Runs every node through the extractor, pausing `post_delay` between
/// posts. Error records are collected, never raised.
pub(crate) fn extract_all<D: PageDriver>(
    driver: &mut D,
    extractor: &FieldExtractor,
    nodes: &[D::Node],
    post_delay: Duration,
) -> (Vec<ExtractedPost>, Vec<ErrorRecord>) {
    let mut posts = Vec::with_capacity(nodes.len());
    let mut errors = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        if index > 0 {
            driver.pause(post_delay);
        }
        tracing::debug!(index, total = nodes.len(), "processing post");
        match extractor.extract(driver, node, index) {
            Ok(post) => posts.push(post),
            Err(record) => errors.push(record),
        }
    }

    tracing::info!(
        processed = nodes.len(),
        extracted = posts.len(),
        errors = errors.len(),
        "extraction finished"
    );
    (posts, errors)
}

/// Turns an extracted post into an insertable lead captured at `scraped_at`.
/// Unparseable date text falls back to the capture time.
pub(crate) fn to_new_lead(post: ExtractedPost, query_ref: &str, scraped_at: DateTime<Utc>) -> NewLead {
    let posted_at = normalize_posted_date(&post.posted_text, scraped_at).unwrap_or_else(|| {
        tracing::debug!(
            post_url = %post.post_url,
            posted_text = %post.posted_text,
            "posted date not recognized; using capture time"
        );
        scraped_at
    });

    NewLead {
        post_url: post.post_url,
        profile_url: post.profile_url,
        user_name: post.user_name,
        post_content: post.post_content,
        posted_at,
        scraped_at,
        query_ref: query_ref.to_string(),
    }
}

/// Runs one full pipeline pass. `delivery: None` is a dry run that never
/// touches the store.
///
/// # Errors
///
/// Returns an error only if the undelivered backlog cannot be read or the
/// delivery marking fails. Per-record extraction and storage faults are
/// counted in the report instead.
pub(crate) async fn run_pipeline<D: PageDriver>(
    driver: &mut D,
    crawler: &PageCrawler,
    extractor: &FieldExtractor,
    request: &PipelineRequest<'_>,
    delivery: Option<Delivery<'_>>,
) -> anyhow::Result<PipelineReport> {
    let started_at = Utc::now();
    let outcome = crawler.crawl(driver, request.search_url);
    let mut report = PipelineReport::new(outcome.state, outcome.nodes.len(), outcome.diagnostics);

    if outcome.nodes.is_empty() {
        tracing::info!(state = %outcome.state, "crawl returned no posts; store untouched");
        return Ok(report);
    }

    let (posts, errors) = extract_all(driver, extractor, &outcome.nodes, request.post_delay);
    report.extraction_errors = errors;
    report.leads = posts
        .into_iter()
        .map(|post| to_new_lead(post, request.query_ref, Utc::now()))
        .collect();

    let Some(Delivery { pool, reporter }) = delivery else {
        tracing::info!(leads = report.leads.len(), "dry run; skipping store and handoff");
        return Ok(report);
    };

    for lead in &report.leads {
        match leadfeed_db::insert_lead(pool, lead).await {
            Ok(true) => report.inserted += 1,
            Ok(false) => {
                report.duplicates += 1;
                tracing::info!(post_url = %lead.post_url, "already stored; skipping duplicate");
            }
            Err(e) => {
                report.storage_errors += 1;
                tracing::error!(post_url = %lead.post_url, error = %e, "failed to store lead");
            }
        }
    }

    let backlog = leadfeed_db::list_undelivered_leads(pool).await?;
    report.backlog = backlog.len();

    if backlog.is_empty() {
        tracing::info!("no undelivered leads; nothing to hand off");
        report.handoff = Handoff::NothingToDeliver;
    } else {
        match reporter.deliver(&backlog) {
            Ok(()) => {
                let ids: Vec<i64> = backlog.iter().map(|row| row.id).collect();
                report.delivered = leadfeed_db::mark_leads_delivered(pool, &ids).await?;
                report.handoff = Handoff::Delivered;
                tracing::info!(delivered = report.delivered, "backlog delivered");
            }
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::warn!(
                    backlog = backlog.len(),
                    error = %reason,
                    "handoff failed; backlog left undelivered for the next run"
                );
                report.handoff = Handoff::Failed(reason);
            }
        }
    }

    record_run_best_effort(pool, request, &report, started_at).await;
    Ok(report)
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Appends the run summary. A failure here is logged and does not fail the
/// run, since the leads themselves are already stored.
async fn record_run_best_effort(
    pool: &SqlitePool,
    request: &PipelineRequest<'_>,
    report: &PipelineReport,
    started_at: DateTime<Utc>,
) {
    let (status, error_message) = match &report.handoff {
        Handoff::Delivered => (RunStatus::Delivered, None),
        Handoff::Failed(reason) => (RunStatus::HandoffFailed, Some(reason.clone())),
        Handoff::NothingToDeliver | Handoff::Skipped => (RunStatus::NothingToDeliver, None),
    };

    let run = NewCrawlRun {
        query_ref: request.query_ref.to_string(),
        search_url: request.search_url.to_string(),
        started_at,
        finished_at: Utc::now(),
        crawl_state: report.crawl_state.to_string(),
        nodes_found: count(report.nodes_found),
        extracted: count(report.leads.len()),
        extraction_errors: count(report.extraction_errors.len()),
        inserted: count(report.inserted),
        duplicates: count(report.duplicates),
        storage_errors: count(report.storage_errors),
        backlog: count(report.backlog),
        delivered: i64::try_from(report.delivered).unwrap_or(i64::MAX),
        status,
        error_message,
    };

    if let Err(e) = leadfeed_db::record_crawl_run(pool, &run).await {
        tracing::error!(error = %e, "failed to record crawl run");
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
