use std::cell::RefCell;

use anyhow::bail;
use chrono::TimeDelta;
use leadfeed_core::{SelectorSet, MISSING_FIELD};
use leadfeed_db::LeadRow;
use leadfeed_scraper::{
    CrawlerConfig, DiagnosticsWriter, ExtractorConfig, HtmlPageDriver,
};

use super::*;

const SEARCH_URL: &str = "https://www.linkedin.com/search/results/content/?keywords=freelance";

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

fn post(urn: &str, name: &str, posted: &str, body: &str) -> String {
    format!(
        r#"<div class="feed-shared-update-v2" data-urn="{urn}">
  <a class="update-components-actor__meta-link" href="/in/{name}">
    <span class="update-components-actor__title"><span aria-hidden="true">{name}</span></span>
  </a>
  <span class="update-components-actor__sub-description"><span aria-hidden="true">{posted}</span></span>
  <div class="feed-shared-inline-show-more-text"><div class="update-components-text">
    <span dir="ltr">{body}</span>
  </div></div>
</div>"#
    )
}

fn page(posts: &[String]) -> HtmlPageDriver {
    HtmlPageDriver::from_markup(format!(
        "<html><body><main>{}</main></body></html>",
        posts.join("\n")
    ))
}

struct Harness {
    crawler: PageCrawler,
    extractor: FieldExtractor,
    _debug_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let debug_dir = tempfile::tempdir().expect("temp dir");
    // Match containers with or without an identifier so the extractor sees both.
    let selectors = SelectorSet {
        post_container: "div.feed-shared-update-v2".to_string(),
        ..SelectorSet::default()
    };
    let crawler_config = CrawlerConfig {
        navigation_timeout: Duration::from_secs(1),
        navigation_settle: Duration::ZERO,
        content_timeout: Duration::from_secs(1),
        scroll_pause: Duration::ZERO,
        scroll_idle_timeout: Duration::ZERO,
        scroll_max_attempts: 5,
    };
    let extractor_config = ExtractorConfig {
        expand_settle: Duration::ZERO,
        ..ExtractorConfig::default()
    };

    Harness {
        crawler: PageCrawler::new(
            crawler_config,
            selectors.clone(),
            DiagnosticsWriter::new(debug_dir.path()),
        ),
        extractor: FieldExtractor::new(selectors, extractor_config),
        _debug_dir: debug_dir,
    }
}

fn request() -> PipelineRequest<'static> {
    PipelineRequest {
        search_url: SEARCH_URL,
        query_ref: "freelance",
        post_delay: Duration::ZERO,
    }
}

async fn memory_pool() -> SqlitePool {
    let pool = leadfeed_db::connect_pool("sqlite::memory:", leadfeed_db::PoolConfig::default())
        .await
        .expect("connect in-memory sqlite");
    leadfeed_db::run_migrations(&pool)
        .await
        .expect("apply migrations");
    pool
}

#[derive(Default)]
struct RecordingReporter {
    deliveries: RefCell<Vec<Vec<String>>>,
}

impl RecordingReporter {
    fn delivered_urls(&self) -> Vec<Vec<String>> {
        self.deliveries.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn deliver(&self, leads: &[LeadRow]) -> anyhow::Result<()> {
        self.deliveries
            .borrow_mut()
            .push(leads.iter().map(|l| l.post_url.clone()).collect());
        Ok(())
    }
}

struct FailingReporter;

impl Reporter for FailingReporter {
    fn deliver(&self, _leads: &[LeadRow]) -> anyhow::Result<()> {
        bail!("smtp relay refused connection")
    }
}

async fn run(
    h: &Harness,
    driver: &mut HtmlPageDriver,
    pool: &SqlitePool,
    reporter: &dyn Reporter,
) -> PipelineReport {
    run_pipeline(
        driver,
        &h.crawler,
        &h.extractor,
        &request(),
        Some(Delivery { pool, reporter }),
    )
    .await
    .expect("pipeline run")
}

// -----------------------------------------------------------------------
// End-to-end
// -----------------------------------------------------------------------

#[tokio::test]
async fn duplicate_node_is_stored_once_and_backlog_is_delivered() {
    let h = harness();
    let pool = memory_pool().await;
    let reporter = RecordingReporter::default();
    let mut driver = page(&[
        post("urn:li:activity:1", "jane", "2h", "need a rust dev"),
        post("urn:li:activity:1", "jane", "2h", "need a rust dev"),
        post("urn:li:activity:2", "raj", "1d", "hiring a designer"),
    ]);

    let report = run(&h, &mut driver, &pool, &reporter).await;

    assert_eq!(report.crawl_state, CrawlState::Done);
    assert_eq!(report.nodes_found, 3);
    assert_eq!(report.leads.len(), 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.storage_errors, 0);
    assert_eq!(report.backlog, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.handoff, Handoff::Delivered);

    assert_eq!(leadfeed_db::count_leads(&pool).await.unwrap(), 2);
    assert!(leadfeed_db::list_undelivered_leads(&pool)
        .await
        .unwrap()
        .is_empty());

    let deliveries = reporter.delivered_urls();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].len(), 2);

    let runs = leadfeed_db::list_crawl_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "delivered");
    assert_eq!(runs[0].crawl_state, "done");
    assert_eq!(runs[0].duplicates, 1);
    assert_eq!(runs[0].query_ref, "freelance");
}

#[tokio::test]
async fn storage_fault_skips_one_lead_and_delivers_the_rest() {
    let h = harness();
    let pool = memory_pool().await;
    sqlx::query(
        "CREATE TRIGGER reject_second_post BEFORE INSERT ON leads \
         WHEN NEW.post_url LIKE '%activity:2/' \
         BEGIN SELECT RAISE(ABORT, 'disk quota exceeded'); END",
    )
    .execute(&pool)
    .await
    .unwrap();
    let reporter = RecordingReporter::default();
    let mut driver = page(&[
        post("urn:li:activity:1", "jane", "2h", "one"),
        post("urn:li:activity:2", "raj", "1d", "two"),
        post("urn:li:activity:3", "ana", "3d", "three"),
    ]);

    let report = run(&h, &mut driver, &pool, &reporter).await;

    assert_eq!(report.leads.len(), 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.storage_errors, 1);
    assert_eq!(report.backlog, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.handoff, Handoff::Delivered);
    assert_eq!(leadfeed_db::count_leads(&pool).await.unwrap(), 2);

    let delivered = reporter.delivered_urls();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].iter().all(|url| !url.ends_with("activity:2/")));
}

#[tokio::test]
async fn post_without_identifier_is_excluded_and_reported() {
    let h = harness();
    let pool = memory_pool().await;
    let reporter = RecordingReporter::default();
    let mut driver = page(&[
        post("urn:li:activity:1", "jane", "2h", "one"),
        r#"<div class="feed-shared-update-v2"><span class="actor-name">Ghost</span></div>"#
            .to_string(),
        post("urn:li:activity:3", "raj", "3d", "three"),
    ]);

    let report = run(&h, &mut driver, &pool, &reporter).await;

    assert_eq!(report.nodes_found, 3);
    assert_eq!(report.extraction_errors.len(), 1);
    assert_eq!(report.extraction_errors[0].index, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(leadfeed_db::count_leads(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn unparseable_date_falls_back_to_capture_time() {
    let h = harness();
    let pool = memory_pool().await;
    let reporter = RecordingReporter::default();
    let markup = r#"<div class="feed-shared-update-v2" data-urn="urn:li:activity:5">
        <span class="actor-name">Ann</span></div>"#;
    let mut driver = page(&[markup.to_string()]);

    let report = run(&h, &mut driver, &pool, &reporter).await;

    let lead = &report.leads[0];
    assert_eq!(lead.profile_url, MISSING_FIELD);
    assert_eq!(lead.posted_at, lead.scraped_at);

    let row = leadfeed_db::get_lead_by_post_url(&pool, &lead.post_url)
        .await
        .unwrap()
        .expect("row stored");
    assert_eq!(row.posted_timestamp, Some(row.scraped_at));
    assert_eq!(row.profile_url.as_deref(), Some(MISSING_FIELD));
}

#[tokio::test]
async fn relative_date_is_normalized_against_capture_time() {
    let h = harness();
    let mut driver = page(&[post("urn:li:activity:8", "jane", "3h •", "body")]);

    let report = run_pipeline(&mut driver, &h.crawler, &h.extractor, &request(), None)
        .await
        .unwrap();

    let lead = &report.leads[0];
    assert_eq!(lead.posted_at, lead.scraped_at - TimeDelta::hours(3));
}

#[tokio::test]
async fn failed_handoff_leaves_backlog_for_the_next_run() {
    let h = harness();
    let pool = memory_pool().await;
    let posts = [
        post("urn:li:activity:1", "jane", "2h", "one"),
        post("urn:li:activity:2", "raj", "1d", "two"),
    ];

    let mut driver = page(&posts);
    let failed = run(&h, &mut driver, &pool, &FailingReporter).await;

    assert_eq!(failed.inserted, 2);
    assert_eq!(failed.delivered, 0);
    assert!(
        matches!(&failed.handoff, Handoff::Failed(reason) if reason.contains("smtp relay"))
    );
    assert_eq!(
        leadfeed_db::list_undelivered_leads(&pool).await.unwrap().len(),
        2
    );

    let reporter = RecordingReporter::default();
    let mut driver = page(&posts);
    let retried = run(&h, &mut driver, &pool, &reporter).await;

    assert_eq!(retried.inserted, 0);
    assert_eq!(retried.duplicates, 2);
    assert_eq!(retried.backlog, 2);
    assert_eq!(retried.handoff, Handoff::Delivered);
    assert_eq!(reporter.delivered_urls()[0].len(), 2);

    let runs = leadfeed_db::list_crawl_runs(&pool, 10).await.unwrap();
    let statuses: Vec<&str> = runs.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["delivered", "handoff_failed"]);
    assert!(runs[1]
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("smtp relay")));
}

#[tokio::test]
async fn empty_backlog_skips_the_handoff() {
    let h = harness();
    let pool = memory_pool().await;
    let reporter = RecordingReporter::default();
    let posts = [post("urn:li:activity:1", "jane", "2h", "one")];

    let mut driver = page(&posts);
    run(&h, &mut driver, &pool, &reporter).await;

    let mut driver = page(&posts);
    let second = run(&h, &mut driver, &pool, &reporter).await;

    assert_eq!(second.duplicates, 1);
    assert_eq!(second.backlog, 0);
    assert_eq!(second.handoff, Handoff::NothingToDeliver);
    assert_eq!(reporter.delivered_urls().len(), 1, "reporter called only once");

    let runs = leadfeed_db::list_crawl_runs(&pool, 10).await.unwrap();
    assert_eq!(runs[0].status, "nothing_to_deliver");
}

#[tokio::test]
async fn empty_crawl_leaves_store_untouched() {
    let h = harness();
    let pool = memory_pool().await;
    let reporter = RecordingReporter::default();
    let mut driver =
        HtmlPageDriver::from_markup("<html><body><h2>No results found</h2></body></html>");

    let report = run(&h, &mut driver, &pool, &reporter).await;

    assert_eq!(report.crawl_state, CrawlState::Empty);
    assert!(report.crawl_empty());
    assert_eq!(report.handoff, Handoff::Skipped);
    assert!(reporter.delivered_urls().is_empty());
    assert_eq!(leadfeed_db::count_leads(&pool).await.unwrap(), 0);
    assert!(leadfeed_db::list_crawl_runs(&pool, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn dry_run_builds_leads_without_a_store() {
    let h = harness();
    let mut driver = page(&[
        post("urn:li:activity:1", "jane", "2h", "one"),
        post("urn:li:activity:2", "raj", "1d", "two"),
    ]);

    let report = run_pipeline(&mut driver, &h.crawler, &h.extractor, &request(), None)
        .await
        .unwrap();

    assert_eq!(report.leads.len(), 2);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.handoff, Handoff::Skipped);
    assert!(report.leads.iter().all(|l| l.query_ref == "freelance"));
    assert_eq!(
        report.leads[0].post_url,
        "https://www.linkedin.com/feed/update/urn:li:activity:1/"
    );
}

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

#[test]
fn to_new_lead_keeps_extracted_fields() {
    let scraped_at = Utc::now();
    let post = ExtractedPost {
        index: 0,
        identifier: "urn:li:activity:9".to_string(),
        post_url: "https://www.linkedin.com/feed/update/urn:li:activity:9/".to_string(),
        profile_url: "https://www.linkedin.com/in/jane".to_string(),
        user_name: "Jane".to_string(),
        posted_text: "just now".to_string(),
        post_content: "hello".to_string(),
    };

    let lead = to_new_lead(post, "q", scraped_at);

    assert_eq!(lead.user_name, "Jane");
    assert_eq!(lead.query_ref, "q");
    assert_eq!(lead.posted_at, scraped_at);
}
