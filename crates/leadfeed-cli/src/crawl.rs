//! `run` and `extract` command handlers.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail};
use leadfeed_core::{AppConfig, SelectorSet};
use leadfeed_scraper::{
    BrowserOptions, ChromeDriver, CrawlerConfig, DiagnosticsWriter, ExtractorConfig,
    FieldExtractor, HtmlPageDriver, PageCrawler,
};

use crate::pipeline::{self, Delivery, Handoff, PipelineReport, PipelineRequest};
use crate::report::JsonReportWriter;

fn load_selector_set(config: &AppConfig) -> anyhow::Result<SelectorSet> {
    match &config.selectors_path {
        Some(path) => {
            let selectors = leadfeed_core::load_selectors(path)?;
            tracing::info!(path = %path.display(), "loaded selector overrides");
            Ok(selectors)
        }
        None => Ok(SelectorSet::default()),
    }
}

fn build_stages(config: &AppConfig) -> anyhow::Result<(PageCrawler, FieldExtractor)> {
    let selectors = load_selector_set(config)?;
    let crawler = PageCrawler::new(
        CrawlerConfig::from_app_config(config),
        selectors.clone(),
        DiagnosticsWriter::new(&config.debug_dir),
    );
    let extractor = FieldExtractor::new(selectors, ExtractorConfig::from_app_config(config));
    Ok((crawler, extractor))
}

/// Launches the browser and installs the saved session, if any. A missing or
/// unreadable session is not fatal; the crawl will likely hit the auth wall.
fn launch_browser(config: &AppConfig) -> anyhow::Result<ChromeDriver> {
    let driver = ChromeDriver::launch(&BrowserOptions::from_app_config(config))?;

    match leadfeed_scraper::load_session(&config.session_path) {
        Ok(Some(session)) => {
            driver.apply_session(&session);
        }
        Ok(None) => tracing::warn!(
            path = %config.session_path.display(),
            "no saved session; crawling unauthenticated"
        ),
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable session file"),
    }

    Ok(driver)
}

fn print_summary(report: &PipelineReport) {
    println!(
        "crawl {}: {} posts found, {} extracted, {} skipped",
        report.crawl_state,
        report.nodes_found,
        report.leads.len(),
        report.extraction_errors.len()
    );
    for record in &report.extraction_errors {
        println!("  skipped {record}");
    }
    for path in &report.diagnostics {
        println!("  diagnostics: {}", path.display());
    }
    if report.crawl_empty() {
        return;
    }
    println!(
        "stored {} new, {} duplicates, {} storage errors",
        report.inserted, report.duplicates, report.storage_errors
    );
    match &report.handoff {
        Handoff::Delivered => println!(
            "delivered {} of {} backlog leads",
            report.delivered, report.backlog
        ),
        Handoff::NothingToDeliver => println!("nothing to deliver"),
        Handoff::Failed(reason) => {
            println!("handoff failed for {} leads: {reason}", report.backlog);
        }
        Handoff::Skipped => {}
    }
}

/// Runs the full pipeline against a live browser.
///
/// # Errors
///
/// Returns an error if no search URL is configured, the browser or store
/// cannot be opened, or the backlog handoff fails. Every other fault is
/// counted in the printed summary.
pub(crate) async fn run_crawl(
    config: &AppConfig,
    url: Option<String>,
    query_ref: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let search_url = url
        .or_else(|| config.search_url.clone())
        .ok_or_else(|| anyhow!("no search URL; pass --url or set LEADFEED_SEARCH_URL"))?;
    let query_ref = query_ref.unwrap_or_else(|| config.query_ref_for(&search_url).to_string());

    let (crawler, extractor) = build_stages(config)?;
    let request = PipelineRequest {
        search_url: &search_url,
        query_ref: &query_ref,
        post_delay: Duration::from_millis(config.post_delay_ms),
    };
    let mut driver = launch_browser(config)?;

    if dry_run {
        let report =
            pipeline::run_pipeline(&mut driver, &crawler, &extractor, &request, None).await?;
        print_summary(&report);
        println!("{}", serde_json::to_string_pretty(&report.leads)?);
        return Ok(());
    }

    let pool = crate::connect_migrated(config).await?;
    let reporter = JsonReportWriter::new(&config.report_path);
    let report = pipeline::run_pipeline(
        &mut driver,
        &crawler,
        &extractor,
        &request,
        Some(Delivery {
            pool: &pool,
            reporter: &reporter,
        }),
    )
    .await?;
    print_summary(&report);

    if let Handoff::Failed(reason) = &report.handoff {
        bail!("handoff failed; {} leads remain undelivered: {reason}", report.backlog);
    }
    Ok(())
}

/// Replays a saved page through the crawler and extractor and prints the
/// extracted posts and skipped records as JSON. Never touches the store.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the selector overrides are
/// invalid.
pub(crate) fn run_extract(config: &AppConfig, html: &Path) -> anyhow::Result<()> {
    let (crawler, extractor) = build_stages(config)?;
    let mut driver = HtmlPageDriver::from_file(html)?;

    let source = format!("file://{}", html.display());
    let outcome = crawler.crawl(&mut driver, &source);
    let (posts, errors) =
        pipeline::extract_all(&mut driver, &extractor, &outcome.nodes, Duration::ZERO);

    let skipped: Vec<String> = errors.iter().map(ToString::to_string).collect();
    let output = serde_json::json!({
        "state": outcome.state.as_str(),
        "posts": posts,
        "skipped": skipped,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
