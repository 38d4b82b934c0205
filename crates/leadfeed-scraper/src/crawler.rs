//! Search-results crawl as an explicit state machine.
//!
//! ```text
//! Idle -> Navigating -> AwaitingInitialContent -> Scrolling -> Done
//!              |                 |   |   |             |
//!              v                 v   v   v             v
//!           Failed          Failed Empty AuthBlocked  Failed (no nodes left)
//! ```
//!
//! Every wait is bounded. Terminal states never raise to the caller: the
//! outcome carries whatever nodes were present plus the diagnostics written on
//! the way out.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use leadfeed_core::{AppConfig, SelectorSet};
use rand::Rng;

use crate::diagnostics::DiagnosticsWriter;
use crate::driver::PageDriver;

/// Interval between initial-content polls.
const CONTENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Consecutive unchanged height reads that count as "stabilized".
const STABLE_READS_TO_STOP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Navigating,
    AwaitingInitialContent,
    Scrolling,
    Done,
    AuthBlocked,
    Empty,
    Failed,
}

impl CrawlState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CrawlState::Done | CrawlState::AuthBlocked | CrawlState::Empty | CrawlState::Failed
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlState::Idle => "idle",
            CrawlState::Navigating => "navigating",
            CrawlState::AwaitingInitialContent => "awaiting_initial_content",
            CrawlState::Scrolling => "scrolling",
            CrawlState::Done => "done",
            CrawlState::AuthBlocked => "auth_blocked",
            CrawlState::Empty => "empty",
            CrawlState::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub navigation_timeout: Duration,
    pub navigation_settle: Duration,
    pub content_timeout: Duration,
    pub scroll_pause: Duration,
    pub scroll_idle_timeout: Duration,
    pub scroll_max_attempts: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(60_000),
            navigation_settle: Duration::from_millis(5_000),
            content_timeout: Duration::from_millis(30_000),
            scroll_pause: Duration::from_millis(2_000),
            scroll_idle_timeout: Duration::from_millis(7_000),
            scroll_max_attempts: 5,
        }
    }
}

impl CrawlerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            navigation_settle: Duration::from_millis(config.navigation_settle_ms),
            content_timeout: Duration::from_millis(config.content_timeout_ms),
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
            scroll_idle_timeout: Duration::from_millis(config.scroll_idle_timeout_ms),
            scroll_max_attempts: config.scroll_max_attempts,
        }
    }
}

/// Result of one crawl.
#[derive(Debug)]
pub struct CrawlOutcome<N> {
    pub state: CrawlState,
    /// Post containers in document order; empty unless `state` is `Done`.
    pub nodes: Vec<N>,
    pub scroll_attempts: u32,
    pub diagnostics: Vec<PathBuf>,
}

pub struct PageCrawler {
    config: CrawlerConfig,
    selectors: SelectorSet,
    diagnostics: DiagnosticsWriter,
}

/// Mutable bookkeeping for a single crawl.
struct Run<N> {
    nodes: Vec<N>,
    scroll_attempts: u32,
    diagnostics: Vec<PathBuf>,
}

impl PageCrawler {
    #[must_use]
    pub fn new(config: CrawlerConfig, selectors: SelectorSet, diagnostics: DiagnosticsWriter) -> Self {
        Self {
            config,
            selectors,
            diagnostics,
        }
    }

    /// Drives `driver` through `url` until the feed stops growing.
    pub fn crawl<D: PageDriver>(&self, driver: &mut D, url: &str) -> CrawlOutcome<D::Node> {
        let mut run = Run {
            nodes: Vec::new(),
            scroll_attempts: 0,
            diagnostics: Vec::new(),
        };

        let mut state = CrawlState::Idle;
        while !state.is_terminal() {
            let next = match state {
                CrawlState::Idle => CrawlState::Navigating,
                CrawlState::Navigating => self.navigate(driver, url, &mut run),
                CrawlState::AwaitingInitialContent => self.await_initial_content(driver, &mut run),
                CrawlState::Scrolling => self.scroll_and_collect(driver, &mut run),
                CrawlState::Done
                | CrawlState::AuthBlocked
                | CrawlState::Empty
                | CrawlState::Failed => state,
            };
            tracing::debug!(from = %state, to = %next, "crawl state transition");
            state = next;
        }

        tracing::info!(
            state = %state,
            nodes = run.nodes.len(),
            scroll_attempts = run.scroll_attempts,
            "crawl finished"
        );

        CrawlOutcome {
            state,
            nodes: run.nodes,
            scroll_attempts: run.scroll_attempts,
            diagnostics: run.diagnostics,
        }
    }

    fn navigate<D: PageDriver>(
        &self,
        driver: &mut D,
        url: &str,
        run: &mut Run<D::Node>,
    ) -> CrawlState {
        tracing::info!(url, "navigating to search results");

        // Load and network idle share one deadline.
        let started = Instant::now();
        let loaded = driver
            .navigate(url, self.config.navigation_timeout)
            .and_then(|()| {
                let remaining = self
                    .config
                    .navigation_timeout
                    .saturating_sub(started.elapsed());
                driver.wait_for_network_idle(remaining)
            });

        match loaded {
            Ok(()) => {
                driver.pause(self.config.navigation_settle);
                CrawlState::AwaitingInitialContent
            }
            Err(e) => {
                tracing::error!(url, error = %e, "navigation did not complete");
                self.capture(driver, "navigation", run);
                CrawlState::Failed
            }
        }
    }

    fn await_initial_content<D: PageDriver>(
        &self,
        driver: &mut D,
        run: &mut Run<D::Node>,
    ) -> CrawlState {
        let interval_ms = CONTENT_POLL_INTERVAL.as_millis().max(1);
        let polls = (self.config.content_timeout.as_millis() / interval_ms).max(1);

        for poll in 0..polls {
            if poll > 0 {
                driver.pause(CONTENT_POLL_INTERVAL);
            }

            match driver.query_all(&self.selectors.post_container) {
                Ok(nodes) if !nodes.is_empty() => {
                    tracing::info!(count = nodes.len(), "initial post containers present");
                    return CrawlState::Scrolling;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "post container lookup failed"),
            }

            if let Some(url) = self.auth_wall_url(driver) {
                tracing::error!(url = %url, "hit an authentication wall; session blob missing or expired");
                self.capture(driver, "auth_wall", run);
                return CrawlState::AuthBlocked;
            }

            if self.shows_no_results(driver) {
                tracing::info!("page reports no results for this search");
                return CrawlState::Empty;
            }
        }

        tracing::error!(
            selector = %self.selectors.post_container,
            timeout_ms = u64::try_from(self.config.content_timeout.as_millis()).unwrap_or(u64::MAX),
            "timed out waiting for post containers"
        );
        self.capture(driver, "initial_content", run);
        CrawlState::Failed
    }

    fn scroll_and_collect<D: PageDriver>(
        &self,
        driver: &mut D,
        run: &mut Run<D::Node>,
    ) -> CrawlState {
        self.scroll(driver, run);

        match driver.query_all(&self.selectors.post_container) {
            Ok(nodes) if !nodes.is_empty() => {
                tracing::info!(count = nodes.len(), "collected post containers");
                run.nodes = nodes;
                CrawlState::Done
            }
            Ok(_) => {
                tracing::warn!("no post containers left after scrolling");
                self.capture(driver, "postscroll", run);
                CrawlState::Failed
            }
            Err(e) => {
                tracing::error!(error = %e, "post container lookup failed after scrolling");
                self.capture(driver, "postscroll", run);
                CrawlState::Failed
            }
        }
    }

    /// Scrolls until the height is unchanged on two consecutive reads or the
    /// attempt ceiling is hit. Driver faults end the loop early.
    fn scroll<D: PageDriver>(&self, driver: &mut D, run: &mut Run<D::Node>) {
        let mut last_height = match driver.scroll_height() {
            Ok(height) => height,
            Err(e) => {
                tracing::warn!(error = %e, "cannot measure page height; skipping scroll");
                return;
            }
        };
        let mut unchanged = 0;

        while run.scroll_attempts < self.config.scroll_max_attempts {
            if let Err(e) = driver.scroll_to_bottom() {
                tracing::warn!(error = %e, "scroll failed; keeping current content");
                return;
            }
            driver.pause(self.jittered_pause());

            if let Err(e) = driver.wait_for_network_idle(self.config.scroll_idle_timeout) {
                tracing::warn!(error = %e, "network did not settle after scroll");
            }

            let height = match driver.scroll_height() {
                Ok(height) => height,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot measure page height; keeping current content");
                    return;
                }
            };
            run.scroll_attempts += 1;

            if height == last_height {
                unchanged += 1;
                if unchanged >= STABLE_READS_TO_STOP {
                    tracing::info!(attempt = run.scroll_attempts, height, "feed height stabilized");
                    return;
                }
            } else {
                unchanged = 0;
            }
            last_height = height;

            tracing::info!(
                attempt = run.scroll_attempts,
                max_attempts = self.config.scroll_max_attempts,
                height,
                "scrolled"
            );
        }
    }

    /// Base pause plus up to 25% random jitter.
    fn jittered_pause(&self) -> Duration {
        let base = u64::try_from(self.config.scroll_pause.as_millis()).unwrap_or(u64::MAX);
        let jitter = if base >= 4 {
            rand::rng().random_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter))
    }

    /// Markers match the URL path only; search keywords live in the query.
    fn auth_wall_url<D: PageDriver>(&self, driver: &mut D) -> Option<String> {
        let url = driver.current_url().ok()?;
        let lower = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        self.selectors
            .auth_wall_markers
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
            .then_some(url)
    }

    fn shows_no_results<D: PageDriver>(&self, driver: &mut D) -> bool {
        let Ok(text) = driver.body_text() else {
            return false;
        };
        let lower = text.to_lowercase();
        self.selectors
            .no_results_phrases
            .iter()
            .any(|phrase| lower.contains(&phrase.to_lowercase()))
    }

    fn capture<D: PageDriver>(&self, driver: &mut D, stage: &str, run: &mut Run<D::Node>) {
        let written = self.diagnostics.capture(driver, stage);
        run.diagnostics.extend(written);
    }
}

#[cfg(test)]
#[path = "crawler_test.rs"]
mod tests;
