//! Per-post field extraction with one fallback per field.
//!
//! A miss on any single field yields the `"N/A"` sentinel for that field and
//! extraction carries on. Only the canonical identifier, read from the
//! container's own attribute, can reject a whole post.

use std::fmt;
use std::time::Duration;

use leadfeed_core::{is_missing, or_missing, AppConfig, FieldRule, SelectorSet, Strategy};
use serde::Serialize;

use crate::driver::{PageDriver, PostNode};

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Prefixed onto host-relative links such as `/in/jane`.
    pub site_origin: String,
    pub expand_timeout: Duration,
    pub expand_settle: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            site_origin: "https://www.linkedin.com".to_string(),
            expand_timeout: Duration::from_millis(2_000),
            expand_settle: Duration::from_millis(500),
        }
    }
}

impl ExtractorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            site_origin: config.site_origin.clone(),
            expand_timeout: Duration::from_millis(config.expand_timeout_ms),
            expand_settle: Duration::from_millis(config.expand_settle_ms),
        }
    }
}

/// Fields pulled from one post container. Text fields hold the `"N/A"`
/// sentinel when extraction missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedPost {
    pub index: usize,
    pub identifier: String,
    pub post_url: String,
    pub profile_url: String,
    pub user_name: String,
    /// Raw posted-date text, normalized later against the capture time.
    pub posted_text: String,
    pub post_content: String,
}

impl ExtractedPost {
    /// Names of the fields that fell back to the sentinel.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("profile_url", &self.profile_url),
            ("user_name", &self.user_name),
            ("posted_date", &self.posted_text),
            ("post_content", &self.post_content),
        ]
        .into_iter()
        .filter(|(_, value)| is_missing(value))
        .map(|(name, _)| name)
        .collect()
    }
}

/// A post that could not become a record. Excluded from persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "post {}: {}", self.index + 1, self.reason)
    }
}

pub struct FieldExtractor {
    selectors: SelectorSet,
    config: ExtractorConfig,
}

impl FieldExtractor {
    #[must_use]
    pub fn new(selectors: SelectorSet, config: ExtractorConfig) -> Self {
        Self { selectors, config }
    }

    /// Extracts one post. `index` is the node's zero-based document position
    /// and is only used for logging and error records. The settle delay after
    /// expanding the content goes through `driver`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorRecord`] when the container carries no usable
    /// identifier.
    pub fn extract<D: PageDriver>(
        &self,
        driver: &mut D,
        node: &D::Node,
        index: usize,
    ) -> Result<ExtractedPost, ErrorRecord> {
        let identifier = match node.attribute(&self.selectors.identifier_attribute) {
            Ok(Some(value)) if !value.trim().is_empty() => value.trim().to_string(),
            Ok(_) => {
                let record = ErrorRecord {
                    index,
                    reason: format!(
                        "container has no {} attribute; cannot build post_url",
                        self.selectors.identifier_attribute
                    ),
                };
                tracing::warn!(index, reason = %record.reason, "excluding post");
                return Err(record);
            }
            Err(e) => {
                let record = ErrorRecord {
                    index,
                    reason: format!("reading {}: {e}", self.selectors.identifier_attribute),
                };
                tracing::warn!(index, reason = %record.reason, "excluding post");
                return Err(record);
            }
        };
        let post_url = self.selectors.post_url_for(&identifier);

        let user_name = or_missing(apply_rule(node, &self.selectors.user_name, index, "user_name"));

        let profile_url = or_missing(
            apply_rule(node, &self.selectors.profile_url, index, "profile_url")
                .map(|href| absolutize(&href, &self.config.site_origin)),
        );

        let posted_text = or_missing(apply_rule(
            node,
            &self.selectors.posted_date,
            index,
            "posted_date",
        ));

        self.expand_content(driver, node, index, &post_url);
        let post_content = or_missing(
            apply_rule(node, &self.selectors.post_content, index, "post_content")
                .map(|text| collapse_newlines(&text)),
        );

        let post = ExtractedPost {
            index,
            identifier,
            post_url,
            profile_url,
            user_name,
            posted_text,
            post_content,
        };

        for field in post.missing_fields() {
            tracing::warn!(index, post_url = %post.post_url, field, "field not found");
        }
        tracing::info!(index, post_url = %post.post_url, user_name = %post.user_name, "extracted post");

        Ok(post)
    }

    /// Clicks "see more" when it is showing. Never fatal.
    fn expand_content<D: PageDriver>(
        &self,
        driver: &mut D,
        node: &D::Node,
        index: usize,
        post_url: &str,
    ) {
        match node.click(&self.selectors.expand_control, self.config.expand_timeout) {
            Ok(true) => driver.pause(self.config.expand_settle),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(index, post_url, error = %e, "could not expand post content");
            }
        }
    }
}

/// Applies the primary strategy, then the fallback. Driver faults count as a
/// miss for this field only.
fn apply_rule<N: PostNode>(node: &N, rule: &FieldRule, index: usize, field: &str) -> Option<String> {
    for strategy in rule.strategies() {
        let found = match strategy {
            Strategy::Text(selector) => node.text(selector),
            Strategy::Attr {
                selector,
                attribute,
            } => node.attr(selector, attribute),
        };
        match found {
            Ok(Some(value)) if !value.trim().is_empty() => return Some(value.trim().to_string()),
            Ok(_) => {}
            Err(e) => tracing::debug!(
                index,
                field,
                selector = strategy.selector(),
                error = %e,
                "strategy lookup failed"
            ),
        }
    }
    None
}

/// Prefixes host-relative links with `origin`; protocol-relative links get
/// `https:`. Anything else is returned unchanged.
fn absolutize(href: &str, origin: &str) -> String {
    if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{}{href}", origin.trim_end_matches('/'))
    } else {
        href.to_string()
    }
}

fn collapse_newlines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
