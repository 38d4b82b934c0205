//! CSS selector configuration for the post feed.
//!
//! The feed markup changes often, so every selector the crawler and the field
//! extractor rely on lives here and can be overridden from a YAML file without
//! a rebuild. Fields missing from the file keep their built-in value.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One way of pulling a text value out of a post node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Inner text of the first element matching the selector.
    Text(String),
    /// An attribute of the first element matching the selector.
    Attr { selector: String, attribute: String },
}

impl Strategy {
    #[must_use]
    pub fn text(selector: &str) -> Self {
        Strategy::Text(selector.to_string())
    }

    #[must_use]
    pub fn attr(selector: &str, attribute: &str) -> Self {
        Strategy::Attr {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        }
    }

    #[must_use]
    pub fn selector(&self) -> &str {
        match self {
            Strategy::Text(selector) | Strategy::Attr { selector, .. } => selector,
        }
    }
}

/// Primary strategy plus at most one fallback.
///
/// In YAML each strategy is a single-key map: `text: '.sel'` or
/// `attr: { selector: 'a.x', attribute: href }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub primary: Strategy,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub fallback: Option<Strategy>,
}

impl FieldRule {
    #[must_use]
    pub fn single(primary: Strategy) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_fallback(primary: Strategy, fallback: Strategy) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }

    /// Primary first, then the fallback if any.
    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        std::iter::once(&self.primary).chain(self.fallback.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    /// Matches one container element per post.
    pub post_container: String,
    /// Attribute on the container holding the post's stable identifier.
    pub identifier_attribute: String,
    /// Canonical post URL; `{id}` is replaced by the identifier.
    pub post_url_template: String,
    pub user_name: FieldRule,
    pub profile_url: FieldRule,
    pub posted_date: FieldRule,
    pub post_content: FieldRule,
    /// "See more" control that un-truncates the post body.
    pub expand_control: String,
    /// Case-insensitive phrases that mean the search legitimately found nothing.
    pub no_results_phrases: Vec<String>,
    /// Substrings of the current URL that indicate a login wall.
    pub auth_wall_markers: Vec<String>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            post_container: r#"div.feed-shared-update-v2[data-urn*="urn:li:activity:"]"#
                .to_string(),
            identifier_attribute: "data-urn".to_string(),
            post_url_template: "https://www.linkedin.com/feed/update/{id}/".to_string(),
            user_name: FieldRule::with_fallback(
                Strategy::text(r#".update-components-actor__title span[aria-hidden="true"]"#),
                Strategy::text(".actor-name"),
            ),
            profile_url: FieldRule::with_fallback(
                Strategy::attr("a.update-components-actor__meta-link", "href"),
                Strategy::attr("a.update-components-actor__image", "href"),
            ),
            posted_date: FieldRule::single(Strategy::text(
                r#".update-components-actor__sub-description span[aria-hidden="true"]"#,
            )),
            post_content: FieldRule::single(Strategy::text(
                r#"div.feed-shared-inline-show-more-text div.update-components-text span[dir="ltr"]"#,
            )),
            expand_control: "button.update-components-text-view__see-more-less-toggle"
                .to_string(),
            no_results_phrases: vec![
                "no results found".to_string(),
                "no matching results".to_string(),
            ],
            auth_wall_markers: vec![
                "authwall".to_string(),
                "login".to_string(),
                "signup".to_string(),
            ],
        }
    }
}

impl SelectorSet {
    /// Builds the canonical post URL for an identifier.
    #[must_use]
    pub fn post_url_for(&self, identifier: &str) -> String {
        self.post_url_template.replace("{id}", identifier.trim())
    }
}

/// Load and validate a selector set from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_selectors(path: &Path) -> Result<SelectorSet, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SelectorsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let selectors: SelectorSet = serde_yaml::from_str(&content)?;

    validate_selectors(&selectors)?;

    Ok(selectors)
}

fn validate_selectors(selectors: &SelectorSet) -> Result<(), ConfigError> {
    let required = [
        ("post_container", selectors.post_container.as_str()),
        ("identifier_attribute", selectors.identifier_attribute.as_str()),
        ("expand_control", selectors.expand_control.as_str()),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{name} must be non-empty")));
        }
    }

    let rules = [
        ("user_name", &selectors.user_name),
        ("profile_url", &selectors.profile_url),
        ("posted_date", &selectors.posted_date),
        ("post_content", &selectors.post_content),
    ];
    for (name, rule) in rules {
        for strategy in rule.strategies() {
            if strategy.selector().trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{name} has a strategy with an empty selector"
                )));
            }
            if let Strategy::Attr { attribute, .. } = strategy {
                if attribute.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "{name} has an attr strategy with an empty attribute"
                    )));
                }
            }
        }
    }

    if !selectors.post_url_template.contains("{id}") {
        return Err(ConfigError::Validation(format!(
            "post_url_template '{}' must contain {{id}}",
            selectors.post_url_template
        )));
    }

    Ok(())
}

#[cfg(test)]
#[path = "selectors_test.rs"]
mod tests;
