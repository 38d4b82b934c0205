use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder written into a text field whose extraction failed.
pub const MISSING_FIELD: &str = "N/A";

/// Returns `true` if `value` is the missing-field sentinel or blank.
#[must_use]
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == MISSING_FIELD
}

/// Returns the value, or the sentinel when it is absent or blank.
#[must_use]
pub fn or_missing(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| MISSING_FIELD.to_string())
}

/// A lead ready to be inserted into the store.
///
/// `post_url` is the dedup key and is never the sentinel. `scraped_at` is the
/// capture instant; `posted_at` falls back to it when the post's date text
/// could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLead {
    pub post_url: String,
    pub profile_url: String,
    pub user_name: String,
    pub post_content: String,
    pub posted_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub query_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_sentinel_values_are_missing() {
        assert!(is_missing(""));
        assert!(is_missing("   "));
        assert!(is_missing("N/A"));
        assert!(!is_missing("Jane Doe"));
    }

    #[test]
    fn or_missing_substitutes_sentinel() {
        assert_eq!(or_missing(None), MISSING_FIELD);
        assert_eq!(or_missing(Some("  ".to_string())), MISSING_FIELD);
        assert_eq!(or_missing(Some("Jane".to_string())), "Jane");
    }
}
