//! Saved browser session (storage-state JSON with a `cookies` array).
//!
//! The file is produced once by an interactive login outside this crate. Its
//! absence is normal; the crawl then proceeds unauthenticated.

use std::path::Path;

use serde::Deserialize;

use crate::error::ScraperError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix seconds; `-1` marks a session cookie.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

impl SessionCookie {
    /// Expiry to hand to the browser, or `None` for session cookies.
    #[must_use]
    pub fn expiry(&self) -> Option<f64> {
        self.expires.filter(|e| *e > 0.0)
    }
}

fn default_path() -> String {
    "/".to_string()
}

/// Reads the session file at `path`.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] if the file exists but cannot be read, or
/// [`ScraperError::SessionParse`] if it is not storage-state JSON.
pub fn load_session(path: &Path) -> Result<Option<SessionState>, ScraperError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ScraperError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    let state =
        serde_json::from_str::<SessionState>(&content).map_err(|e| ScraperError::SessionParse {
            path: path.display().to_string(),
            source: e,
        })?;

    Ok(Some(state))
}
