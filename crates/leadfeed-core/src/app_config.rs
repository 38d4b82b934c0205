use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Search-results page to crawl. `run --url` overrides it.
    pub search_url: Option<String>,
    /// Provenance tag stored on every lead; falls back to the search URL.
    pub query_ref: Option<String>,
    pub session_path: PathBuf,
    pub debug_dir: PathBuf,
    pub selectors_path: Option<PathBuf>,
    pub report_path: PathBuf,
    pub headless: bool,
    pub user_agent: String,
    pub site_origin: String,
    pub db_acquire_timeout_secs: u64,
    pub navigation_timeout_ms: u64,
    pub navigation_settle_ms: u64,
    pub content_timeout_ms: u64,
    pub scroll_pause_ms: u64,
    pub scroll_idle_timeout_ms: u64,
    pub scroll_max_attempts: u32,
    pub expand_timeout_ms: u64,
    pub expand_settle_ms: u64,
    pub post_delay_ms: u64,
}

impl AppConfig {
    /// The provenance tag for a crawl of `search_url`.
    #[must_use]
    pub fn query_ref_for<'a>(&'a self, search_url: &'a str) -> &'a str {
        self.query_ref.as_deref().unwrap_or(search_url)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("search_url", &self.search_url)
            .field("query_ref", &self.query_ref)
            .field("session_path", &self.session_path)
            .field("debug_dir", &self.debug_dir)
            .field("selectors_path", &self.selectors_path)
            .field("report_path", &self.report_path)
            .field("headless", &self.headless)
            .field("user_agent", &self.user_agent)
            .field("site_origin", &self.site_origin)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("navigation_timeout_ms", &self.navigation_timeout_ms)
            .field("navigation_settle_ms", &self.navigation_settle_ms)
            .field("content_timeout_ms", &self.content_timeout_ms)
            .field("scroll_pause_ms", &self.scroll_pause_ms)
            .field("scroll_idle_timeout_ms", &self.scroll_idle_timeout_ms)
            .field("scroll_max_attempts", &self.scroll_max_attempts)
            .field("expand_timeout_ms", &self.expand_timeout_ms)
            .field("expand_settle_ms", &self.expand_settle_ms)
            .field("post_delay_ms", &self.post_delay_ms)
            .finish()
    }
}
