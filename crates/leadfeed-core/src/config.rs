use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: format!("expected a boolean, got '{other}'"),
                }),
            },
        }
    };

    let database_url = or_default("DATABASE_URL", "sqlite://leads.db");
    let env = parse_environment(&or_default("LEADFEED_ENV", "development"))?;
    let log_level = or_default("LEADFEED_LOG_LEVEL", "info");

    let search_url = optional("LEADFEED_SEARCH_URL");
    if let Some(url) = &search_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidEnvVar {
                var: "LEADFEED_SEARCH_URL".to_string(),
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }
    }
    let query_ref = optional("LEADFEED_QUERY_REF");

    let session_path = PathBuf::from(or_default(
        "LEADFEED_SESSION_PATH",
        "./session_state.json",
    ));
    let debug_dir = PathBuf::from(or_default("LEADFEED_DEBUG_DIR", "./debug_output"));
    let selectors_path = optional("LEADFEED_SELECTORS_PATH").map(PathBuf::from);
    let report_path = PathBuf::from(or_default("LEADFEED_REPORT_PATH", "./leads_report.json"));

    let headless = parse_bool("LEADFEED_HEADLESS", true)?;
    let user_agent = or_default("LEADFEED_USER_AGENT", DEFAULT_USER_AGENT);
    let site_origin = or_default("LEADFEED_SITE_ORIGIN", "https://www.linkedin.com")
        .trim_end_matches('/')
        .to_string();

    let db_acquire_timeout_secs = parse_u64("LEADFEED_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let navigation_timeout_ms = parse_u64("LEADFEED_NAVIGATION_TIMEOUT_MS", "60000")?;
    let navigation_settle_ms = parse_u64("LEADFEED_NAVIGATION_SETTLE_MS", "5000")?;
    let content_timeout_ms = parse_u64("LEADFEED_CONTENT_TIMEOUT_MS", "30000")?;
    let scroll_pause_ms = parse_u64("LEADFEED_SCROLL_PAUSE_MS", "2000")?;
    let scroll_idle_timeout_ms = parse_u64("LEADFEED_SCROLL_IDLE_TIMEOUT_MS", "7000")?;
    let scroll_max_attempts = parse_u32("LEADFEED_SCROLL_MAX_ATTEMPTS", "5")?;
    let expand_timeout_ms = parse_u64("LEADFEED_EXPAND_TIMEOUT_MS", "2000")?;
    let expand_settle_ms = parse_u64("LEADFEED_EXPAND_SETTLE_MS", "500")?;
    let post_delay_ms = parse_u64("LEADFEED_POST_DELAY_MS", "200")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        search_url,
        query_ref,
        session_path,
        debug_dir,
        selectors_path,
        report_path,
        headless,
        user_agent,
        site_origin,
        db_acquire_timeout_secs,
        navigation_timeout_ms,
        navigation_settle_ms,
        content_timeout_ms,
        scroll_pause_ms,
        scroll_idle_timeout_ms,
        scroll_max_attempts,
        expand_timeout_ms,
        expand_settle_ms,
        post_delay_ms,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LEADFEED_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
