//! Integration tests for leadfeed-db against a file-backed SQLite database.

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use leadfeed_core::{AppConfig, Environment, NewLead};
use leadfeed_db::{
    connect_pool, count_leads, health_check, insert_lead, list_undelivered_leads,
    mark_leads_delivered, run_migrations, PoolConfig,
};

fn app_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        search_url: None,
        query_ref: None,
        session_path: PathBuf::from("./session_state.json"),
        debug_dir: PathBuf::from("./debug_output"),
        selectors_path: None,
        report_path: PathBuf::from("./leads_report.json"),
        headless: true,
        user_agent: "ua".to_string(),
        site_origin: "https://www.linkedin.com".to_string(),
        db_acquire_timeout_secs: 3,
        navigation_timeout_ms: 60_000,
        navigation_settle_ms: 5_000,
        content_timeout_ms: 30_000,
        scroll_pause_ms: 2_000,
        scroll_idle_timeout_ms: 7_000,
        scroll_max_attempts: 5,
        expand_timeout_ms: 2_000,
        expand_settle_ms: 500,
        post_delay_ms: 200,
    }
}

fn lead(post_url: &str) -> NewLead {
    let scraped_at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
    NewLead {
        post_url: post_url.to_string(),
        profile_url: "N/A".to_string(),
        user_name: "N/A".to_string(),
        post_content: "N/A".to_string(),
        posted_at: scraped_at,
        scraped_at,
        query_ref: "q".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config("sqlite::memory:"));
    assert_eq!(pool_config.acquire_timeout_secs, 3);
    assert_eq!(pool_config.max_connections, 1);
}

#[tokio::test]
async fn database_file_is_created_and_survives_reconnect() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("leads.db").display());
    let config = PoolConfig::from_app_config(&app_config(&url));

    let pool = connect_pool(&url, config).await.expect("first connect");
    run_migrations(&pool).await.expect("migrations");
    health_check(&pool).await.expect("health check");
    assert!(insert_lead(&pool, &lead("https://x/1")).await.unwrap());
    assert!(insert_lead(&pool, &lead("https://x/2")).await.unwrap());
    let first_id = list_undelivered_leads(&pool).await.unwrap()[0].id;
    mark_leads_delivered(&pool, &[first_id]).await.unwrap();
    pool.close().await;

    let reopened = connect_pool(&url, config).await.expect("second connect");
    assert_eq!(run_migrations(&reopened).await.unwrap(), 0);
    assert_eq!(count_leads(&reopened).await.unwrap(), 2);
    assert!(!insert_lead(&reopened, &lead("https://x/1")).await.unwrap());

    let backlog = list_undelivered_leads(&reopened).await.unwrap();
    assert_eq!(backlog.len(), 1);
    assert_ne!(backlog[0].id, first_id);
}
