use chrono::{Duration, TimeZone};

use super::*;
use crate::{connect_pool, run_migrations, PoolConfig};

async fn test_pool() -> SqlitePool {
    let pool = connect_pool("sqlite::memory:", PoolConfig::default())
        .await
        .expect("in-memory pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}

fn lead(post_url: &str, scraped_at: DateTime<Utc>) -> NewLead {
    NewLead {
        post_url: post_url.to_string(),
        profile_url: "https://www.linkedin.com/in/jane".to_string(),
        user_name: "Jane Doe".to_string(),
        post_content: "Hiring a Rust engineer".to_string(),
        posted_at: scraped_at - Duration::hours(3),
        scraped_at,
        query_ref: "rust-hiring".to_string(),
    }
}

fn capture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn insert_then_duplicate_is_reported_not_raised() {
    let pool = test_pool().await;
    let url = "https://www.linkedin.com/feed/update/urn:li:activity:1/";

    assert!(insert_lead(&pool, &lead(url, capture_time())).await.unwrap());
    assert!(!insert_lead(&pool, &lead(url, capture_time())).await.unwrap());

    assert_eq!(count_leads(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_keeps_the_first_row_untouched() {
    let pool = test_pool().await;
    let url = "https://www.linkedin.com/feed/update/urn:li:activity:1/";

    insert_lead(&pool, &lead(url, capture_time())).await.unwrap();
    let mut second = lead(url, capture_time() + Duration::hours(1));
    second.user_name = "Someone Else".to_string();
    insert_lead(&pool, &second).await.unwrap();

    let stored = get_lead_by_post_url(&pool, url).await.unwrap().unwrap();
    assert_eq!(stored.user_name.as_deref(), Some("Jane Doe"));
    assert_eq!(stored.scraped_at, capture_time());
}

#[tokio::test]
async fn blank_post_url_is_rejected() {
    let pool = test_pool().await;

    let err = insert_lead(&pool, &lead("   ", capture_time()))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingPostUrl));
    assert_eq!(count_leads(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn new_rows_start_undelivered_with_all_fields() {
    let pool = test_pool().await;
    let url = "https://www.linkedin.com/feed/update/urn:li:activity:9/";
    insert_lead(&pool, &lead(url, capture_time())).await.unwrap();

    let row = get_lead_by_post_url(&pool, url).await.unwrap().unwrap();
    assert!(!row.is_emailed);
    assert_eq!(row.post_url, url);
    assert_eq!(
        row.profile_url.as_deref(),
        Some("https://www.linkedin.com/in/jane")
    );
    assert_eq!(row.post_content.as_deref(), Some("Hiring a Rust engineer"));
    assert_eq!(
        row.posted_timestamp,
        Some(capture_time() - Duration::hours(3))
    );
    assert_eq!(row.search_query_ref.as_deref(), Some("rust-hiring"));
}

#[tokio::test]
async fn backlog_is_ordered_newest_capture_first() {
    let pool = test_pool().await;
    let base = capture_time();

    insert_lead(&pool, &lead("https://x/1", base)).await.unwrap();
    insert_lead(&pool, &lead("https://x/2", base + Duration::minutes(5)))
        .await
        .unwrap();
    insert_lead(&pool, &lead("https://x/3", base - Duration::minutes(5)))
        .await
        .unwrap();

    let urls: Vec<String> = list_undelivered_leads(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.post_url)
        .collect();

    assert_eq!(urls, vec!["https://x/2", "https://x/1", "https://x/3"]);
}

#[tokio::test]
async fn equal_capture_times_break_ties_on_posted_date() {
    let pool = test_pool().await;
    let base = capture_time();

    let mut older_post = lead("https://x/old", base);
    older_post.posted_at = base - Duration::days(2);
    let mut newer_post = lead("https://x/new", base);
    newer_post.posted_at = base - Duration::hours(1);

    insert_lead(&pool, &older_post).await.unwrap();
    insert_lead(&pool, &newer_post).await.unwrap();

    let backlog = list_undelivered_leads(&pool).await.unwrap();
    assert_eq!(backlog[0].post_url, "https://x/new");
    assert_eq!(backlog[1].post_url, "https://x/old");
}

#[tokio::test]
async fn mark_delivered_removes_rows_from_backlog() {
    let pool = test_pool().await;
    insert_lead(&pool, &lead("https://x/1", capture_time()))
        .await
        .unwrap();
    insert_lead(&pool, &lead("https://x/2", capture_time()))
        .await
        .unwrap();

    let backlog = list_undelivered_leads(&pool).await.unwrap();
    let first_id = backlog
        .iter()
        .find(|row| row.post_url == "https://x/1")
        .unwrap()
        .id;

    assert_eq!(mark_leads_delivered(&pool, &[first_id]).await.unwrap(), 1);

    let remaining = list_undelivered_leads(&pool).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].post_url, "https://x/2");

    let delivered = get_lead_by_post_url(&pool, "https://x/1")
        .await
        .unwrap()
        .unwrap();
    assert!(delivered.is_emailed);
}

#[tokio::test]
async fn mark_delivered_is_idempotent_and_ignores_unknown_ids() {
    let pool = test_pool().await;
    insert_lead(&pool, &lead("https://x/1", capture_time()))
        .await
        .unwrap();
    let id = list_undelivered_leads(&pool).await.unwrap()[0].id;

    assert_eq!(mark_leads_delivered(&pool, &[id, 9_999]).await.unwrap(), 1);
    assert_eq!(mark_leads_delivered(&pool, &[id]).await.unwrap(), 0);
    assert!(list_undelivered_leads(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn mark_delivered_with_no_ids_is_a_no_op() {
    let pool = test_pool().await;
    insert_lead(&pool, &lead("https://x/1", capture_time()))
        .await
        .unwrap();

    assert_eq!(mark_leads_delivered(&pool, &[]).await.unwrap(), 0);
    assert_eq!(list_undelivered_leads(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_lead_by_unknown_url_is_none() {
    let pool = test_pool().await;
    assert!(get_lead_by_post_url(&pool, "https://x/none")
        .await
        .unwrap()
        .is_none());
}
