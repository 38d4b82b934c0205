//! Read-side and maintenance commands over the lead store.

use clap::Subcommand;
use sqlx::SqlitePool;

/// Sub-commands available under `leads`.
#[derive(Debug, Subcommand)]
pub enum LeadsCommands {
    /// Print undelivered leads as JSON, newest first
    Backlog {
        /// Maximum number of leads to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark leads delivered after an out-of-band handoff
    MarkDelivered {
        /// Lead ids to mark
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Print the stored and undelivered counts
    Count,
}

/// Dispatches a `leads` sub-command.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub(crate) async fn run_leads(pool: &SqlitePool, command: LeadsCommands) -> anyhow::Result<()> {
    match command {
        LeadsCommands::Backlog { limit } => {
            let mut backlog = leadfeed_db::list_undelivered_leads(pool).await?;
            if let Some(limit) = limit {
                backlog.truncate(limit);
            }
            println!("{}", serde_json::to_string_pretty(&backlog)?);
        }
        LeadsCommands::MarkDelivered { ids } => {
            let flipped = leadfeed_db::mark_leads_delivered(pool, &ids).await?;
            println!(
                "marked {flipped} of {} leads delivered (others were already delivered or unknown)",
                ids.len()
            );
        }
        LeadsCommands::Count => {
            let total = leadfeed_db::count_leads(pool).await?;
            let pending = leadfeed_db::list_undelivered_leads(pool).await?.len();
            println!("{total} leads stored, {pending} undelivered");
        }
    }
    Ok(())
}

/// Prints a table of the most recent pipeline runs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs(pool: &SqlitePool, limit: i64) -> anyhow::Result<()> {
    let runs = leadfeed_db::list_crawl_runs(pool, limit).await?;

    if runs.is_empty() {
        println!("no runs recorded yet; run `leadfeed-cli run` first");
        return Ok(());
    }

    println!(
        "{:<6}{:<22}{:<20}{:<7}{:<7}{:<7}{:<10}STATUS",
        "ID", "STARTED", "QUERY", "FOUND", "NEW", "DUPS", "DELIVERED"
    );
    for run in &runs {
        let query = if run.query_ref.chars().count() > 18 {
            format!("{}...", run.query_ref.chars().take(15).collect::<String>())
        } else {
            run.query_ref.clone()
        };
        println!(
            "{:<6}{:<22}{:<20}{:<7}{:<7}{:<7}{:<10}{}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            query,
            run.nodes_found,
            run.inserted,
            run.duplicates,
            run.delivered,
            run.status
        );
        if let Some(message) = &run.error_message {
            println!("      error: {message}");
        }
    }

    Ok(())
}
