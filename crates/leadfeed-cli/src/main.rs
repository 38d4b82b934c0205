mod crawl;
mod leads;
mod pipeline;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::leads::LeadsCommands;

#[derive(Debug, Parser)]
#[command(name = "leadfeed-cli")]
#[command(about = "Crawl feed search results into a deduplicated lead store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl a search URL, store new leads, and hand off the backlog
    Run {
        /// Search results URL (defaults to `LEADFEED_SEARCH_URL`)
        #[arg(long)]
        url: Option<String>,
        /// Label stored with each lead (defaults to `LEADFEED_QUERY_REF`, then the URL)
        #[arg(long)]
        query_ref: Option<String>,
        /// Crawl and extract only; print leads without touching the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract posts from a saved page instead of a live browser
    Extract {
        /// Saved HTML page, e.g. a `debug_page_content_*.html` dump
        #[arg(long)]
        html: PathBuf,
    },
    /// Database management commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect and manage stored leads
    Leads {
        #[command(subcommand)]
        command: LeadsCommands,
    },
    /// Show recent pipeline runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = leadfeed_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Run {
            url,
            query_ref,
            dry_run,
        }) => crawl::run_crawl(&config, url, query_ref, dry_run).await?,
        Some(Commands::Extract { html }) => crawl::run_extract(&config, &html)?,
        Some(Commands::Db { command }) => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Migrate => {
                    let applied = leadfeed_db::run_migrations(&pool).await?;
                    println!("applied {applied} migrations");
                }
                DbCommands::Ping => {
                    leadfeed_db::health_check(&pool).await?;
                    println!("database reachable at {}", config.database_url);
                }
            }
        }
        Some(Commands::Leads { command }) => {
            let pool = connect_migrated(&config).await?;
            leads::run_leads(&pool, command).await?;
        }
        Some(Commands::Runs { limit }) => {
            let pool = connect_migrated(&config).await?;
            leads::run_runs(&pool, limit).await?;
        }
        None => {
            println!("leadfeed-cli ready; see --help for commands");
        }
    }

    Ok(())
}

async fn connect(config: &leadfeed_core::AppConfig) -> anyhow::Result<sqlx::SqlitePool> {
    let pool_config = leadfeed_db::PoolConfig::from_app_config(config);
    Ok(leadfeed_db::connect_pool(&config.database_url, pool_config).await?)
}

/// Opens the store and brings its schema up to date.
pub(crate) async fn connect_migrated(
    config: &leadfeed_core::AppConfig,
) -> anyhow::Result<sqlx::SqlitePool> {
    let pool = connect(config).await?;
    leadfeed_db::run_migrations(&pool).await?;
    Ok(pool)
}
