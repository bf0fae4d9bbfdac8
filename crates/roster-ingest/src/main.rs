//! Roster Ingest - load a CSV file of people into the records table

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roster_common::logging::{init_logging, LogConfig, LogLevel};
use roster_ingest::{IngestConfig, IngestionService, MemoryStore, PgRecordStore, RecordStore};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "roster-ingest")]
#[command(author, version, about = "Roster CSV ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a CSV file into the records table
    Load {
        /// CSV file with a header row
        file: PathBuf,

        /// Records per bulk insert
        #[arg(short, long, env = "INGEST_BATCH_SIZE")]
        batch_size: Option<usize>,

        /// Parse and count rows against an in-memory store
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the most recently inserted records
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("roster-ingest".to_string())
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Load {
            file,
            batch_size,
            dry_run,
        } => {
            let mut config = IngestConfig::from_env()?;
            if let Some(batch_size) = batch_size {
                config = config.with_batch_size(batch_size);
            }
            config.validate()?;

            let store: Arc<dyn RecordStore> = if dry_run {
                info!("Dry run: records are kept in memory");
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(connect(cli.database_url.as_deref()).await?)
            };

            info!(file = %file.display(), batch_size = config.batch_size, "Loading CSV");
            let input = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;

            let service = IngestionService::new(store, config);
            let report = service.ingest_reader(input).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
        Command::Recent { limit } => {
            let store = connect(cli.database_url.as_deref()).await?;
            let records = store.list_recent(limit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        },
    }

    Ok(())
}

async fn connect(database_url: Option<&str>) -> Result<PgRecordStore> {
    let url = database_url.context("DATABASE_URL is required")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(PgRecordStore::new(pool))
}
