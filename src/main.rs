use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};

use classport::{ExportDirSource, MigrateError, Pipeline, RunLogger, RunSummary};

/// Exit code when the run completed but some records or collections failed.
const COMPLETED_WITH_ERRORS: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "classport", about = "Classport data migration helper", version)]
struct Cli {
    /// Optional explicit destination database path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run the full migration from a document-store export directory
    Run {
        /// Root of the JSONL export tree
        #[arg(long, value_name = "DIR")]
        source: PathBuf,

        /// Directory for the run log (defaults next to the database)
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,

        /// Apply the destination schema before migrating
        #[arg(long)]
        init_schema: bool,
    },
    /// Apply the destination schema and exit
    Schema,
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    match handle_cli(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("CLASSPORT_LOG").unwrap_or_else(|_| "classport=info,sqlx=warn".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}

async fn handle_cli(cli: Cli) -> Result<i32> {
    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };

    match cli.cmd {
        Cmd::Schema => {
            let pool = open_pool(&db_path, true).await?;
            classport::schema::apply_destination_schema(&pool)
                .await
                .context("apply destination schema")?;
            pool.close().await;
            println!("Schema applied to {}", db_path.display());
            Ok(0)
        }
        Cmd::Run {
            source,
            log_dir,
            init_schema,
        } => run_migration(&db_path, &source, log_dir.as_deref(), init_schema).await,
    }
}

async fn run_migration(
    db_path: &Path,
    source_root: &Path,
    log_dir: Option<&Path>,
    init_schema: bool,
) -> Result<i32> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("logs"),
    };
    let logger = RunLogger::create(&log_dir).context("create run log")?;
    tracing::info!(target: "classport", run_log = %logger.path().display(), "run log opened");

    let outcome = drive_migration(db_path, source_root, &logger, init_schema).await;

    match outcome {
        Ok(summary) => {
            log_summary(&logger, &summary);
            logger.close().context("close run log")?;
            if summary.clean() {
                Ok(0)
            } else {
                Ok(COMPLETED_WITH_ERRORS)
            }
        }
        Err(err) => {
            logger.log(&format!("migration aborted: {err:#}"));
            logger.close().context("close run log")?;
            Err(err)
        }
    }
}

async fn drive_migration(
    db_path: &Path,
    source_root: &Path,
    logger: &RunLogger,
    init_schema: bool,
) -> Result<RunSummary> {
    let pool = open_pool(db_path, init_schema).await?;
    if init_schema {
        classport::schema::apply_destination_schema(&pool)
            .await
            .context("apply destination schema")?;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_signal.store(true, Ordering::Relaxed);
        }
    });

    let source = ExportDirSource::new(source_root);
    logger.log(&format!(
        "migration started: source {} -> db {}",
        source_root.display(),
        db_path.display()
    ));

    let pipeline = Pipeline::new(&source, &pool, logger, &cancel);
    let result = pipeline.run().await;
    pool.close().await;

    match result {
        Ok(summary) => Ok(summary),
        Err(MigrateError::Cancelled) => {
            logger.log("migration cancelled");
            anyhow::bail!("migration cancelled")
        }
        Err(err) => Err(err).context("run migration"),
    }
}

fn log_summary(logger: &RunLogger, summary: &RunSummary) {
    for (entity, counts) in &summary.entities {
        logger.log(&format!(
            "{entity}: {} inserted, {} skipped, {} failed",
            counts.inserted, counts.skipped, counts.failed
        ));
    }
    for error in &summary.phase_errors {
        logger.log(&format!("phase error: {error}"));
    }
    if summary.clean() {
        logger.log("migration complete");
    } else {
        logger.log(&format!(
            "migration completed with errors: {} record failures, {} phase errors",
            summary.total_failed(),
            summary.phase_errors.len()
        ));
    }
}

fn default_db_path() -> Result<PathBuf> {
    if let Ok(fake) = std::env::var("CLASSPORT_FAKE_DATA_DIR") {
        return Ok(PathBuf::from(fake).join("classport.sqlite3"));
    }

    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| anyhow::anyhow!("failed to resolve application data directory"))?;
    Ok(base.join("classport").join("classport.sqlite3"))
}

async fn open_pool(db: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database parent directory {}", parent.display()))?;
        }
    } else if !db.exists() {
        anyhow::bail!("database not found: {}", db.display());
    }

    let options = SqliteConnectOptions::new()
        .filename(db)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .log_statements(log::LevelFilter::Off);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("open sqlite database at {}", db.display()))?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&pool)
        .await
        .ok();

    Ok(pool)
}
