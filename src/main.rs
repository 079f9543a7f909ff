use anyhow::Result;
use previc_loader::ingest::{self, FileOutcome};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) configure paths ──────────────────────────────────────────
    // previc-loader [data_dir] [db_path]
    let mut args = std::env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));
    let db_path = PathBuf::from(
        args.next()
            .unwrap_or_else(|| "database/previc_data.db".to_string()),
    );
    info!(data_dir = %data_dir.display(), db = %db_path.display(), "startup");

    // ─── 3) run the ingestion pass ───────────────────────────────────
    let report = ingest::run(&data_dir, &db_path)?;

    // ─── 4) per-file status lines ────────────────────────────────────
    for (file, outcome) in &report.outcomes {
        match outcome {
            FileOutcome::Loaded { rows } => println!("loaded   {} ({} rows)", file, rows),
            FileOutcome::SkippedDuplicate => {
                println!("skipped  {} (period already stored)", file)
            }
            FileOutcome::SkippedMissingFile => println!("skipped  {} (no file)", file),
            FileOutcome::Failed { reason } => println!("failed   {} ({})", file, reason),
        }
    }
    info!("import complete");
    Ok(())
}
