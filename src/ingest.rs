use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use tracing::{error, info, warn};

use crate::dedup::{filter_new_rows, Gated};
use crate::error::PipelineError;
use crate::source::read_source;
use crate::store::Store;

/// Fixed source-token → target-table mapping. Files are processed in this
/// order; it never changes at runtime.
pub const SOURCE_TABLES: &[(&str, &str)] = &[
    ("GRUPOS_CUSTEIO", "grupos_custeio"),
    ("DADOS_GRUPOS_CUSTEIO", "dados_grupos_custeio"),
    ("RESULTADO_PLANO", "resultado_plano"),
    ("PLANOS_DA", "planos_da"),
    ("TOTAL_RESERVAS", "total_reservas"),
    ("PROVISOES_A_CONSTITUIR", "provisoes_a_constituir"),
    ("FONTES_RECURSOS", "fontes_recursos"),
    ("DADOS_DA", "dados_da"),
    ("BENEFICIOS", "beneficios"),
    ("PARECER_PLANO", "parecer_plano"),
];

/// What happened to one source file (or to a token with no file at all).
#[derive(Debug, PartialEq, Eq)]
pub enum FileOutcome {
    Loaded { rows: usize },
    SkippedDuplicate,
    SkippedMissingFile,
    Failed { reason: String },
}

/// One outcome per discovered file, in processing order.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<(String, FileOutcome)>,
}

impl IngestReport {
    fn record(&mut self, name: String, outcome: FileOutcome) {
        self.outcomes.push((name, outcome));
    }

    pub fn loaded_rows(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                FileOutcome::Loaded { rows } => *rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Failed { .. }))
            .count()
    }
}

/// Files in `data_dir` matching `<period>-<token>.csv`, ascending by name
/// (and therefore by period).
fn source_files(data_dir: &Path, token: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*-{}.csv", data_dir.display(), token);
    let suffix = format!("{}.csv", token);
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("bad glob pattern `{}`", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| {
            // `*-GRUPOS_CUSTEIO.csv` also matches DADOS_GRUPOS_CUSTEIO files;
            // the token must be everything after the first `-`.
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split_once('-'))
                .map_or(false, |(_, rest)| rest == suffix)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn ingest_file(
    store: &mut Store,
    table: &str,
    path: &Path,
) -> std::result::Result<FileOutcome, PipelineError> {
    let batch = read_source(path)?;
    if batch.rows.is_empty() {
        // Header-only extract: nothing to gate, nothing to write.
        return Ok(FileOutcome::Loaded { rows: 0 });
    }
    match filter_new_rows(store, table, batch)? {
        Gated::FullyDuplicate => Ok(FileOutcome::SkippedDuplicate),
        Gated::Insert(batch) => {
            let rows = store.append(table, &batch)?;
            Ok(FileOutcome::Loaded { rows })
        }
    }
}

/// Run one ingestion pass: for every mapped token, read each matching file,
/// gate it against the store, and append the survivors.
///
/// One file's failure never stops the rest; it becomes a `Failed` outcome.
/// The store handle lives on this function's stack, so the connection is
/// released on every exit path.
pub fn run(data_dir: &Path, db_path: &Path) -> Result<IngestReport> {
    let mut store =
        Store::open(db_path).with_context(|| format!("opening store at {}", db_path.display()))?;
    let mut report = IngestReport::default();

    for &(token, table) in SOURCE_TABLES {
        let paths = source_files(data_dir, token)?;
        if paths.is_empty() {
            warn!(token, "no source file found; skipping");
            report.record(token.to_string(), FileOutcome::SkippedMissingFile);
            continue;
        }

        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?")
                .to_string();
            match ingest_file(&mut store, table, &path) {
                Ok(outcome) => {
                    match &outcome {
                        FileOutcome::Loaded { rows } => {
                            info!(file = %name, table, rows, "loaded")
                        }
                        FileOutcome::SkippedDuplicate => {
                            warn!(file = %name, table, "period already fully stored; skipping")
                        }
                        _ => {}
                    }
                    report.record(name, outcome);
                }
                Err(err) => {
                    error!(file = %name, table, %err, "ingestion failed");
                    report.record(name, FileOutcome::Failed {
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    info!(
        files = report.outcomes.len(),
        rows = report.loaded_rows(),
        failures = report.failures(),
        "ingestion pass complete"
    );
    Ok(report)
}
