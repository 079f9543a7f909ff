use std::path::PathBuf;

use thiserror::Error;

/// Per-file failures inside the ingestion pipeline. A mapped source that is
/// simply absent from the data directory is *not* an error; the orchestrator
/// records it as a skip outcome instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file exists but neither UTF-8 nor Windows-1252 yields parseable
    /// `;`-separated rows.
    #[error("{path}: source not readable as UTF-8 or Windows-1252 CSV: {detail}")]
    SourceUnreadable { path: PathBuf, detail: String },

    /// The reporting period could not be parsed from the leading filename
    /// token (`<year>-<SOURCE>.csv`).
    #[error("cannot derive reporting period from file name `{name}`")]
    MalformedFilename { name: String },

    /// Two distinct raw headers collapsed to the same canonical column name.
    /// Silently keeping one of them would clobber the other's data.
    #[error("headers `{first}` and `{second}` both normalize to `{canonical}`")]
    ColumnCollision {
        first: String,
        second: String,
        canonical: String,
    },

    /// A batch carried an ANO value other than the period its filename
    /// declares. Dedup is scoped to a single period, so this is rejected
    /// outright instead of being mis-deduplicated.
    #[error("batch declares period {expected} but a row carries ANO `{found}`")]
    MixedPeriods { expected: i32, found: String },

    #[error("store write failed: {0}")]
    Write(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
