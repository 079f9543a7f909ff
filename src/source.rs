use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use tracing::debug;

use crate::columns::normalize_headers;
use crate::error::{PipelineError, Result};

/// Reporting-period column injected into every persisted row.
pub const PERIOD_COLUMN: &str = "ANO";

/// Dedup key for plan-bearing tables; not every source carries it.
pub const PLAN_ID_COLUMN: &str = "NU_CNPB_PLANO_DA";

/// One typed cell, carrying the affinity SQLite would give the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl Value {
    /// Type a raw CSV field: empty → Null, i64 → Integer, f64 → Real,
    /// anything else stays Text.
    pub fn parse(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Real(f);
        }
        Value::Text(raw.to_string())
    }

    /// Textual rendering matching SQLite's `CAST(x AS TEXT)`, so incoming
    /// cells compare cleanly against stored plan ids. SQLite prints whole
    /// reals with a trailing `.0`, hence the special case.
    pub fn as_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.fract() == 0.0 && f.is_finite() => format!("{:.1}", f),
            Value::Real(f) => f.to_string(),
            Value::Null => String::new(),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
        })
    }
}

/// The rows read from one source file, headers already canonical and the
/// reporting period injected as the ANO column on every row.
#[derive(Debug)]
pub struct RawBatch {
    pub file_name: String,
    pub period: i32,
    /// Canonical column names; always contains [`PERIOD_COLUMN`].
    pub columns: Vec<String>,
    /// Row-major cells; every row has `columns.len()` entries.
    pub rows: Vec<Vec<Value>>,
}

impl RawBatch {
    pub fn plan_id_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c == PLAN_ID_COLUMN)
    }

    pub fn period_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c == PERIOD_COLUMN)
    }
}

/// Parse the reporting period from a file name shaped `<year>-<SOURCE>.csv`:
/// everything before the first `-` must be an integer.
pub fn period_from_filename(file_name: &str) -> Result<i32> {
    let token = file_name.split('-').next().unwrap_or("");
    token
        .trim()
        .parse::<i32>()
        .map_err(|_| PipelineError::MalformedFilename {
            name: file_name.to_string(),
        })
}

fn unreadable(path: &Path, err: impl fmt::Display) -> PipelineError {
    PipelineError::SourceUnreadable {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

/// Decode raw bytes: UTF-8 first (BOM tolerated), Windows-1252 on failure.
fn decode(path: &Path, bytes: &[u8]) -> Result<String> {
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => return Ok(text.to_string()),
        Err(err) => {
            debug!(path = %path.display(), %err, "not UTF-8; falling back to Windows-1252");
        }
    }
    let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
    if had_errors {
        return Err(unreadable(path, "undecodable byte sequence in both encodings"));
    }
    Ok(text.into_owned())
}

/// Read one `;`-separated source extract into a [`RawBatch`].
///
/// The header row is canonicalized; two raw headers collapsing to one
/// canonical name abort the file with [`PipelineError::ColumnCollision`].
/// The period parsed from the file name is written into an ANO column —
/// overwriting one the file already carries, appending otherwise.
pub fn read_source(path: &Path) -> Result<RawBatch> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::MalformedFilename {
            name: path.display().to_string(),
        })?;
    let period = period_from_filename(&file_name)?;

    let bytes = fs::read(path)?;
    let text = decode(path, &bytes)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_reader(text.as_bytes());

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut columns = normalize_headers(&raw_headers);

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, canonical) in columns.iter().enumerate() {
        if let Some(prev) = seen.insert(canonical.clone(), idx) {
            return Err(PipelineError::ColumnCollision {
                first: raw_headers[prev].clone(),
                second: raw_headers[idx].clone(),
                canonical: canonical.clone(),
            });
        }
    }

    let period_idx = columns.iter().position(|c| c == PERIOD_COLUMN);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| unreadable(path, e))?;
        let mut row: Vec<Value> = record.iter().map(Value::parse).collect();
        match period_idx {
            Some(i) => row[i] = Value::Integer(period as i64),
            None => row.push(Value::Integer(period as i64)),
        }
        rows.push(row);
    }
    if period_idx.is_none() {
        columns.push(PERIOD_COLUMN.to_string());
    }

    debug!(file = %file_name, period, rows = rows.len(), "read source");
    Ok(RawBatch {
        file_name,
        period,
        columns,
        rows,
    })
}
