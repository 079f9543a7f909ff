use std::collections::HashSet;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::source::{RawBatch, Value};
use crate::store::Store;

/// Gate decision for one batch.
#[derive(Debug)]
pub enum Gated {
    /// Rows safe to insert, original order preserved.
    Insert(RawBatch),
    /// Every incoming plan id already exists for this period; nothing to write.
    FullyDuplicate,
}

/// Decide which rows of `batch` may be appended to `table`.
///
/// Batches without a plan-id column have no dedup key and pass through
/// unchanged. Otherwise the store is asked which plan ids it already holds
/// for the batch's period, and matching rows (textual compare) are dropped.
/// A batch whose ANO cells disagree with its declared period would be
/// deduplicated against the wrong year, so it is rejected up front.
pub fn filter_new_rows(store: &Store, table: &str, batch: RawBatch) -> Result<Gated> {
    if let Some(ano) = batch.period_index() {
        for row in &batch.rows {
            let matches_period =
                matches!(&row[ano], Value::Integer(i) if *i == i64::from(batch.period));
            if !matches_period {
                return Err(PipelineError::MixedPeriods {
                    expected: batch.period,
                    found: row[ano].as_text(),
                });
            }
        }
    }

    let plan_idx = match batch.plan_id_index() {
        Some(i) => i,
        None => return Ok(Gated::Insert(batch)),
    };

    let existing: HashSet<String> = store.existing_plan_ids(table, batch.period)?;
    if existing.is_empty() {
        return Ok(Gated::Insert(batch));
    }

    let mut batch = batch;
    let before = batch.rows.len();
    batch
        .rows
        .retain(|row| !existing.contains(&row[plan_idx].as_text()));

    if batch.rows.is_empty() {
        return Ok(Gated::FullyDuplicate);
    }
    if batch.rows.len() < before {
        debug!(
            table,
            period = batch.period,
            dropped = before - batch.rows.len(),
            kept = batch.rows.len(),
            "dropped rows already stored for this period"
        );
    }
    Ok(Gated::Insert(batch))
}
