use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use crate::error::Result;
use crate::source::{RawBatch, Value, PERIOD_COLUMN, PLAN_ID_COLUMN};

/// Exclusively-owned writer handle for one ingestion run. Dropping it closes
/// the connection on every exit path, so callers never leak the store.
pub struct Store {
    conn: Connection,
}

/// Canonical names may contain spaces, so every identifier is quoted.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite affinity for one column, inferred from the whole first batch:
/// all-integer → INTEGER, all-numeric → REAL, anything else (or no values
/// at all) → TEXT.
fn column_affinity(batch: &RawBatch, idx: usize) -> &'static str {
    let mut saw_value = false;
    let mut all_int = true;
    let mut all_num = true;
    for row in &batch.rows {
        match &row[idx] {
            Value::Null => {}
            Value::Integer(_) => saw_value = true,
            Value::Real(_) => {
                saw_value = true;
                all_int = false;
            }
            Value::Text(_) => {
                saw_value = true;
                all_int = false;
                all_num = false;
            }
        }
    }
    match (saw_value, all_int, all_num) {
        (false, _, _) => "TEXT",
        (true, true, _) => "INTEGER",
        (true, false, true) => "REAL",
        _ => "TEXT",
    }
}

fn columns_of(conn: &Connection, table: &str) -> rusqlite::Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(if cols.is_empty() { None } else { Some(cols) })
}

impl Store {
    /// Open the store file, creating it and its parent directory on first run.
    pub fn open(path: &Path) -> Result<Store> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Store { conn })
    }

    /// Registered columns for `table`, or `None` before its first batch.
    pub fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>> {
        Ok(columns_of(&self.conn, table)?)
    }

    /// Plan ids already stored for `period`, rendered as text. Empty when
    /// the table does not exist yet or never registered the plan column.
    pub fn existing_plan_ids(&self, table: &str, period: i32) -> Result<HashSet<String>> {
        match self.table_columns(table)? {
            Some(cols) if cols.iter().any(|c| c == PLAN_ID_COLUMN) => {}
            _ => return Ok(HashSet::new()),
        }
        let sql = format!(
            "SELECT DISTINCT CAST({} AS TEXT) FROM {} WHERE {} = ?1",
            quote_ident(PLAN_ID_COLUMN),
            quote_ident(table),
            quote_ident(PERIOD_COLUMN),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map([period], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<Option<String>>>>()?;
        Ok(ids.into_iter().flatten().collect())
    }

    /// Append the batch inside one transaction (one source file = one unit).
    ///
    /// On first contact the table is created with a column per key, typed by
    /// [`column_affinity`]. Later batches widen the registry: columns the
    /// table has not seen are added as nullable; registered columns the
    /// batch lacks simply insert NULL. Returns the number of rows written.
    pub fn append(&mut self, table: &str, batch: &RawBatch) -> Result<usize> {
        let tx = self.conn.transaction()?;

        match columns_of(&tx, table)? {
            None => {
                let defs: Vec<String> = batch
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{} {}", quote_ident(c), column_affinity(batch, i)))
                    .collect();
                tx.execute(
                    &format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", ")),
                    [],
                )?;
                info!(table, columns = batch.columns.len(), "created table");
            }
            Some(existing) => {
                let known: HashSet<&str> = existing.iter().map(String::as_str).collect();
                for (i, col) in batch.columns.iter().enumerate() {
                    if !known.contains(col.as_str()) {
                        tx.execute(
                            &format!(
                                "ALTER TABLE {} ADD COLUMN {} {}",
                                quote_ident(table),
                                quote_ident(col),
                                column_affinity(batch, i)
                            ),
                            [],
                        )?;
                        debug!(table, column = %col, "widened table with new column");
                    }
                }
            }
        }

        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            batch
                .columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            (1..=batch.columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", "),
        );
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in &batch.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(batch.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn batch(period: i32, columns: &[&str], rows: Vec<Vec<Value>>) -> RawBatch {
        RawBatch {
            file_name: format!("{}-TEST.csv", period),
            period,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("db/previc.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn creates_table_with_inferred_affinities() {
        let (_dir, mut store) = open_temp();
        let b = batch(
            2023,
            &["NU_CNPB_PLANO_DA", "QTD", "VL", "ANO"],
            vec![vec![
                Value::Text("a".into()),
                Value::Integer(3),
                Value::Real(1.5),
                Value::Integer(2023),
            ]],
        );
        assert_eq!(store.append("planos_da", &b).unwrap(), 1);
        assert_eq!(
            store.table_columns("planos_da").unwrap().unwrap(),
            vec!["NU_CNPB_PLANO_DA", "QTD", "VL", "ANO"]
        );
    }

    #[test]
    fn later_batch_widens_with_new_nullable_column() {
        let (_dir, mut store) = open_temp();
        let first = batch(
            2023,
            &["NU_CNPB_PLANO_DA", "ANO"],
            vec![vec![Value::Text("a".into()), Value::Integer(2023)]],
        );
        store.append("beneficios", &first).unwrap();

        let second = batch(
            2024,
            &["NU_CNPB_PLANO_DA", "NOVA COLUNA", "ANO"],
            vec![vec![
                Value::Text("b".into()),
                Value::Text("x".into()),
                Value::Integer(2024),
            ]],
        );
        store.append("beneficios", &second).unwrap();

        assert_eq!(
            store.table_columns("beneficios").unwrap().unwrap(),
            vec!["NU_CNPB_PLANO_DA", "ANO", "NOVA COLUNA"]
        );
        // The 2023 row never had the new column; it reads back NULL.
        let ids = store.existing_plan_ids("beneficios", 2023).unwrap();
        assert!(ids.contains("a"));
    }

    #[test]
    fn missing_registered_column_inserts_null() {
        let (_dir, mut store) = open_temp();
        let first = batch(
            2023,
            &["NU_CNPB_PLANO_DA", "VL", "ANO"],
            vec![vec![
                Value::Text("a".into()),
                Value::Real(9.0),
                Value::Integer(2023),
            ]],
        );
        store.append("dados_da", &first).unwrap();

        let narrower = batch(
            2024,
            &["NU_CNPB_PLANO_DA", "ANO"],
            vec![vec![Value::Text("b".into()), Value::Integer(2024)]],
        );
        store.append("dados_da", &narrower).unwrap();

        let ids_2024 = store.existing_plan_ids("dados_da", 2024).unwrap();
        assert_eq!(ids_2024.len(), 1);
        assert!(ids_2024.contains("b"));
    }

    #[test]
    fn plan_ids_are_scoped_to_period_and_rendered_as_text() {
        let (_dir, mut store) = open_temp();
        let b = batch(
            2023,
            &["NU_CNPB_PLANO_DA", "ANO"],
            vec![
                vec![Value::Integer(1234), Value::Integer(2023)],
                vec![Value::Text("2023.0013-74".into()), Value::Integer(2023)],
            ],
        );
        store.append("planos_da", &b).unwrap();

        let ids = store.existing_plan_ids("planos_da", 2023).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("1234"));
        assert!(ids.contains("2023.0013-74"));
        assert!(store.existing_plan_ids("planos_da", 2024).unwrap().is_empty());
    }

    #[test]
    fn unknown_table_has_no_plan_ids() {
        let (_dir, store) = open_temp();
        assert!(store.existing_plan_ids("nope", 2023).unwrap().is_empty());
        assert!(store.table_columns("nope").unwrap().is_none());
    }
}
