//! Read-only consumer surface for the dashboard. Opens its own short-lived
//! connection and never writes; concurrent reads during an ingestion run may
//! observe a partially-written table, which is acceptable for an offline
//! batch pipeline.

use std::path::Path;

use rusqlite::{params, types, Connection, OpenFlags, OptionalExtension};

use crate::error::Result;
use crate::store::quote_ident;

/// One plan as listed for the year filter of the dashboard.
#[derive(Debug, Clone)]
pub struct PlanRef {
    /// NU_CNPB_PLANO_DA, rendered as text.
    pub code: String,
    /// SG_PLANO_DA.
    pub name: String,
    /// SG_EFPC_DA, the sponsoring entity.
    pub entity: String,
}

pub struct StoreReader {
    conn: Connection,
}

fn render(v: types::Value) -> Option<String> {
    match v {
        types::Value::Null => None,
        types::Value::Integer(i) => Some(i.to_string()),
        types::Value::Real(f) => Some(f.to_string()),
        types::Value::Text(s) => Some(s),
        types::Value::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}

impl StoreReader {
    pub fn open(path: &Path) -> Result<StoreReader> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(StoreReader { conn })
    }

    /// Distinct reporting periods, newest first.
    pub fn years(&self) -> Result<Vec<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT ANO FROM planos_da ORDER BY ANO DESC")?;
        let years = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i32>>>()?;
        Ok(years)
    }

    /// Plans reported for `year`.
    pub fn plans(&self, year: i32) -> Result<Vec<PlanRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT CAST(NU_CNPB_PLANO_DA AS TEXT), SG_PLANO_DA, SG_EFPC_DA \
             FROM planos_da WHERE ANO = ?1",
        )?;
        let plans = stmt
            .query_map([year], |row| {
                Ok(PlanRef {
                    code: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    entity: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<PlanRef>>>()?;
        Ok(plans)
    }

    /// First value of `column` in `table` for (plan, year), as text.
    pub fn metric(&self, table: &str, column: &str, plan: &str, year: i32) -> Result<Option<String>> {
        let sql = format!(
            "SELECT CAST({} AS TEXT) FROM {} \
             WHERE CAST(NU_CNPB_PLANO_DA AS TEXT) = ?1 AND ANO = ?2 LIMIT 1",
            quote_ident(column),
            quote_ident(table),
        );
        let value = self
            .conn
            .query_row(&sql, params![plan, year], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?;
        Ok(value.flatten())
    }

    /// Every row of `table` for (plan, year): column names plus text-rendered
    /// cells, NULLs as `None`.
    pub fn table_rows(
        &self,
        table: &str,
        plan: &str,
        year: i32,
    ) -> Result<(Vec<String>, Vec<Vec<Option<String>>>)> {
        let sql = format!(
            "SELECT * FROM {} WHERE CAST(NU_CNPB_PLANO_DA AS TEXT) = ?1 AND ANO = ?2",
            quote_ident(table),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut out = Vec::new();
        let mut rows = stmt.query(params![plan, year])?;
        while let Some(row) = rows.next()? {
            let mut rec = Vec::with_capacity(names.len());
            for i in 0..names.len() {
                rec.push(render(row.get::<_, types::Value>(i)?));
            }
            out.push(rec);
        }
        Ok((names, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RawBatch, Value};
    use crate::store::Store;
    use tempfile::tempdir;

    fn seed(dir: &Path) -> std::path::PathBuf {
        let db = dir.join("previc.db");
        let mut store = Store::open(&db).unwrap();
        let planos = RawBatch {
            file_name: "2023-PLANOS_DA.csv".into(),
            period: 2023,
            columns: vec![
                "NU_CNPB_PLANO_DA".into(),
                "SG_PLANO_DA".into(),
                "SG_EFPC_DA".into(),
                "ANO".into(),
            ],
            rows: vec![
                vec![
                    Value::Text("2023.0013-74".into()),
                    Value::Text("PLANO A".into()),
                    Value::Text("FUNDACAO X".into()),
                    Value::Integer(2023),
                ],
                vec![
                    Value::Text("2023.0014-55".into()),
                    Value::Text("PLANO B".into()),
                    Value::Text("FUNDACAO Y".into()),
                    Value::Integer(2023),
                ],
            ],
        };
        store.append("planos_da", &planos).unwrap();

        let reservas = RawBatch {
            file_name: "2023-TOTAL_RESERVAS.csv".into(),
            period: 2023,
            columns: vec![
                "NU_CNPB_PLANO_DA".into(),
                "SM_PROVISAO_MATEMATICA".into(),
                "ANO".into(),
            ],
            rows: vec![vec![
                Value::Text("2023.0013-74".into()),
                Value::Real(1_500_000.75),
                Value::Integer(2023),
            ]],
        };
        store.append("total_reservas", &reservas).unwrap();
        db
    }

    #[test]
    fn years_and_plans_come_back() {
        let dir = tempdir().unwrap();
        let db = seed(dir.path());
        let reader = StoreReader::open(&db).unwrap();

        assert_eq!(reader.years().unwrap(), vec![2023]);
        let plans = reader.plans(2023).unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().any(|p| p.name == "PLANO A" && p.entity == "FUNDACAO X"));
    }

    #[test]
    fn metric_reads_one_cell() {
        let dir = tempdir().unwrap();
        let db = seed(dir.path());
        let reader = StoreReader::open(&db).unwrap();

        let v = reader
            .metric("total_reservas", "SM_PROVISAO_MATEMATICA", "2023.0013-74", 2023)
            .unwrap();
        assert_eq!(v, Some("1500000.75".to_string()));
        assert_eq!(
            reader
                .metric("total_reservas", "SM_PROVISAO_MATEMATICA", "2023.0014-55", 2023)
                .unwrap(),
            None
        );
    }

    #[test]
    fn table_rows_filters_by_plan_and_year() {
        let dir = tempdir().unwrap();
        let db = seed(dir.path());
        let reader = StoreReader::open(&db).unwrap();

        let (cols, rows) = reader
            .table_rows("planos_da", "2023.0013-74", 2023)
            .unwrap();
        assert_eq!(cols[0], "NU_CNPB_PLANO_DA");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], Some("PLANO A".to_string()));
        assert!(reader
            .table_rows("planos_da", "2023.0013-74", 2024)
            .unwrap()
            .1
            .is_empty());
    }
}
