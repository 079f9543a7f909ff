//! Terminal rendition of the dashboard's headline view for one plan/year:
//! resolves the plan code from planos_da, then prints the same metric cells
//! and the costing-group detail table the dashboard shows.

use anyhow::{bail, Context, Result};
use previc_loader::query::StoreReader;
use std::path::Path;

fn main() -> Result<()> {
    // plan_summary <SG_PLANO_DA> <year> [db_path]
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: plan_summary <plan> <year> [db_path]");
    }
    let plan_name = &args[0];
    let year: i32 = args[1].parse().context("year must be an integer")?;
    let db_path = args
        .get(2)
        .map(String::as_str)
        .unwrap_or("database/previc_data.db");

    let reader = StoreReader::open(Path::new(db_path))
        .with_context(|| format!("opening store at {}", db_path))?;

    let plans = reader.plans(year)?;
    let plan = plans
        .iter()
        .find(|p| p.name == *plan_name)
        .with_context(|| format!("no data for plan `{}` in {}", plan_name, year))?;

    println!("Plano {} ({}) — {}", plan.name, plan.code, year);
    println!("Entidade (EFPC): {}", plan.entity);
    println!();

    let metrics: &[(&str, &str, &str)] = &[
        ("beneficios", "NM_REGIME_FINANCEIRO", "Regime financeiro"),
        ("grupos_custeio", "QTD_PART_ATIVOS", "Participantes ativos"),
        ("grupos_custeio", "VR_FOLHA_SAL", "Folha salarial"),
        ("dados_da", "NU_DURATION_MESES", "Duration (meses)"),
        ("resultado_plano", "VL_RESULTADO_EXERCICIO", "Resultado do exercício"),
        ("resultado_plano", "VL_DEFICIT_TECNICO", "Déficit técnico"),
        ("resultado_plano", "VL_SUPERAVIT_TECNICO", "Superávit técnico"),
        ("total_reservas", "SM_PROVISAO_MATEMATICA", "Provisão matemática"),
        ("provisoes_a_constituir", "SM_PASSIVO_PROVISAO_CONST", "Provisões a constituir"),
    ];
    for (table, column, label) in metrics {
        match reader.metric(table, column, &plan.code, year) {
            Ok(Some(v)) => println!("{:<26} {}", label, v),
            // A table may simply not be loaded yet; show a dash either way.
            Ok(None) | Err(_) => println!("{:<26} -", label),
        }
    }

    // The detail table may not have been loaded yet; silence only that case.
    let (cols, rows) = reader
        .table_rows("dados_grupos_custeio", &plan.code, year)
        .unwrap_or_default();
    if !rows.is_empty() {
        println!();
        println!("Grupos de custeio ({}):", rows.len());
        println!("  {}", cols.join(" | "));
        for row in rows {
            let cells: Vec<String> = row
                .into_iter()
                .map(|c| c.unwrap_or_else(|| "-".to_string()))
                .collect();
            println!("  {}", cells.join(" | "));
        }
    }

    Ok(())
}
