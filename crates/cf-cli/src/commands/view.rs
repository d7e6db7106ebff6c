//! View command implementation - prints read models

use anyhow::{Context, Result};
use cf_store::query::{self, MoverRow, ProvinceAnomalies, QueryResult, SummaryStats};

use crate::cli::{GlobalArgs, OutputFormat, ReadModel, ViewArgs};
use crate::commands::common;
use crate::context::RuntimeContext;

const DEFAULT_VIEW_LIMIT: usize = 100;

/// Execute the view command
pub(crate) async fn execute(args: &ViewArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let conn = ctx.db.conn();
    let reporting = &ctx.config.reporting;

    match args.name {
        ReadModel::TopMovers => {
            let from_year = args.from_year.unwrap_or(reporting.from_year);
            let to_year = args.to_year.unwrap_or(reporting.to_year);
            if from_year >= to_year {
                anyhow::bail!("--from-year ({from_year}) must be before --to-year ({to_year})");
            }
            let limit = args.limit.unwrap_or(reporting.top_movers_limit);
            let movers = query::top_movers(conn, from_year, to_year, limit)
                .context("Failed to compute top movers")?;
            match args.output {
                OutputFormat::Json => common::print_json(&movers),
                OutputFormat::Table => {
                    println!("Top movers {from_year} -> {to_year}");
                    print_movers(&movers);
                    Ok(())
                }
            }
        }
        ReadModel::ProvinceAnomalies => {
            let sigma = args.sigma.unwrap_or(reporting.anomaly_sigma);
            if !(sigma > 0.0 && sigma.is_finite()) {
                anyhow::bail!("--sigma must be positive, got {sigma}");
            }
            let anomalies = query::province_anomalies(conn, sigma)
                .context("Failed to compute province anomalies")?;
            match (args.output, anomalies) {
                (OutputFormat::Json, anomalies) => common::print_json(&anomalies),
                (OutputFormat::Table, None) => {
                    println!("Province anomalies need facts for at least two years.");
                    Ok(())
                }
                (OutputFormat::Table, Some(anomalies)) => {
                    print_anomalies(&anomalies);
                    Ok(())
                }
            }
        }
        ReadModel::SummaryStats => {
            let stats = query::summary_stats(conn).context("Failed to compute summary stats")?;
            match args.output {
                OutputFormat::Json => common::print_json(&stats),
                OutputFormat::Table => {
                    print_summary(&stats);
                    Ok(())
                }
            }
        }
        name => {
            let Some(view) = name.view_name() else {
                anyhow::bail!("{name:?} is not backed by a view");
            };
            let result = query::read_model(conn, view, args.limit.unwrap_or(DEFAULT_VIEW_LIMIT))
                .with_context(|| format!("Failed to read cf.{view}"))?;
            match args.output {
                OutputFormat::Json => common::print_json(&to_json_rows(&result)),
                OutputFormat::Table => {
                    let headers: Vec<&str> = result.columns.iter().map(String::as_str).collect();
                    common::print_table(&headers, &result.rows);
                    Ok(())
                }
            }
        }
    }
}

fn print_movers(movers: &[MoverRow]) {
    let rows: Vec<Vec<String>> = movers
        .iter()
        .map(|m| {
            vec![
                m.unit_code.clone(),
                m.unit_name.clone(),
                m.cost_type_code.clone(),
                m.from_value.to_string(),
                m.to_value.to_string(),
                m.change.to_string(),
                common::or_dash(m.pct_change.map(|p| format!("{p:.2}"))),
            ]
        })
        .collect();
    common::print_table(
        &["UNIT", "NAME", "COST_TYPE", "FROM", "TO", "CHANGE", "PCT"],
        &rows,
    );
}

fn anomaly_rows(anomalies: &ProvinceAnomalies) -> Vec<Vec<String>> {
    anomalies
        .rows
        .iter()
        .map(|r| {
            vec![
                r.province_code.clone(),
                r.province_name.clone(),
                r.from_total.to_string(),
                r.to_total.to_string(),
                r.change.to_string(),
                common::or_dash(r.pct_change.map(|p| format!("{p:.1}"))),
                if r.is_outlier { "yes" } else { "" }.to_string(),
            ]
        })
        .collect()
}

fn print_anomalies(anomalies: &ProvinceAnomalies) {
    println!(
        "Province changes {} -> {} (mean {}%, stddev {}%, outside {} sigma flagged)",
        anomalies.from_year,
        anomalies.to_year,
        common::or_dash(anomalies.mean_pct_change.map(|p| format!("{p:.1}"))),
        common::or_dash(anomalies.stddev_pct_change.map(|p| format!("{p:.1}"))),
        anomalies.sigma
    );
    common::print_table(
        &["PROVINCE", "NAME", "FROM", "TO", "CHANGE", "PCT", "OUTLIER"],
        &anomaly_rows(anomalies),
    );
}

fn summary_rows(stats: &SummaryStats) -> Vec<Vec<String>> {
    let join = |items: Vec<String>| {
        if items.is_empty() {
            "-".to_string()
        } else {
            items.join(", ")
        }
    };
    vec![
        vec!["records".into(), stats.total_records.to_string()],
        vec![
            "years".into(),
            join(stats.years.iter().map(i32::to_string).collect()),
        ],
        vec!["provinces".into(), stats.province_count.to_string()],
        vec![
            "categories".into(),
            join(stats.categories.iter().map(|c| c.as_str().to_string()).collect()),
        ],
        vec!["province total".into(), stats.province_total.to_string()],
        vec!["province average".into(), common::or_dash(stats.province_avg)],
        vec!["min value".into(), common::or_dash(stats.min_value)],
        vec!["max value".into(), common::or_dash(stats.max_value)],
    ]
}

fn print_summary(stats: &SummaryStats) {
    common::print_table(&["STAT", "VALUE"], &summary_rows(stats));
}

/// One JSON object per row, `null` cells as JSON null.
fn to_json_rows(result: &QueryResult) -> Vec<serde_json::Value> {
    result
        .rows
        .iter()
        .map(|row| {
            let map: serde_json::Map<String, serde_json::Value> = result
                .columns
                .iter()
                .zip(row.iter())
                .map(|(col, val)| {
                    let json_val = if val == "null" {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(val.clone())
                    };
                    (col.clone(), json_val)
                })
                .collect();
            serde_json::Value::Object(map)
        })
        .collect()
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
