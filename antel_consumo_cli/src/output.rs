//! Output formatting for consumption snapshots: table, markdown and JSON.

use antel_consumo_lib::ConsumptionSnapshot;
use chrono::NaiveDate;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format selected by the global `--output` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            "markdown" | "md" => Self::Markdown,
            _ => Self::Table,
        }
    }
}

#[derive(Tabled, Serialize)]
pub struct SnapshotRow {
    #[tabled(rename = "Field")]
    #[serde(rename = "field")]
    pub field: &'static str,
    #[tabled(rename = "Value")]
    #[serde(rename = "value")]
    pub value: String,
}

/// JSON view: the snapshot plus today's usage when known.
#[derive(Serialize)]
pub struct SnapshotReport<'a> {
    #[serde(flatten)]
    pub snapshot: &'a ConsumptionSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_usage_gb: Option<f64>,
}

fn gb(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2} GB", v))
        .unwrap_or_else(|| "-".to_string())
}

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn build_snapshot_rows(snapshot: &ConsumptionSnapshot, daily: Option<f64>) -> Vec<SnapshotRow> {
    let mut rows = vec![
        SnapshotRow {
            field: "Used",
            value: gb(snapshot.used_data_gb()),
        },
        SnapshotRow {
            field: "Total",
            value: gb(snapshot.total_data_gb()),
        },
        SnapshotRow {
            field: "Remaining",
            value: gb(snapshot.remaining_data_gb()),
        },
        SnapshotRow {
            field: "Used %",
            value: snapshot
                .percentage_used()
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_else(|| "-".to_string()),
        },
    ];
    if let Some(daily) = daily {
        rows.push(SnapshotRow {
            field: "Today",
            value: gb(Some(daily)),
        });
    }
    rows.extend([
        SnapshotRow {
            field: "Plan",
            value: text(snapshot.plan_name()),
        },
        SnapshotRow {
            field: "Billing period",
            value: text(snapshot.billing_period()),
        },
        SnapshotRow {
            field: "Days to renewal",
            value: snapshot
                .days_until_renewal()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        },
        SnapshotRow {
            field: "Contract end",
            value: date(snapshot.contract_end_date()),
        },
        SnapshotRow {
            field: "Top-up balance",
            value: gb(snapshot.topup_balance_gb()),
        },
        SnapshotRow {
            field: "Top-up expires",
            value: date(snapshot.topup_expiration()),
        },
        SnapshotRow {
            field: "Source",
            value: snapshot.quantity_source().as_str().to_string(),
        },
        SnapshotRow {
            field: "Captured at",
            value: snapshot.captured_at().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        },
    ]);
    rows
}

pub fn print_snapshot_table(snapshot: &ConsumptionSnapshot, daily: Option<f64>) {
    println!("{}", Table::new(build_snapshot_rows(snapshot, daily)));
}

pub fn print_snapshot_markdown(snapshot: &ConsumptionSnapshot, daily: Option<f64>) {
    let mut table = Table::new(build_snapshot_rows(snapshot, daily));
    table.with(Style::markdown());
    println!("{}", table);
}

pub fn print_snapshot(snapshot: &ConsumptionSnapshot, daily: Option<f64>, format: OutputFormat) {
    match format {
        OutputFormat::Table => print_snapshot_table(snapshot, daily),
        OutputFormat::Markdown => print_snapshot_markdown(snapshot, daily),
        OutputFormat::Json => print_json(&SnapshotReport {
            snapshot,
            daily_usage_gb: daily,
        }),
    }
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}
