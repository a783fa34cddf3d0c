//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use anyhow::Result;
use colored::Colorize;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use strata::db::{Asset, PricePoint, Snapshot, StrategyVersion};
use strata::reports::{AllocationEntry, AttributionEntry, Metrics, TrendPoint};
use strata::snapshots::SnapshotDetails;
use strata::strategy;
use strata::utils::{format_amount, format_percent};

/// Pretty JSON with the library's camelCase field names
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn format_empty(what: &str) -> String {
    format!("{} No {} found", "ℹ".blue().bold(), what)
}

/// Green for gains, red for losses
fn signed_amount(value: Decimal) -> String {
    let text = format_amount(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn signed_percent(value: Decimal) -> String {
    let text = format_percent(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn render<T: Tabled>(rows: &[T], numeric_from: usize) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.modify(Columns::new(numeric_from..), Alignment::right());
    table.to_string()
}

pub fn format_assets_table(assets: &[Asset]) -> String {
    #[derive(Tabled)]
    struct AssetRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Name")]
        name: String,
    }

    let rows: Vec<AssetRow> = assets
        .iter()
        .map(|a| AssetRow {
            id: a.id,
            category: a.category.as_str().to_string(),
            name: a.name.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn format_prices_table(prices: &[PricePoint], names: &HashMap<i64, String>) -> String {
    #[derive(Tabled)]
    struct PriceRow {
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Price")]
        price: String,
    }

    let rows: Vec<PriceRow> = prices
        .iter()
        .map(|p| PriceRow {
            asset: names
                .get(&p.asset_id)
                .cloned()
                .unwrap_or_else(|| format!("#{}", p.asset_id)),
            date: p.price_date.to_string(),
            price: p.price.normalize().to_string(),
        })
        .collect();

    render(&rows, 2)
}

pub fn format_snapshot_list(snapshots: &[Snapshot]) -> String {
    #[derive(Tabled)]
    struct SnapshotRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Invested")]
        invested: String,
        #[tabled(rename = "P&L")]
        pl: String,
        #[tabled(rename = "Note")]
        note: String,
    }

    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .map(|s| SnapshotRow {
            id: s.id,
            date: s.date.to_string(),
            value: format_amount(s.total_value),
            invested: format_amount(s.total_invested),
            pl: signed_amount(s.total_value - s.total_invested),
            note: s.note.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..5), Alignment::right());
    table.to_string()
}

pub fn format_snapshot_details(details: &SnapshotDetails) -> String {
    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Added Qty")]
        added_quantity: String,
        #[tabled(rename = "Added Principal")]
        added_principal: String,
    }

    let snapshot = &details.snapshot;
    let mut output = format!(
        "\n{} Snapshot {} ({})\n\n",
        "📸".cyan().bold(),
        snapshot.id,
        snapshot.date
    );

    if details.assets.is_empty() {
        output.push_str(&format_empty("holdings"));
        output.push('\n');
    } else {
        let rows: Vec<HoldingRow> = details
            .assets
            .iter()
            .map(|a| HoldingRow {
                asset: a.asset.name.clone(),
                category: a.asset.category.as_str().to_string(),
                quantity: a.quantity.normalize().to_string(),
                price: a.unit_price.normalize().to_string(),
                value: format_amount(a.market_value),
                cost: format_amount(a.total_cost),
                added_quantity: a.added_quantity.normalize().to_string(),
                added_principal: format_amount(a.added_principal),
            })
            .collect();
        output.push_str(&render(&rows, 2));
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{:<16} {}",
        "Total Value:".bold(),
        format_amount(snapshot.total_value)
    ));
    output.push_str(&format!(
        "\n{:<16} {}",
        "Invested:".bold(),
        format_amount(snapshot.total_invested)
    ));
    if let Some(note) = &snapshot.note {
        output.push_str(&format!("\n{:<16} {}", "Note:".bold(), note));
    }
    output.push('\n');
    output
}

pub fn format_strategy_list(versions: &[StrategyVersion]) -> String {
    #[derive(Tabled)]
    struct VersionRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Start")]
        start_date: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Layers")]
        layers: String,
    }

    let rows: Vec<VersionRow> = versions
        .iter()
        .map(|v| VersionRow {
            id: v.id,
            name: v.name.clone(),
            start_date: v.start_date.to_string(),
            status: v.status.clone(),
            layers: v
                .layers
                .iter()
                .map(|l| format!("{} {}", l.name, format_percent(l.weight)))
                .join(", "),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn format_strategy(version: &StrategyVersion) -> String {
    #[derive(Tabled)]
    struct TargetRow {
        #[tabled(rename = "Layer")]
        layer: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "Asset")]
        asset_id: i64,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Of Portfolio")]
        of_portfolio: String,
    }

    let mut output = format!(
        "\n{} {} (#{}, from {}, {})\n\n",
        "🎯".cyan().bold(),
        version.name.bold(),
        version.id,
        version.start_date,
        version.status
    );

    let rows: Vec<TargetRow> = version
        .layers
        .iter()
        .flat_map(|layer| {
            strategy::resolve_target_weights(layer)
                .into_iter()
                .zip(&layer.targets)
                .map(move |((_, weight), target)| {
                    let weight_text = if target.is_auto() {
                        format!("{} (auto)", format_percent(weight))
                    } else {
                        format_percent(weight)
                    };
                    TargetRow {
                        layer: format!("{} {}", layer.name, format_percent(layer.weight)),
                        target: target.display_name.clone(),
                        asset_id: target.asset_id,
                        weight: weight_text,
                        of_portfolio: format_percent(
                            layer.weight * weight / Decimal::ONE_HUNDRED,
                        ),
                    }
                })
        })
        .collect();

    if rows.is_empty() {
        output.push_str(&format_empty("targets"));
        output.push('\n');
    } else {
        output.push_str(&render(&rows, 3));
        output.push('\n');
    }
    output
}

pub fn format_metrics(metrics: &Metrics) -> String {
    let mut output = format!("\n{} {}\n", "📈".cyan().bold(), metrics.period_label.bold());
    output.push_str(&format!("{}\n", "━".repeat(40).bright_black()));
    output.push_str(&format!(
        "{:<16} {}\n",
        "End Value:".bold(),
        format_amount(metrics.end_value)
    ));
    output.push_str(&format!(
        "{:<16} {}\n",
        "Invested:".bold(),
        format_amount(metrics.end_invested)
    ));
    output.push_str(&format!(
        "{:<16} {}\n",
        "Profit:".bold(),
        signed_amount(metrics.profit)
    ));
    output.push_str(&format!(
        "{:<16} {}\n",
        "Return:".bold(),
        signed_percent(metrics.return_rate)
    ));
    output
}

pub fn format_allocation(entries: &[AllocationEntry]) -> String {
    #[derive(Tabled)]
    struct AllocationRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Actual")]
        percent: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "Deviation")]
        deviation: String,
    }

    let rows: Vec<AllocationRow> = entries
        .iter()
        .map(|e| AllocationRow {
            name: e.name.clone(),
            value: format_amount(e.value),
            percent: format_percent(e.percent),
            target: e
                .target_percent
                .map(format_percent)
                .unwrap_or_else(|| "-".to_string()),
            deviation: e
                .deviation
                .map(signed_percent)
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    render(&rows, 1)
}

pub fn format_trend(points: &[TrendPoint]) -> String {
    #[derive(Tabled)]
    struct TrendRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Invested")]
        invested: String,
        #[tabled(rename = "P&L")]
        pl: String,
    }

    let rows: Vec<TrendRow> = points
        .iter()
        .map(|p| TrendRow {
            date: p.date.to_string(),
            value: format_amount(p.value),
            invested: format_amount(p.invested),
            pl: signed_amount(p.value - p.invested),
        })
        .collect();

    render(&rows, 1)
}

pub fn format_attribution(entries: &[AttributionEntry]) -> String {
    #[derive(Tabled)]
    struct AttributionRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "End Value")]
        end_val: String,
        #[tabled(rename = "End Cost")]
        end_cost: String,
        #[tabled(rename = "Value Change")]
        change_val: String,
        #[tabled(rename = "Net Input")]
        change_input: String,
        #[tabled(rename = "Profit")]
        profit: String,
    }

    let rows: Vec<AttributionRow> = entries
        .iter()
        .map(|e| AttributionRow {
            name: e.name.clone(),
            end_val: format_amount(e.end_val),
            end_cost: format_amount(e.end_cost),
            change_val: format_amount(e.change_val),
            change_input: format_amount(e.change_input),
            profit: signed_amount(e.profit),
        })
        .collect();

    let total: Decimal = entries.iter().map(|e| e.profit).sum();
    format!(
        "{}\n\n{:<16} {}\n",
        render(&rows, 1),
        "Total Profit:".bold(),
        signed_amount(total)
    )
}
