//! Strategy resolution: which version is in force on a date, and how its
//! layers and targets map onto assets.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::db::{self, Layer, StrategyVersion, Target};

/// Pick the version in force on `date` from an arbitrary list of versions.
///
/// The version with the latest start date on or before `date` wins. When
/// every version starts after `date`, the oldest one is returned so that a
/// strategy is always resolved while at least one exists.
pub fn select_active(versions: &[StrategyVersion], date: NaiveDate) -> Option<&StrategyVersion> {
    let mut sorted: Vec<&StrategyVersion> = versions.iter().collect();
    // Descending by start date; ties resolved towards the later-created id
    sorted.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));

    sorted
        .iter()
        .find(|v| v.start_date <= date)
        .or_else(|| sorted.last())
        .copied()
}

/// Load all versions and resolve the one in force on `date`
pub fn active_strategy_at(conn: &Connection, date: NaiveDate) -> Result<Option<StrategyVersion>> {
    let versions = db::list_strategies(conn)?;
    let active = select_active(&versions, date).cloned();
    match &active {
        Some(v) => debug!("Strategy '{}' ({}) in force on {}", v.name, v.id, date),
        None => debug!("No strategy versions defined"),
    }
    Ok(active)
}

/// Where an asset sits inside a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub layer: Layer,
    pub target: Target,
}

/// Flatten layers and targets into asset id -> placement.
///
/// Layers and targets are walked in stored order; an asset listed in several
/// targets keeps the last one encountered.
pub fn asset_map(strategy: &StrategyVersion) -> HashMap<i64, Placement> {
    let mut map = HashMap::new();
    for layer in &strategy.layers {
        for target in &layer.targets {
            map.insert(
                target.asset_id,
                Placement {
                    layer: layer.clone(),
                    target: target.clone(),
                },
            );
        }
    }
    map
}

/// Effective weight of every target in the layer, in target order.
///
/// Fixed weights are used as-is. Auto targets split what remains of 100
/// after the fixed weights evenly; the remainder never goes below zero.
pub fn resolve_target_weights(layer: &Layer) -> Vec<(i64, Decimal)> {
    let fixed_sum: Decimal = layer
        .targets
        .iter()
        .filter(|t| !t.is_auto())
        .map(|t| t.weight)
        .sum();
    let auto_count = layer.targets.iter().filter(|t| t.is_auto()).count();

    let remaining = (Decimal::ONE_HUNDRED - fixed_sum).max(Decimal::ZERO);
    let auto_share = if auto_count > 0 {
        remaining / Decimal::from(auto_count)
    } else {
        Decimal::ZERO
    };

    layer
        .targets
        .iter()
        .map(|t| (t.id, if t.is_auto() { auto_share } else { t.weight }))
        .collect()
}
