//! Strategy store: versions with nested layers and targets.
//!
//! Updates preserve the ids of items that are supplied with one, so that
//! allocation reports keyed by layer or target id remain stable across edits.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::info;

use super::models::{Layer, NewLayer, NewStrategyVersion, StrategyVersion, Target, AUTO_WEIGHT};
use super::{get_asset, get_decimal_value, write_transaction};
use crate::error::{not_found, validation};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn validate(input: &NewStrategyVersion) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(validation("strategy name cannot be empty"));
    }
    for layer in &input.layers {
        if layer.name.trim().is_empty() {
            return Err(validation("layer name cannot be empty"));
        }
        if layer.weight < Decimal::ZERO || layer.weight > HUNDRED {
            return Err(validation(format!(
                "layer '{}' weight {} is outside 0-100",
                layer.name, layer.weight
            )));
        }
        for target in &layer.targets {
            let in_range = target.weight >= Decimal::ZERO && target.weight <= HUNDRED;
            if !in_range && target.weight != AUTO_WEIGHT {
                return Err(validation(format!(
                    "target '{}' weight {} must be 0-100 or -1 (auto)",
                    target.display_name, target.weight
                )));
            }
        }
    }
    Ok(())
}

/// Create or update a strategy version and its layers/targets in one transaction.
/// Returns the version id.
pub fn save_strategy(conn: &mut Connection, input: &NewStrategyVersion) -> Result<i64> {
    validate(input)?;

    let tx = write_transaction(conn).context("Failed to begin strategy save")?;

    for layer in &input.layers {
        for target in &layer.targets {
            if get_asset(&tx, target.asset_id)?.is_none() {
                return Err(validation(format!(
                    "target '{}' references unknown asset {}",
                    target.display_name, target.asset_id
                )));
            }
        }
    }

    let version_id = match input.id {
        Some(id) => {
            let changed = tx.execute(
                "UPDATE strategy_versions SET name = ?1, start_date = ?2, status = ?3 WHERE id = ?4",
                params![input.name.trim(), input.start_date, input.status, id],
            )?;
            if changed == 0 {
                return Err(not_found(format!("strategy {}", id)));
            }
            id
        }
        None => {
            tx.execute(
                "INSERT INTO strategy_versions (name, start_date, status) VALUES (?1, ?2, ?3)",
                params![input.name.trim(), input.start_date, input.status],
            )?;
            tx.last_insert_rowid()
        }
    };

    let existing_layers = child_ids(&tx, "SELECT id FROM strategy_layers WHERE version_id = ?1", version_id)?;
    let mut kept_layers = HashSet::new();

    for (order, layer) in input.layers.iter().enumerate() {
        let layer_id = save_layer(&tx, version_id, order as i64, layer, &existing_layers)?;
        kept_layers.insert(layer_id);
    }

    for stale in existing_layers.difference(&kept_layers) {
        tx.execute("DELETE FROM strategy_layers WHERE id = ?1", [stale])?;
    }

    tx.commit().context("Failed to commit strategy save")?;
    info!("Saved strategy version {} ({})", version_id, input.name);
    Ok(version_id)
}

fn save_layer(
    conn: &Connection,
    version_id: i64,
    order: i64,
    layer: &NewLayer,
    existing: &HashSet<i64>,
) -> Result<i64> {
    let layer_id = match layer.id {
        Some(id) => {
            if !existing.contains(&id) {
                return Err(validation(format!(
                    "layer {} does not belong to strategy {}",
                    id, version_id
                )));
            }
            conn.execute(
                "UPDATE strategy_layers SET name = ?1, weight = ?2, sort_order = ?3 WHERE id = ?4",
                params![layer.name.trim(), layer.weight.to_string(), order, id],
            )?;
            id
        }
        None => {
            conn.execute(
                "INSERT INTO strategy_layers (version_id, name, weight, sort_order)
                 VALUES (?1, ?2, ?3, ?4)",
                params![version_id, layer.name.trim(), layer.weight.to_string(), order],
            )?;
            conn.last_insert_rowid()
        }
    };

    let existing_targets = child_ids(conn, "SELECT id FROM strategy_targets WHERE layer_id = ?1", layer_id)?;
    let mut kept = HashSet::new();

    for (target_order, target) in layer.targets.iter().enumerate() {
        let target_id = match target.id {
            Some(id) => {
                if !existing_targets.contains(&id) {
                    return Err(validation(format!(
                        "target {} does not belong to layer {}",
                        id, layer_id
                    )));
                }
                conn.execute(
                    "UPDATE strategy_targets
                     SET asset_id = ?1, display_name = ?2, weight = ?3, sort_order = ?4
                     WHERE id = ?5",
                    params![
                        target.asset_id,
                        target.display_name.trim(),
                        target.weight.to_string(),
                        target_order as i64,
                        id
                    ],
                )?;
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO strategy_targets (layer_id, asset_id, display_name, weight, sort_order)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        layer_id,
                        target.asset_id,
                        target.display_name.trim(),
                        target.weight.to_string(),
                        target_order as i64
                    ],
                )?;
                conn.last_insert_rowid()
            }
        };
        kept.insert(target_id);
    }

    for stale in existing_targets.difference(&kept) {
        conn.execute("DELETE FROM strategy_targets WHERE id = ?1", [stale])?;
    }

    Ok(layer_id)
}

fn child_ids(conn: &Connection, sql: &str, parent: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([parent], |row| row.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn load_layers(conn: &Connection, version_id: i64) -> Result<Vec<Layer>> {
    let mut stmt = conn.prepare(
        "SELECT id, version_id, name, weight, sort_order
         FROM strategy_layers
         WHERE version_id = ?1
         ORDER BY sort_order ASC, id ASC",
    )?;
    let mut layers = stmt
        .query_map([version_id], |row| {
            Ok(Layer {
                id: row.get(0)?,
                version_id: row.get(1)?,
                name: row.get(2)?,
                weight: get_decimal_value(row, 3)?,
                order: row.get(4)?,
                targets: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut target_stmt = conn.prepare(
        "SELECT id, layer_id, asset_id, display_name, weight, sort_order
         FROM strategy_targets
         WHERE layer_id = ?1
         ORDER BY sort_order ASC, id ASC",
    )?;
    for layer in &mut layers {
        layer.targets = target_stmt
            .query_map([layer.id], |row| {
                Ok(Target {
                    id: row.get(0)?,
                    layer_id: row.get(1)?,
                    asset_id: row.get(2)?,
                    display_name: row.get(3)?,
                    weight: get_decimal_value(row, 4)?,
                    order: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }

    Ok(layers)
}

/// Load one strategy version with its layers and targets
pub fn get_strategy(conn: &Connection, id: i64) -> Result<StrategyVersion> {
    let header = conn
        .query_row(
            "SELECT id, name, start_date, status FROM strategy_versions WHERE id = ?1",
            [id],
            |row| {
                Ok(StrategyVersion {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    start_date: row.get(2)?,
                    status: row.get(3)?,
                    layers: Vec::new(),
                })
            },
        )
        .optional()?;

    let mut version = header.ok_or_else(|| not_found(format!("strategy {}", id)))?;
    version.layers = load_layers(conn, id)?;
    Ok(version)
}

/// All strategy versions, ascending by start date
pub fn list_strategies(conn: &Connection) -> Result<Vec<StrategyVersion>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, start_date, status FROM strategy_versions ORDER BY start_date ASC, id ASC",
    )?;
    let mut versions = stmt
        .query_map([], |row| {
            Ok(StrategyVersion {
                id: row.get(0)?,
                name: row.get(1)?,
                start_date: row.get(2)?,
                status: row.get(3)?,
                layers: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for version in &mut versions {
        version.layers = load_layers(conn, version.id)?;
    }
    Ok(versions)
}

/// Delete a strategy version; its layers and targets cascade
pub fn delete_strategy(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    tx.execute(
        "DELETE FROM strategy_targets
         WHERE layer_id IN (SELECT id FROM strategy_layers WHERE version_id = ?1)",
        [id],
    )?;
    tx.execute("DELETE FROM strategy_layers WHERE version_id = ?1", [id])?;
    let changed = tx.execute("DELETE FROM strategy_versions WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(not_found(format!("strategy {}", id)));
    }
    tx.commit()?;
    info!("Deleted strategy version {}", id);
    Ok(())
}
