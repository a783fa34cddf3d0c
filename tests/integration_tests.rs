//! Integration tests for the ledger, snapshot cache and strategy store
//!
//! These tests run the library against a temporary SQLite file:
//! - Holdings additivity across dates
//! - Last-value-carried-forward pricing
//! - Idempotent snapshot re-saves and refresh of later snapshots
//! - Strategy resolution, auto weights and cascading deletes


use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlite_helpers::*;
use strata::db::{self, AssetCategory, Transaction, TransactionType, AUTO_WEIGHT};
use strata::error::{ErrorClass, PortfolioError};
use strata::holdings;
use strata::reports::{self, TimeRange, ViewMode};
use strata::snapshots;
use strata::strategy;
use strata::utils::parse_flexible_date;

#[test]
fn test_holdings_are_additive_between_dates() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let fund = add_asset(&conn, AssetCategory::Fund, "Index Fund");

    snapshots::save(&mut conn, d("2024-01-31"), &[delta(fund, None, dec!(10), dec!(100))], None)?;
    snapshots::save(&mut conn, d("2024-02-29"), &[delta(fund, None, dec!(5), dec!(60))], None)?;
    snapshots::save(&mut conn, d("2024-03-31"), &[delta(fund, None, dec!(-3), dec!(-30))], None)?;

    let jan = holdings::holdings_at(&conn, fund, d("2024-01-31"))?;
    let mid_feb = holdings::holdings_at(&conn, fund, d("2024-02-15"))?;
    let mar = holdings::holdings_at(&conn, fund, d("2024-03-31"))?;

    assert_eq!(jan.quantity, dec!(10));
    assert_eq!(mid_feb.quantity, dec!(10));
    // Sum of changes in (jan, mar] is 5 - 3
    assert_eq!(mar.quantity - jan.quantity, dec!(2));
    assert_eq!(mar.total_cost - jan.total_cost, dec!(30));

    let before = holdings::holdings_at(&conn, fund, d("2023-12-31"))?;
    assert_eq!(before.quantity, Decimal::ZERO);
    Ok(())
}

#[test]
fn test_price_lookup_carries_last_value_forward() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let stock = add_asset(&conn, AssetCategory::Security, "ACME");
    db::upsert_price(&conn, stock, d("2024-01-01"), dec!(10))?;
    db::upsert_price(&conn, stock, d("2024-03-01"), dec!(12))?;

    let price = |date: &str| holdings::price_at(&conn, stock, d(date), AssetCategory::Security);
    assert_eq!(price("2024-02-15")?, dec!(10));
    assert_eq!(price("2024-03-01")?, dec!(12));
    assert_eq!(price("2025-01-01")?, dec!(12));
    // Never a future price; non-cash assets default to zero
    assert_eq!(price("2023-12-31")?, Decimal::ZERO);

    db::insert_transaction(
        &conn,
        &Transaction {
            id: None,
            asset_id: stock,
            trade_date: d("2024-01-15"),
            transaction_type: TransactionType::Buy,
            quantity_change: dec!(3),
            cost_change: dec!(27),
            snapshot_id: None,
        },
    )?;
    let valuation = holdings::valuation_at(&conn, stock, d("2024-02-15"))?;
    assert_eq!(valuation.unit_price, dec!(10));
    assert_eq!(valuation.market_value, dec!(30));
    assert_eq!(valuation.total_cost, dec!(27));
    Ok(())
}

#[test]
fn test_resaving_a_date_is_idempotent() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let fund = add_asset(&conn, AssetCategory::Fund, "Bond Fund");
    let cash = add_asset(&conn, AssetCategory::Wealth, "Savings");
    let deltas = vec![
        delta(fund, Some(dec!(2.5)), dec!(40), dec!(90)),
        delta(cash, None, dec!(500), dec!(500)),
    ];

    let first = snapshots::save(&mut conn, d("2024-05-31"), &deltas, Some("May"))?;
    let header_before = db::get_snapshot(&conn, first)?.expect("header");
    let tagged_before = count_tagged_transactions(&conn, first)?;

    let second = snapshots::save(&mut conn, d("2024-05-31"), &deltas, Some("May"))?;
    let header_after = db::get_snapshot(&conn, second)?.expect("header");

    assert_eq!(first, second);
    assert_eq!(tagged_before, 2);
    assert_eq!(count_tagged_transactions(&conn, second)?, tagged_before);
    assert_eq!(header_before, header_after);
    assert_eq!(header_after.total_value, dec!(600));
    assert_eq!(header_after.total_invested, dec!(590));
    assert_eq!(holdings::holdings_at(&conn, fund, d("2024-05-31"))?.quantity, dec!(40));
    Ok(())
}

#[test]
fn test_back_dated_save_refreshes_later_snapshots() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let cash = add_asset(&conn, AssetCategory::Fixed, "Deposit");

    snapshots::save(&mut conn, d("2024-01-31"), &[delta(cash, None, dec!(100), dec!(100))], None)?;
    let march = snapshots::save(&mut conn, d("2024-03-31"), &[], None)?;
    assert_eq!(db::get_snapshot(&conn, march)?.expect("march").total_value, dec!(100));

    snapshots::save(&mut conn, d("2024-02-29"), &[delta(cash, None, dec!(50), dec!(50))], None)?;

    let refreshed = db::get_snapshot(&conn, march)?.expect("march");
    assert_eq!(refreshed.total_value, dec!(150));
    assert_eq!(refreshed.total_invested, dec!(150));
    Ok(())
}

#[test]
fn test_deleting_a_snapshot_keeps_prices_and_refreshes_later() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let stock = add_asset(&conn, AssetCategory::Security, "ACME");

    snapshots::save(&mut conn, d("2024-01-31"), &[delta(stock, Some(dec!(10)), dec!(10), dec!(100))], None)?;
    let feb = snapshots::save(&mut conn, d("2024-02-29"), &[delta(stock, Some(dec!(11)), dec!(5), dec!(55))], None)?;
    let mar = snapshots::save(&mut conn, d("2024-03-31"), &[], None)?;
    assert_eq!(db::get_snapshot(&conn, mar)?.expect("mar").total_value, dec!(165));

    snapshots::delete(&mut conn, feb)?;

    assert!(db::get_snapshot(&conn, feb)?.is_none());
    assert_eq!(count_tagged_transactions(&conn, feb)?, 0);
    assert_eq!(db::list_prices(&conn, Some(stock), None)?.len(), 2);
    // 10 units at the February price carried forward
    assert_eq!(db::get_snapshot(&conn, mar)?.expect("mar").total_value, dec!(110));

    let err = snapshots::delete(&mut conn, feb).unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::NotFound);
    Ok(())
}

#[test]
fn test_save_rejects_bad_input_without_side_effects() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let stock = add_asset(&conn, AssetCategory::Security, "ACME");

    let err = snapshots::save(&mut conn, d("2024-01-31"), &[delta(999, None, dec!(1), dec!(1))], None)
        .unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);

    let err = snapshots::save(&mut conn, d("2024-01-31"), &[delta(stock, Some(dec!(-1)), dec!(1), dec!(1))], None)
        .unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);

    let err = parse_flexible_date("2024-13").unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);

    assert_eq!(count_rows(&conn, "snapshots")?, 0);
    assert_eq!(count_rows(&conn, "transactions")?, 0);
    Ok(())
}

#[test]
fn test_snapshot_details_show_holdings_and_deltas() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let stock = add_asset(&conn, AssetCategory::Security, "ACME");
    let cash = add_asset(&conn, AssetCategory::Wealth, "Savings");

    snapshots::save(&mut conn, d("2024-01-31"), &[delta(stock, Some(dec!(10)), dec!(10), dec!(100))], None)?;
    let feb = snapshots::save(
        &mut conn,
        d("2024-02-29"),
        &[
            delta(stock, None, dec!(-10), dec!(-100)),
            delta(cash, None, dec!(120), dec!(120)),
        ],
        Some("sold ACME"),
    )?;

    let details = snapshots::details(&conn, feb)?;
    assert_eq!(details.snapshot.note.as_deref(), Some("sold ACME"));
    assert_eq!(details.assets.len(), 2);

    let closed = &details.assets[0];
    assert_eq!(closed.asset.id, stock);
    assert_eq!(closed.quantity, Decimal::ZERO);
    assert_eq!(closed.added_quantity, dec!(-10));

    let savings = &details.assets[1];
    assert_eq!(savings.unit_price, Decimal::ONE);
    assert_eq!(savings.market_value, dec!(120));

    let err = snapshots::details(&conn, 42).unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::NotFound);
    Ok(())
}

#[test]
fn test_auto_weights_split_the_remainder() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let a = add_asset(&conn, AssetCategory::Fund, "A");
    let b = add_asset(&conn, AssetCategory::Fund, "B");
    let c = add_asset(&conn, AssetCategory::Fund, "C");
    let e = add_asset(&conn, AssetCategory::Fund, "E");

    let id = db::save_strategy(
        &mut conn,
        &version(
            "Growth",
            "2024-01-01",
            vec![layer(
                "Core",
                dec!(100),
                vec![
                    target(a, "A", dec!(40)),
                    target(b, "B", dec!(20)),
                    target(c, "C", AUTO_WEIGHT),
                    target(e, "E", AUTO_WEIGHT),
                ],
            )],
        ),
    )?;

    let saved = db::get_strategy(&conn, id)?;
    let weights: Vec<Decimal> = strategy::resolve_target_weights(&saved.layers[0])
        .into_iter()
        .map(|(_, w)| w)
        .collect();
    assert_eq!(weights, vec![dec!(40), dec!(20), dec!(20), dec!(20)]);
    Ok(())
}

#[test]
fn test_active_strategy_falls_back_to_oldest() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let first = db::save_strategy(&mut conn, &version("2023 plan", "2023-01-01", vec![]))?;
    let second = db::save_strategy(&mut conn, &version("2024 plan", "2024-01-01", vec![]))?;

    let at = |date: &str| strategy::active_strategy_at(&conn, d(date)).map(|v| v.map(|v| v.id));
    assert_eq!(at("2023-06-01")?, Some(first));
    assert_eq!(at("2022-01-01")?, Some(first));
    assert_eq!(at("2024-01-01")?, Some(second));
    assert_eq!(at("2030-01-01")?, Some(second));
    Ok(())
}

#[test]
fn test_strategy_update_preserves_ids_and_drops_missing_items() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let a = add_asset(&conn, AssetCategory::Fund, "A");
    let b = add_asset(&conn, AssetCategory::Gold, "B");

    let id = db::save_strategy(
        &mut conn,
        &version(
            "Plan",
            "2024-01-01",
            vec![
                layer("Core", dec!(70), vec![target(a, "A", AUTO_WEIGHT)]),
                layer("Satellite", dec!(30), vec![target(b, "B", dec!(100))]),
            ],
        ),
    )?;
    let saved = db::get_strategy(&conn, id)?;
    let core_id = saved.layers[0].id;
    let core_target = saved.layers[0].targets[0].id;

    let mut edit = version("Plan v2", "2024-01-01", vec![]);
    edit.id = Some(id);
    let mut core = layer("Core", dec!(100), vec![target(a, "A", AUTO_WEIGHT)]);
    core.id = Some(core_id);
    core.targets[0].id = Some(core_target);
    edit.layers = vec![core];
    db::save_strategy(&mut conn, &edit)?;

    let updated = db::get_strategy(&conn, id)?;
    assert_eq!(updated.name, "Plan v2");
    assert_eq!(updated.layers.len(), 1);
    assert_eq!(updated.layers[0].id, core_id);
    assert_eq!(updated.layers[0].targets[0].id, core_target);
    assert_eq!(count_rows(&conn, "strategy_targets")?, 1);

    let mut foreign = version("Other", "2025-01-01", vec![layer("X", dec!(10), vec![])]);
    foreign.layers[0].id = Some(core_id);
    let err = db::save_strategy(&mut conn, &foreign).unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);

    let bad_weight = version("Bad", "2025-01-01", vec![layer("X", dec!(101), vec![])]);
    let err = db::save_strategy(&mut conn, &bad_weight).unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);
    Ok(())
}

#[test]
fn test_end_to_end_fixed_asset_profit() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let deposit = add_asset(&conn, AssetCategory::Fixed, "A");

    let jan = snapshots::save(
        &mut conn,
        parse_flexible_date("2024-01")?,
        &[delta(deposit, None, dec!(100), dec!(100))],
        None,
    )?;
    let details = snapshots::details(&conn, jan)?;
    assert_eq!(details.snapshot.date, d("2024-01-31"));
    assert_eq!(details.assets[0].unit_price, Decimal::ONE);
    assert_eq!(details.assets[0].market_value, dec!(100));

    snapshots::save(
        &mut conn,
        parse_flexible_date("2024-02")?,
        &[delta(deposit, Some(dec!(1.05)), Decimal::ZERO, Decimal::ZERO)],
        None,
    )?;

    let metrics = reports::metrics(&conn, ViewMode::Total, TimeRange::All, None, d("2024-03-15"))?;
    assert_eq!(metrics.end_value, dec!(105));
    assert_eq!(metrics.end_invested, dec!(100));
    assert_eq!(metrics.profit, dec!(5));
    assert_eq!(metrics.return_rate, dec!(5));
    assert_eq!(metrics.period_label, "All time");
    Ok(())
}

#[test]
fn test_deleting_strategy_cascades_and_keeps_reports_working() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let a = add_asset(&conn, AssetCategory::Fund, "A");
    let b = add_asset(&conn, AssetCategory::Security, "B");

    snapshots::save(
        &mut conn,
        d("2024-01-31"),
        &[
            delta(a, Some(dec!(1)), dec!(600), dec!(600)),
            delta(b, Some(dec!(1)), dec!(400), dec!(400)),
        ],
        None,
    )?;

    let old = db::save_strategy(
        &mut conn,
        &version("Old", "2023-01-01", vec![layer("All", dec!(100), vec![target(a, "A", AUTO_WEIGHT)])]),
    )?;
    let new = db::save_strategy(
        &mut conn,
        &version(
            "New",
            "2024-01-01",
            vec![layer(
                "All",
                dec!(100),
                vec![target(a, "A", dec!(50)), target(b, "B", dec!(50))],
            )],
        ),
    )?;
    assert_eq!(count_rows(&conn, "strategy_targets")?, 3);

    db::delete_strategy(&mut conn, new)?;
    assert_eq!(count_rows(&conn, "strategy_layers")?, 1);
    assert_eq!(count_rows(&conn, "strategy_targets")?, 1);

    let err = db::get_strategy(&conn, new).unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::NotFound);

    // The older version now governs the January snapshot
    let entries = reports::allocation(&conn, ViewMode::Strategy, None, d("2024-06-30"))?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, dec!(600));
    assert_eq!(entries[0].percent, dec!(100));

    db::delete_strategy(&mut conn, old)?;
    assert!(reports::allocation(&conn, ViewMode::Strategy, None, d("2024-06-30"))?.is_empty());
    Ok(())
}

#[test]
fn test_asset_registry_refuses_removing_referenced_assets() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let used = add_asset(&conn, AssetCategory::Crypto, "BTC");
    let unused = add_asset(&conn, AssetCategory::Gold, "Bar");
    snapshots::save(&mut conn, d("2024-01-31"), &[delta(used, Some(dec!(40000)), dec!(0.5), dec!(20000))], None)?;

    let err = db::delete_asset(&conn, used).unwrap_err();
    assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);

    db::update_asset(&conn, unused, AssetCategory::Gold, "Gold bar")?;
    assert_eq!(db::get_asset(&conn, unused)?.expect("asset").name, "Gold bar");
    db::delete_asset(&conn, unused)?;
    assert!(db::get_asset(&conn, unused)?.is_none());
    Ok(())
}
