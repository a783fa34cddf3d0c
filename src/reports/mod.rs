// Reports module - metrics, allocation, trend and attribution over snapshots

pub mod allocation;
pub mod attribution;
pub mod metrics;
pub mod trend;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::db::{AssetCategory, Snapshot, StrategyVersion};
use crate::holdings::Valuation;
use crate::strategy::{self, Placement};

pub use allocation::{allocation, AllocationEntry};
pub use attribution::{attribution, AttributionEntry};
pub use metrics::{metrics, Metrics};
pub use trend::{trend, TrendPoint};

/// Whole portfolio, or only the assets the strategy in force places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Total,
    Strategy,
}

impl FromStr for ViewMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" => Ok(ViewMode::Total),
            "strategy" => Ok(ViewMode::Strategy),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "ytd")]
    Ytd,
    #[serde(rename = "1y")]
    OneYear,
}

impl TimeRange {
    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::All => "All time",
            TimeRange::Ytd => "Year to date",
            TimeRange::OneYear => "Last 12 months",
        }
    }
}

impl FromStr for TimeRange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TimeRange::All),
            "ytd" => Ok(TimeRange::Ytd),
            "1y" => Ok(TimeRange::OneYear),
            _ => Err(()),
        }
    }
}

/// Start and end snapshots of a reporting period.
/// `start == None` means a zero baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub start: Option<Snapshot>,
    pub end: Option<Snapshot>,
}

/// Pick the period endpoints from snapshots sorted ascending by date.
///
/// The end is always the latest snapshot. `ytd` starts at the first snapshot
/// of `today`'s year, stepping back one snapshot when that would make the
/// period empty; `1y` starts at the first snapshot on or after one year ago.
/// When no snapshot falls in the window the period collapses onto the end.
pub fn select_period(snapshots: &[Snapshot], range: TimeRange, today: NaiveDate) -> Period {
    let Some(end) = snapshots.last() else {
        return Period { start: None, end: None };
    };

    let start = match range {
        TimeRange::All => None,
        TimeRange::Ytd => {
            match snapshots.iter().position(|s| s.date.year() == today.year()) {
                Some(idx) if snapshots[idx].id == end.id && idx > 0 => {
                    Some(snapshots[idx - 1].clone())
                }
                Some(idx) => Some(snapshots[idx].clone()),
                None => Some(end.clone()),
            }
        }
        TimeRange::OneYear => {
            let cutoff = today.checked_sub_months(Months::new(12)).unwrap_or(today);
            snapshots
                .iter()
                .find(|s| s.date >= cutoff)
                .cloned()
                .or_else(|| Some(end.clone()))
        }
    };

    Period {
        start,
        end: Some(end.clone()),
    }
}

/// Fixed grouping of asset categories used by total-mode reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    EquityLike,
    CashLike,
    Alternative,
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::EquityLike,
        Bucket::CashLike,
        Bucket::Alternative,
        Bucket::Other,
    ];

    /// Categories without an explicit bucket land in `Other`, never dropped
    pub fn of(category: AssetCategory) -> Self {
        match category {
            AssetCategory::Security | AssetCategory::Fund => Bucket::EquityLike,
            AssetCategory::Fixed | AssetCategory::Wealth => Bucket::CashLike,
            AssetCategory::Gold | AssetCategory::Crypto => Bucket::Alternative,
            AssetCategory::Other => Bucket::Other,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Bucket::EquityLike => "equity-like",
            Bucket::CashLike => "cash-like",
            Bucket::Alternative => "alternative",
            Bucket::Other => "other",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Bucket::EquityLike => "Equity-like",
            Bucket::CashLike => "Cash-like",
            Bucket::Alternative => "Alternative",
            Bucket::Other => "Other",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Bucket::EquityLike => "#ef4444",
            Bucket::CashLike => "#3b82f6",
            Bucket::Alternative => "#f59e0b",
            Bucket::Other => "#9ca3af",
        }
    }
}

const PALETTE: [&str; 8] = [
    "#6366f1", "#10b981", "#f97316", "#ec4899", "#14b8a6", "#eab308", "#8b5cf6", "#64748b",
];

/// Colour for the n-th layer or target
pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// `part` as a percentage of `whole`, zero when `whole` is not positive
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole > Decimal::ZERO {
        part / whole * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Keep only valuations placed by the strategy, optionally inside one layer,
/// paired with their placement.
pub(crate) fn place<'a>(
    portfolio: &'a [Valuation],
    map: &'a HashMap<i64, Placement>,
    layer_id: Option<i64>,
) -> impl Iterator<Item = (&'a Valuation, &'a Placement)> + 'a {
    portfolio.iter().filter_map(move |v| {
        let placement = map.get(&v.asset.id)?;
        match layer_id {
            Some(id) if placement.layer.id != id => None,
            _ => Some((v, placement)),
        }
    })
}

/// Sum of market value and cost of a filtered portfolio for one view
pub(crate) fn scoped_totals(
    portfolio: &[Valuation],
    view: ViewMode,
    strategy: Option<&StrategyVersion>,
    layer_id: Option<i64>,
) -> (Decimal, Decimal) {
    match view {
        ViewMode::Total => crate::holdings::totals(portfolio),
        ViewMode::Strategy => {
            let Some(strategy) = strategy else {
                return (Decimal::ZERO, Decimal::ZERO);
            };
            let map = strategy::asset_map(strategy);
            place(portfolio, &map, layer_id).fold(
                (Decimal::ZERO, Decimal::ZERO),
                |(value, cost), (v, _)| (value + v.market_value, cost + v.total_cost),
            )
        }
    }
}
