use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Asset categories supported by the system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Security, // Listed stocks and ETFs
    Fund,     // Mutual funds
    Fixed,    // Deposits, bonds held at par
    Wealth,   // Bank wealth-management products
    Gold,
    Crypto,
    Other,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Security => "security",
            AssetCategory::Fund => "fund",
            AssetCategory::Fixed => "fixed",
            AssetCategory::Wealth => "wealth",
            AssetCategory::Gold => "gold",
            AssetCategory::Crypto => "crypto",
            AssetCategory::Other => "other",
        }
    }

    /// Cash-like categories are valued at 1.0 per unit until a price is observed
    pub fn is_cash_like(&self) -> bool {
        matches!(self, AssetCategory::Fixed | AssetCategory::Wealth)
    }
}

impl FromStr for AssetCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "security" | "stock" => Ok(AssetCategory::Security),
            "fund" => Ok(AssetCategory::Fund),
            "fixed" => Ok(AssetCategory::Fixed),
            "wealth" => Ok(AssetCategory::Wealth),
            "gold" => Ok(AssetCategory::Gold),
            "crypto" => Ok(AssetCategory::Crypto),
            "other" => Ok(AssetCategory::Other),
            _ => Err(()),
        }
    }
}

/// Asset (immutable identity; the category drives pricing and grouping)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: i64,
    pub category: AssetCategory,
    pub name: String,
}

impl Asset {
    /// Stand-in for an asset id that has ledger rows but no asset record
    pub fn placeholder(id: i64) -> Self {
        Self {
            id,
            category: AssetCategory::Other,
            name: "Unknown".to_string(),
        }
    }
}

/// Transaction type. Only adjustments are written by snapshot saves; the
/// column exists so imported buys and sells can share the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionType {
    Adjustment,
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            _ => Err(()),
        }
    }
}

/// Ledger event: signed quantity and cost deltas for one asset on one date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Option<i64>,
    pub asset_id: i64,
    pub trade_date: NaiveDate,
    pub transaction_type: TransactionType,
    pub quantity_change: Decimal,
    pub cost_change: Decimal,
    pub snapshot_id: Option<i64>,
}

/// One price observation; at most one per (asset, date)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub asset_id: i64,
    pub price_date: NaiveDate,
    pub price: Decimal,
}

/// Snapshot header with cached totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: i64,
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub note: Option<String>,
}

/// Weight value reserved for targets that take an even share of the remainder
pub const AUTO_WEIGHT: Decimal = Decimal::NEGATIVE_ONE;

/// Dated strategy configuration with its layers in stored order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyVersion {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub status: String,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: i64,
    pub version_id: i64,
    pub name: String,
    /// Share of the whole portfolio, 0-100
    pub weight: Decimal,
    pub order: i64,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: i64,
    pub layer_id: i64,
    pub asset_id: i64,
    pub display_name: String,
    /// Share within the layer, 0-100, or `AUTO_WEIGHT`
    pub weight: Decimal,
    pub order: i64,
}

impl Target {
    pub fn is_auto(&self) -> bool {
        self.weight == AUTO_WEIGHT
    }
}

/// Input for creating or updating a strategy version.
/// Items carrying an id keep it; items without one get a fresh id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewStrategyVersion {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub layers: Vec<NewLayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewLayer {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub weight: Decimal,
    #[serde(default)]
    pub targets: Vec<NewTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTarget {
    #[serde(default)]
    pub id: Option<i64>,
    pub asset_id: i64,
    pub display_name: String,
    pub weight: Decimal,
}

fn default_status() -> String {
    "active".to_string()
}
