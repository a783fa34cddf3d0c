use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about = "Snapshot-driven portfolio ledger with allocation strategies")]
#[command(
    long_about = "Record what you hold at chosen dates, reconstruct holdings from the ledger at any date, and compare the portfolio against versioned layered allocation strategies."
)]
pub struct Cli {
    /// Database file (defaults to STRATA_DB, config.toml, then ~/.strata/data.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and schema
    Init,

    /// Asset registry
    Assets {
        #[command(subcommand)]
        action: AssetsCommands,
    },

    /// Price observations
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Save, inspect and remove snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommands,
    },

    /// Versioned allocation strategies
    Strategy {
        #[command(subcommand)]
        action: StrategyCommands,
    },

    /// Metrics, allocation, trend and attribution reports
    Report {
        #[command(subcommand)]
        action: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum AssetsCommands {
    /// Register an asset (security, fund, fixed, wealth, gold, crypto, other)
    Add { category: String, name: String },

    /// List registered assets
    List,

    /// Change an asset's display name
    Rename { id: i64, name: String },

    /// Remove an asset that has no ledger rows
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// List price observations
    List {
        /// Only this asset id
        #[arg(long)]
        asset: Option<i64>,

        /// Only observations on or before this date (YYYY-MM-DD, YYYY-MM, or YYYY)
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Save the state observed on a date from a JSON list of asset deltas
    Save {
        /// Snapshot date (YYYY-MM-DD, YYYY-MM, or YYYY)
        date: String,

        /// JSON file: [{"assetId": 1, "unitPrice": "1.05", "addedQuantity": "0", "addedPrincipal": "0"}]
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        note: Option<String>,
    },

    /// Show one snapshot with its reconstructed holdings
    Show { id: i64 },

    /// List snapshot headers
    List,

    /// Remove a snapshot and the ledger rows it recorded
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum StrategyCommands {
    /// Create or update a strategy version from a JSON file
    Save {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List strategy versions
    List,

    /// Show one strategy version with resolved target weights
    Show { id: i64 },

    /// Show the version in force on a date (default: today)
    Active {
        #[arg(long)]
        at: Option<String>,
    },

    /// Delete a strategy version with its layers and targets
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// End value, invested capital, profit and return for a period
    Metrics {
        /// total or strategy
        #[arg(long, default_value = "total")]
        view: String,

        /// all, ytd or 1y
        #[arg(long, default_value = "all")]
        range: String,

        /// Restrict strategy view to one layer id
        #[arg(long)]
        layer: Option<i64>,
    },

    /// Current allocation by bucket, layer or target
    Allocation {
        #[arg(long, default_value = "total")]
        view: String,

        #[arg(long)]
        layer: Option<i64>,
    },

    /// Value and invested capital at every snapshot date
    Trend {
        #[arg(long, default_value = "total")]
        view: String,

        #[arg(long)]
        layer: Option<i64>,

        /// First date to include (YYYY-MM-DD, YYYY-MM, or YYYY)
        #[arg(long)]
        from: Option<String>,
    },

    /// Profit contribution by bucket, layer or target
    Attribution {
        #[arg(long, default_value = "total")]
        view: String,

        #[arg(long, default_value = "all")]
        range: String,

        #[arg(long)]
        layer: Option<i64>,
    },
}
