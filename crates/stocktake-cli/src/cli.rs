//! CLI argument definitions for stocktake.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Reconcile local inventory against the source system |
//! | `status` | Show the latest run and the inventory summary |
//! | `runs` | List recent sync runs |
//! | `retire-stuck` | Retire orphaned runs stuck in `running` |
//! | `products` | List locally stored products |
//!
//! Source credentials come from the environment (`STOCKTAKE_SOURCE_URL`,
//! `STOCKTAKE_SOURCE_USER`, `STOCKTAKE_SOURCE_KEY`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use stocktake_core::domain::StockStatus;
use stocktake_engine::SyncStrategy;

/// Inventory reconciliation CLI.
///
/// Pulls product and vendor data from the configured source system,
/// normalizes it, and reconciles it into a local SQLite database.
#[derive(Debug, Parser)]
#[command(
    name = "stocktake",
    author,
    version,
    about = "Inventory reconciliation CLI"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// SQLite database path.
    #[arg(long, global = true, env = "STOCKTAKE_DB", default_value = "stocktake.db")]
    pub db: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object output.
    Json,
    /// Human-oriented key/value text.
    Table,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile local inventory against the source system.
    ///
    /// # Examples
    ///
    ///   stocktake sync
    ///   stocktake sync --strategy full --filter-year 2025
    ///   stocktake sync --strategy critical --dry-run --pretty
    Sync(SyncArgs),

    /// Show the latest sync run and the inventory summary.
    Status,

    /// List recent sync runs, newest first.
    Runs(RunsArgs),

    /// Retire runs stuck in `running` past the age threshold.
    ///
    /// Normally unnecessary: `sync` retires stale runs on its own before
    /// starting. This command exists for operators who want the cleanup
    /// without kicking off a new sync.
    RetireStuck(RetireStuckArgs),

    /// List locally stored products.
    ///
    /// # Examples
    ///
    ///   stocktake products --status critical
    ///   stocktake products --limit 200 --format table
    Products(ProductsArgs),
}

/// Arguments for the `sync` command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Sync strategy. `smart` picks full or inventory from run history.
    #[arg(long, value_enum, default_value_t = SyncStrategy::Smart)]
    pub strategy: SyncStrategy,

    /// Fetch and transform for real, but write nothing.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Only fetch records last modified in this calendar year.
    #[arg(long)]
    pub filter_year: Option<i32>,

    /// Products per upsert transaction.
    #[arg(long, default_value_t = 50)]
    pub batch_size: usize,

    /// Soft wall-clock budget in seconds; checked between batches.
    #[arg(long)]
    pub time_budget_secs: Option<u64>,
}

/// Arguments for the `runs` command.
#[derive(Debug, Args)]
pub struct RunsArgs {
    /// Maximum number of runs to return.
    #[arg(long, default_value_t = 10)]
    pub limit: i64,
}

/// Arguments for the `retire-stuck` command.
#[derive(Debug, Args)]
pub struct RetireStuckArgs {
    /// Age in minutes past which a `running` run counts as stuck.
    #[arg(long, default_value_t = 30)]
    pub max_age_minutes: i64,
}

/// Arguments for the `products` command.
#[derive(Debug, Args)]
pub struct ProductsArgs {
    /// Only products with this stock status.
    #[arg(long, value_enum)]
    pub status: Option<StatusFilter>,

    /// Maximum number of products to return.
    #[arg(long, default_value_t = 50)]
    pub limit: i64,
}

/// Stock-status filter for `products`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Critical,
    Low,
    Adequate,
    Overstocked,
}

impl From<StatusFilter> for StockStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Critical => Self::Critical,
            StatusFilter::Low => Self::Low,
            StatusFilter::Adequate => Self::Adequate,
            StatusFilter::Overstocked => Self::Overstocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_defaults_to_smart_strategy() {
        let cli = Cli::parse_from(["stocktake", "sync"]);
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.strategy, SyncStrategy::Smart);
                assert!(!args.dry_run);
                assert_eq!(args.batch_size, 50);
            }
            _ => panic!("expected the sync command"),
        }
    }

    #[test]
    fn retire_stuck_threshold_defaults_to_thirty_minutes() {
        let cli = Cli::parse_from(["stocktake", "retire-stuck"]);
        match cli.command {
            Command::RetireStuck(args) => assert_eq!(args.max_age_minutes, 30),
            _ => panic!("expected the retire-stuck command"),
        }
    }
}
