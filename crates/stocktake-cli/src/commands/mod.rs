mod products;
mod retire_stuck;
mod runs;
mod status;
mod sync;

use serde_json::Value;
use stocktake_store::{Store, StoreConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command hands back for rendering. `failed` marks a command that
/// completed but reports an unsuccessful outcome (exit code 3).
pub struct CommandOutput {
    pub data: Value,
    pub warnings: Vec<String>,
    pub failed: bool,
}

impl CommandOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            failed: false,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let store = Store::open(StoreConfig {
        db_path: cli.db.clone(),
    })
    .await?;

    match &cli.command {
        Command::Sync(args) => sync::run(args, store).await,
        Command::Status => status::run(store).await,
        Command::Runs(args) => runs::run(args, store).await,
        Command::RetireStuck(args) => retire_stuck::run(args, store).await,
        Command::Products(args) => products::run(args, store).await,
    }
}
