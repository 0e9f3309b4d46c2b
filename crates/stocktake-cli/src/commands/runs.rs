use serde_json::json;
use stocktake_engine::INVENTORY_DOMAIN;
use stocktake_store::{RunRegistry, Store};

use super::CommandOutput;
use crate::cli::RunsArgs;
use crate::error::CliError;

pub async fn run(args: &RunsArgs, store: Store) -> Result<CommandOutput, CliError> {
    let registry = RunRegistry::new(&store);
    let runs = registry.recent_runs(INVENTORY_DOMAIN, args.limit).await?;
    Ok(CommandOutput::ok(json!({ "runs": runs })))
}
