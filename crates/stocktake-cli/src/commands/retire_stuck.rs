use serde_json::json;
use stocktake_engine::INVENTORY_DOMAIN;
use stocktake_store::{RunRegistry, Store};
use time::Duration;

use super::CommandOutput;
use crate::cli::RetireStuckArgs;
use crate::error::CliError;

pub async fn run(args: &RetireStuckArgs, store: Store) -> Result<CommandOutput, CliError> {
    let registry = RunRegistry::new(&store);
    let stuck = registry
        .find_stuck_runs(INVENTORY_DOMAIN, Duration::minutes(args.max_age_minutes))
        .await?;

    let mut retired = Vec::with_capacity(stuck.len());
    for run in &stuck {
        registry.retire_stuck(run).await?;
        retired.push(run.id);
    }

    Ok(CommandOutput::ok(json!({
        "retired": retired.len(),
        "run_ids": retired,
    })))
}
