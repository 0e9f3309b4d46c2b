use serde_json::json;
use stocktake_engine::INVENTORY_DOMAIN;
use stocktake_store::{RunRegistry, RunStatus, Store, DEFAULT_STUCK_THRESHOLD};
use time::OffsetDateTime;

use super::CommandOutput;
use crate::error::CliError;

pub async fn run(store: Store) -> Result<CommandOutput, CliError> {
    let registry = RunRegistry::new(&store);
    let latest = registry.latest_run(INVENTORY_DOMAIN).await?;
    let summary = store.inventory_summary().await?;

    let mut warnings = Vec::new();
    if let Some(run) = &latest {
        if run.status == RunStatus::Running {
            let age = run.age(OffsetDateTime::now_utc());
            if age >= DEFAULT_STUCK_THRESHOLD {
                warnings.push(format!(
                    "run {} has been running for {} minutes and looks stuck; \
                     the next sync will retire it, or run 'stocktake retire-stuck'",
                    run.id,
                    age.whole_minutes()
                ));
            }
        }
    }

    let data = json!({
        "latest_run": latest,
        "summary": summary,
    });
    Ok(CommandOutput::ok(data).with_warnings(warnings))
}
