use std::sync::Arc;

use stocktake_core::adapter::HttpInventorySource;
use stocktake_core::cache::CacheStore;
use stocktake_core::config::SourceConfig;
use stocktake_core::http_client::{HttpClient, ReqwestHttpClient};
use stocktake_engine::{EngineConfig, ReconciliationEngine, SyncOptions};
use stocktake_store::{RunStatus, Store};

use super::CommandOutput;
use crate::cli::SyncArgs;
use crate::error::CliError;

pub async fn run(args: &SyncArgs, store: Store) -> Result<CommandOutput, CliError> {
    let source_config = SourceConfig::from_env()?;
    let transport: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let source = Arc::new(HttpInventorySource::new(&source_config, transport));

    let engine = ReconciliationEngine::new(
        source,
        store,
        CacheStore::with_default_ttl(),
        EngineConfig {
            batch_size: args.batch_size,
            time_budget: args.time_budget_secs.map(std::time::Duration::from_secs),
            ..EngineConfig::default()
        },
    );

    let report = engine
        .run(
            args.strategy,
            SyncOptions {
                dry_run: args.dry_run,
                filter_year: args.filter_year,
                trigger: String::from("cli"),
            },
        )
        .await?;

    let failed = report.status == RunStatus::Error;
    let warnings = if report.status == RunStatus::Partial {
        report.errors.clone()
    } else {
        Vec::new()
    };

    let output = CommandOutput::ok(serde_json::to_value(&report)?).with_warnings(warnings);
    Ok(if failed { output.failed() } else { output })
}
