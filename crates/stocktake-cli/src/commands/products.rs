use serde_json::json;
use stocktake_store::Store;

use super::CommandOutput;
use crate::cli::ProductsArgs;
use crate::error::CliError;

pub async fn run(args: &ProductsArgs, store: Store) -> Result<CommandOutput, CliError> {
    let products = store
        .list_products(args.status.map(Into::into), args.limit)
        .await?;
    Ok(CommandOutput::ok(json!({
        "count": products.len(),
        "products": products,
    })))
}
