pub mod models;
pub mod processor;
pub mod schema;
pub mod storage;
pub mod utils;

use common::Result;
use common::config::Settings;
use processor::{EtlPipeline, RunSummary, StarCatalog};
use serde_json::Value;
use storage::StoreManager;
use tracing::info;

/// Loads settings from `config_path` and runs one full batch.
pub async fn run_etl_pipeline(config_path: &str) -> Result<RunSummary> {
    let settings = Settings::new(config_path)?;
    info!(config = %config_path, "Starting songplay ETL");

    let pipeline = EtlPipeline::from_settings(&settings)?;
    pipeline.run().await
}

/// Runs `sql` against the tables under the configured output root and
/// returns one JSON object per result row.
pub async fn run_query(config_path: &str, sql: &str) -> Result<Vec<Value>> {
    let settings = Settings::new(config_path)?;
    let output = StoreManager::new(settings.storage.clone()).open(&settings.output_data)?;

    let catalog = StarCatalog::open(output.as_ref()).await?;
    let batches = catalog.sql(sql).await?;
    utils::arrow::batches_to_json(&batches)
}
