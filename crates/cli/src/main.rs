mod cli;
mod query;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use wharf_warehouse::{ExecutionMode, QueryRunner, RestWarehouse, WarehouseConfig};

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mode = match args.mode.as_str() {
        "sync" => ExecutionMode::Sync,
        "async" => ExecutionMode::Async,
        other => bail!("unknown mode '{other}' (expected 'sync' or 'async')"),
    };

    let mut config = WarehouseConfig::from_env();
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(project) = args.project {
        config.project = project;
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }

    let (sql, params) = query::word_count_query(
        &args.table,
        &args.corpus,
        args.min_word_count,
        args.use_named_params,
    );

    let warehouse = Arc::new(RestWarehouse::new(config.clone()));
    let runner = QueryRunner::from_config(warehouse, &config);

    info!(
        corpus = %args.corpus,
        min_word_count = args.min_word_count,
        named = args.use_named_params,
        "running word-count query"
    );

    let mut rows = runner
        .run(&sql, params, mode)
        .await
        .context("query failed")?;

    while let Some(row) = rows.next().await.context("failed to fetch results")? {
        println!("{row}");
    }

    Ok(())
}
