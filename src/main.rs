//! Order API server
//!
//! Configuration comes from `ORDER_API_CONFIG` (a single-environment YAML
//! file, or a multi-environment file when `ORDER_API_ENV` names the
//! environment) and falls back to the built-in defaults. `ORDER_API_*`
//! variables override individual settings.

use anyhow::Result;
use order_api::config::{AppConfig, ConfigFile};
use order_api::prelude::*;
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<AppConfig> {
    let config = match (
        std::env::var("ORDER_API_CONFIG").ok(),
        std::env::var("ORDER_API_ENV").ok(),
    ) {
        (Some(path), Some(environment)) => {
            ConfigFile::from_yaml_file(&path)?.select(&environment)?
        }
        (Some(path), None) => AppConfig::from_yaml_file(&path)?,
        (None, _) => AppConfig::default_config(),
    };

    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(load_config()?);
    let builder = ServerBuilder::new().with_timeout(config.backend_timeout());

    let builder = if config.in_memory {
        tracing::warn!("running with in-memory backends, nothing is persisted");
        builder
            .with_store(InMemoryOrderStore::new())
            .with_index(InMemoryOrderIndex::new())
    } else {
        let store = MongoOrderStore::connect(
            &config.store.connection,
            &config.store.database,
            &config.store.collection,
        )
        .await?;
        if let Err(e) = store.ensure_indexes().await {
            tracing::warn!(error = %e, "could not create store indexes");
        }

        let index = ElasticOrderIndex::new(&config.index.addresses, &config.index.index_name)?
            .with_refresh(config.index.refresh);
        if let Err(e) = index.ensure_index().await {
            tracing::warn!(error = %e, "could not prepare search index");
        }

        tracing::info!(
            database = %config.store.database,
            collection = %config.store.collection,
            index = %config.index.index_name,
            "backends configured"
        );
        builder.with_store(store).with_index(index)
    };

    builder.serve(&config.server.address()).await
}
