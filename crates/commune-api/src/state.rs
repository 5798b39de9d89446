//! Application state shared by the CLI command handlers.
//!
//! Resolves the data directory, loads storage configuration, selects an
//! adapter and runs store setup before any command executes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use commune_core::store::{SetupOptions, Store};
use commune_infra::config::{load_storage_config, resolve_data_dir};
use commune_infra::open_store;
use commune_types::config::DatabaseSolution;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub data_dir: PathBuf,
    /// Backend named by configuration, even when it could not be created.
    pub solution: Option<DatabaseSolution>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_storage_config(&data_dir).await;

        let store = open_store(&config);
        store
            .setup(SetupOptions {
                prefetch_documents: config.prefetch_documents,
            })
            .await
            .with_context(|| format!("failed to set up {} storage", store.adapter_name()))?;

        Ok(Self {
            store: Arc::new(store),
            data_dir,
            solution: config.solution,
        })
    }

    /// Tear down the adapter; called once after the command finishes.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.store.teardown().await?;
        Ok(())
    }
}
