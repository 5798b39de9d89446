//! Adapter selection -- wires concrete adapters in priority order.
//!
//! This module lives in `commune-infra` because it assembles concrete
//! adapter implementations. The chosen adapter is handed to `Store` in
//! `commune-core` behind the `BoxAdapter` abstraction.
//!
//! Chain order: `[configured backend, in-memory]`. Each factory either
//! yields an adapter or is skipped with a warning; the in-memory factory
//! always succeeds, so selection never fails.

use commune_core::adapter::BoxAdapter;
use commune_core::memory::InMemoryAdapter;
use commune_core::store::Store;
use commune_types::config::{DatabaseSolution, StorageConfig};

use crate::couch::CouchAdapter;
use crate::mongo::MongoAdapter;
use crate::postgres::PostgresAdapter;
use crate::raven::RavenAdapter;

/// One attempt at building an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFactory {
    Database(DatabaseSolution),
    InMemory,
}

impl AdapterFactory {
    fn name(&self) -> &'static str {
        match self {
            AdapterFactory::Database(solution) => solution.name(),
            AdapterFactory::InMemory => InMemoryAdapter::NAME,
        }
    }

    fn build(&self, config: &StorageConfig) -> Option<BoxAdapter> {
        match self {
            AdapterFactory::Database(solution) => {
                let settings = config.settings(*solution);
                match solution {
                    DatabaseSolution::Mongodb => MongoAdapter::try_create(settings).map(BoxAdapter::new),
                    DatabaseSolution::Couchdb => CouchAdapter::try_create(settings).map(BoxAdapter::new),
                    DatabaseSolution::Ravendb => RavenAdapter::try_create(settings).map(BoxAdapter::new),
                    DatabaseSolution::Postgres => {
                        PostgresAdapter::try_create(settings).map(BoxAdapter::new)
                    }
                }
            }
            AdapterFactory::InMemory => Some(BoxAdapter::new(InMemoryAdapter::new())),
        }
    }
}

/// Factories to try, highest priority first.
pub fn factory_chain(config: &StorageConfig) -> Vec<AdapterFactory> {
    let mut chain = Vec::new();
    if let Some(solution) = config.solution {
        chain.push(AdapterFactory::Database(solution));
    }
    chain.push(AdapterFactory::InMemory);
    chain
}

/// Pick the first adapter the chain can build.
pub fn select_adapter(config: &StorageConfig) -> BoxAdapter {
    factory_chain(config)
        .into_iter()
        .fold(None, |selected: Option<BoxAdapter>, factory| {
            selected.or_else(|| {
                let adapter = factory.build(config);
                if adapter.is_none() {
                    tracing::warn!(adapter = factory.name(), "adapter could not be created, trying next");
                }
                adapter
            })
        })
        .unwrap_or_else(|| BoxAdapter::new(InMemoryAdapter::new()))
}

/// A store over the selected adapter. Call `Store::setup` before use.
pub fn open_store(config: &StorageConfig) -> Store {
    let adapter = select_adapter(config);
    tracing::info!(adapter = adapter.name(), "storage adapter selected");
    Store::new(adapter)
}
