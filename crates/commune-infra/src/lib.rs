//! Infrastructure layer for Commune.
//!
//! Contains implementations of the adapter and session traits defined in
//! `commune-core`: MongoDB, CouchDB (HTTP), RavenDB (REST) and PostgreSQL
//! (JSONB tables), plus configuration loading and adapter selection.

pub mod chain;
pub mod config;
pub mod couch;
pub mod endpoint;
mod http;
pub mod mongo;
pub mod postgres;
pub mod raven;

pub use chain::{open_store, select_adapter};
