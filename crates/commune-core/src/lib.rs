//! Storage ports and the document store for Commune.
//!
//! This crate defines the adapter and session "ports" that the infrastructure
//! layer implements, the in-memory adapter used when no database is
//! configured, and the `Store` that owns the record cache. It depends only on
//! `commune-types` -- never on `commune-infra` or any database client crate.

pub mod adapter;
pub mod memory;
pub mod query;
pub mod session;
pub mod store;
