//! Shared domain types for Commune.
//!
//! Collection tags, the composite identity scheme, record models, the
//! `Document` tagged variant, storage configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, secrecy, thiserror.

pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod model;
pub mod records;
