//! Observability setup for Commune: structured logging via
//! `tracing-subscriber`, optionally bridged to OpenTelemetry.

pub mod tracing_setup;
