//! Observability setup for nanoclaw: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
