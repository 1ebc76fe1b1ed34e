//! Observability: tracing subscriber setup for the fermata binary.

pub mod tracing_setup;
