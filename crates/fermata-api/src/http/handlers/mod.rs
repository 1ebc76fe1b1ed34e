//! REST API request handlers, grouped by resource.

pub mod execution;
pub mod webhook;
pub mod workflow;
