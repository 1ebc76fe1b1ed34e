//! Shared domain types for Fermata.
//!
//! This crate holds the serde entities that cross crate boundaries: the
//! frozen workflow graph snapshot, execution bookkeeping records (block
//! states, block logs, subflow iteration state), the persisted pause entity,
//! and the error enums used by repository traits. It has no IO dependencies.

pub mod error;
pub mod execution;
pub mod graph;
pub mod pause;
