//! Pause/resume execution engine for Fermata.
//!
//! This crate is the "brain" of the system:
//! - `context` -- the mutable state of one in-progress graph execution
//! - `codec` -- durable serialization of the context (sets as arrays, maps
//!   as ordered pairs), isolated here so no other component sees the dual
//!   representation
//! - `reachability` -- the single forward-closure function that rebuilds the
//!   active execution path on resume
//! - `executor` -- graph traversal with the wait-block pause touchpoints
//! - `resume` -- the coordinator invoked by every resume trigger
//! - `repository` -- storage "ports" (pause store, wait registry, run sink)
//!   implemented by fermata-infra
//!
//! It depends only on `fermata-types` -- never on any database/IO crate.

pub mod codec;
pub mod context;
pub mod executor;
pub mod reachability;
pub mod repository;
pub mod resume;
