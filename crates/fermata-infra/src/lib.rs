//! Infrastructure layer for Fermata.
//!
//! Contains implementations of the repository traits defined in
//! `fermata-core`: the SQLite pause store and wait registry, the in-memory
//! wait registry fallback, webhook authentication, the schedule sweeper, and
//! the global config loader.

pub mod config;
pub mod sqlite;
pub mod sweeper;
pub mod wait;
pub mod webhook;
