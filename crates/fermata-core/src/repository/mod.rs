//! Storage and signaling ports.
//!
//! Trait interfaces implemented by the infrastructure layer (fermata-infra).
//! The engine and coordinator depend only on these traits, constructed once
//! at process start and passed by handle.

pub mod pause;
pub mod runs;
pub mod wait;
