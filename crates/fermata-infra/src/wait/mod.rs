//! Wait registry implementations.
//!
//! The SQLite mailbox (`crate::sqlite::wait`) is the primary registry and is
//! cross-process correct on a shared database. The in-memory registry here
//! is the single-process fallback for when no shared database is available;
//! it has identical semantics but cannot rendezvous across instances.

pub mod memory;

pub use memory::InMemoryWaitRegistry;
