//! SQLite persistence: connection pool, pause store, wait registry, and run
//! sink.

pub mod pause;
pub mod pool;
pub mod runs;
pub mod wait;

pub use pool::DatabasePool;
