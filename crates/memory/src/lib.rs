//! Memory store implementations for Threadwise.
//!
//! Both stores implement [`threadwise_core::MemoryStore`]; the assembly
//! engine only ever sees the trait.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
