//! # Threadwise Core
//!
//! Domain types, traits, and error definitions for the Threadwise context
//! engine. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Storage is defined as a trait here (`MemoryStore`). Implementations live
//! in `threadwise-memory`, the engine in `threadwise-context`. All crates
//! depend inward on core.

pub mod context;
pub mod error;
pub mod memory;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use context::{
    AssembledContext, AssemblyOptions, CacheStats, ContextSection, DebugInfo, RecencyDirection,
    SectionAttribution, SectionFractions, SectionType,
};
pub use error::MemoryError;
pub use memory::{Memory, MemoryFilter, MemorySession, MemoryStore, MemoryType, NewMemory, priority};
pub use message::{ContextMessage, Role};
