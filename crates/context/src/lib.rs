//! Deterministic context assembly for Threadwise.
//!
//! Decides which stored memories go into the next LLM call, in what order,
//! and records why everything else was left out.
//!
//! # Sections (in message order)
//!
//! | Section | Source | Base score | Role |
//! |---------|--------|------------|------|
//! | System | Caller's system prompt | 1.0 (critical) | system |
//! | Summary | Session summary | 0.6 | system |
//! | RAG | Full-text hits from other sessions | 0.7 | system |
//! | Pinned | Pinned session memories | 0.9 | system |
//! | Working memory | Reserved | n/a | assistant |
//! | History | Recent session memories | 0.5 | system, one block |
//! | User message | The current message | 1.0 (critical) | user |
//!
//! Each section draws from its own cap, `floor(budget * fraction)`.
//! Critical items are admitted even when they overrun it.

pub mod assembler;
pub mod candidate;
pub mod debug;
pub mod gather;
pub mod messages;
pub mod score;
pub mod sections;
pub mod select;
pub mod token;

pub use assembler::{AssemblyError, AssemblyRequest, ContextAssembler};
pub use candidate::Candidate;
pub use debug::DebugRecorder;
pub use gather::{CandidateGatherer, GatherInput};
pub use messages::MessageBuilder;
pub use score::Scorer;
pub use sections::SectionBuilder;
pub use select::{BudgetAllocator, BudgetCaps, Selector};
pub use token::{CharHeuristicEstimator, TokenEstimator, WordCountEstimator, estimator_for};
