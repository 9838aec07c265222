//! The scored wrapper around one memory during a single assembly.

use threadwise_core::context::SectionType;
use threadwise_core::memory::{Memory, priority};

/// A memory under consideration for one assembly call. Never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub memory: Memory,
    /// The one section whose budget this candidate draws from
    pub section: SectionType,
    /// Base score assigned by source
    pub score: f64,
    /// Keyword overlap with the user message, 0.0–1.0
    pub relevance: f64,
    pub recency: f64,
    pub included: bool,
    pub exclusion_reason: Option<String>,
    /// Position in gather order; the final tie-break
    pub ordinal: usize,
}

impl Candidate {
    pub fn new(memory: Memory, section: SectionType, score: f64) -> Self {
        Self {
            memory,
            section,
            score,
            relevance: 0.0,
            recency: 1.0,
            included: false,
            exclusion_reason: None,
            ordinal: 0,
        }
    }

    pub fn with_recency(mut self, recency: f64) -> Self {
        self.recency = recency;
        self
    }

    pub fn tokens(&self) -> usize {
        self.memory.tokens
    }

    pub fn priority(&self) -> u8 {
        self.memory.priority
    }

    /// Critical candidates are never rejected for budget reasons.
    pub fn is_critical(&self) -> bool {
        self.memory.priority >= priority::CRITICAL
    }

    pub fn include(&mut self) {
        self.included = true;
        self.exclusion_reason = None;
    }

    pub fn exclude(&mut self, reason: impl Into<String>) {
        self.included = false;
        self.exclusion_reason = Some(reason.into());
    }
}
