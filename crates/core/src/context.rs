//! Assembled-context domain types.
//!
//! These are the values produced by one assembly call and persisted for
//! replay: sections, the rendered message list and the debug trail.

use crate::message::ContextMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A budget category and message-rendering bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    System,
    Summary,
    Rag,
    Pinned,
    /// Reserved: has a budget slot but no candidate source yet.
    WorkingMemory,
    History,
    UserMessage,
}

impl SectionType {
    /// All sections in message-rendering order.
    pub const ORDERED: [SectionType; 7] = [
        Self::System,
        Self::Summary,
        Self::Rag,
        Self::Pinned,
        Self::WorkingMemory,
        Self::History,
        Self::UserMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Summary => "summary",
            Self::Rag => "rag",
            Self::Pinned => "pinned",
            Self::WorkingMemory => "working_memory",
            Self::History => "history",
            Self::UserMessage => "user_message",
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-section budget fractions.
///
/// Each fraction caps its own section independently; they are not a
/// partition and need not sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionFractions {
    pub system: f64,
    pub working_memory: f64,
    pub user_message: f64,
    pub pinned: f64,
    pub rag: f64,
    pub history: f64,
    pub summary: f64,
}

impl SectionFractions {
    pub fn get(&self, section: SectionType) -> f64 {
        match section {
            SectionType::System => self.system,
            SectionType::WorkingMemory => self.working_memory,
            SectionType::UserMessage => self.user_message,
            SectionType::Pinned => self.pinned,
            SectionType::Rag => self.rag,
            SectionType::History => self.history,
            SectionType::Summary => self.summary,
        }
    }
}

impl Default for SectionFractions {
    fn default() -> Self {
        Self {
            system: 0.10,
            working_memory: 0.10,
            user_message: 0.10,
            pinned: 0.10,
            rag: 0.20,
            history: 0.30,
            summary: 0.10,
        }
    }
}

/// Which end of the history window receives the full recency weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyDirection {
    /// Oldest retained message weighs 1.0, each newer one decays.
    #[default]
    DecayFromOldest,
    /// Newest message weighs 1.0, each older one decays.
    DecayFromNewest,
}

/// Knobs for one assembly call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    pub fractions: SectionFractions,
    /// Max history candidates fetched
    pub history_limit: usize,
    /// Max pinned candidates fetched
    pub pinned_limit: usize,
    pub include_summary: bool,
    /// Empty disables retrieval
    pub rag_sources: Vec<String>,
    pub max_rag_results: usize,
    /// Multiplicative recency decay per history step
    pub recency_decay: f64,
    pub recency_direction: RecencyDirection,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            fractions: SectionFractions::default(),
            history_limit: 50,
            pinned_limit: 20,
            include_summary: true,
            rag_sources: Vec::new(),
            max_rag_results: 5,
            recency_decay: 0.95,
            recency_direction: RecencyDirection::default(),
        }
    }
}

/// One rendered section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSection {
    pub section_type: SectionType,
    /// Member contents joined by a blank line
    pub content: String,
    pub tokens: usize,
    /// Floor of the mean member priority
    pub priority: u8,
    pub source_ids: Vec<String>,
}

/// Token attribution for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionAttribution {
    pub section_type: SectionType,
    pub tokens: usize,
    /// Share of `tokens_used`, 0.0–1.0
    pub percentage: f64,
    pub source_count: usize,
    /// First five source ids
    pub sample_sources: Vec<String>,
}

/// Cache counters supplied by the caller and recorded verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// The audit trail of one assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub candidates_considered: usize,
    pub candidates_included: usize,
    pub candidates_excluded: usize,
    pub section_tokens: Vec<SectionAttribution>,
    /// Exclusion reason → count
    pub exclusion_reasons: BTreeMap<String, usize>,
    pub assembly_time_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// The result of one assembly call, ready for an LLM request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub id: String,
    pub session_id: String,
    pub model_id: String,
    pub token_budget: usize,
    /// Always the sum of `sections[*].tokens`
    pub tokens_used: usize,
    pub sections: Vec<ContextSection>,
    pub messages: Vec<ContextMessage>,
    pub debug: DebugInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AssembledContext {
    pub fn section(&self, section_type: SectionType) -> Option<&ContextSection> {
        self.sections.iter().find(|s| s.section_type == section_type)
    }

    /// `tokens_used / token_budget`; above 1.0 when critical items overran.
    pub fn utilization(&self) -> f64 {
        self.tokens_used as f64 / self.token_budget.max(1) as f64
    }
}
