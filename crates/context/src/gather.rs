//! Candidate gathering from the memory store.
//!
//! Sources are visited in a fixed sequence: system prompt, pinned facts,
//! recent history, session summary, the current user message, and finally
//! full-text retrieval. Gather order is the last tie-break in ranking, so
//! the sequence is part of the determinism contract.

use crate::candidate::Candidate;
use crate::token::TokenEstimator;
use chrono::{DateTime, Utc};
use threadwise_core::context::{AssemblyOptions, RecencyDirection, SectionType};
use threadwise_core::error::MemoryError;
use threadwise_core::memory::{Memory, MemoryFilter, MemoryStore, MemoryType, priority};
use threadwise_core::message::Role;
use tracing::{debug, warn};

pub const SYSTEM_PROMPT_ID: &str = "system_prompt";
pub const SESSION_SUMMARY_ID: &str = "session_summary";
pub const USER_MESSAGE_ID: &str = "user_message";

pub const SYSTEM_SCORE: f64 = 1.0;
pub const PINNED_SCORE: f64 = 0.9;
pub const HISTORY_SCORE: f64 = 0.5;
pub const SUMMARY_SCORE: f64 = 0.6;
pub const USER_MESSAGE_SCORE: f64 = 1.0;
pub const RAG_SCORE: f64 = 0.7;

/// Everything one gather pass needs besides the store.
#[derive(Debug, Clone, Copy)]
pub struct GatherInput<'a> {
    pub session_id: &'a str,
    pub user_message: &'a str,
    pub system_prompt: Option<&'a str>,
    pub options: &'a AssemblyOptions,
    /// Timestamp given to synthesized candidates
    pub now: DateTime<Utc>,
}

pub struct CandidateGatherer<'a> {
    store: &'a dyn MemoryStore,
    estimator: &'a dyn TokenEstimator,
}

impl<'a> CandidateGatherer<'a> {
    pub fn new(store: &'a dyn MemoryStore, estimator: &'a dyn TokenEstimator) -> Self {
        Self { store, estimator }
    }

    /// Collect every candidate for one assembly, numbered in gather order.
    pub async fn gather(&self, input: &GatherInput<'_>) -> Result<Vec<Candidate>, MemoryError> {
        let mut candidates = Vec::new();

        if let Some(prompt) = input.system_prompt {
            let memory = self.synthesize(input, SYSTEM_PROMPT_ID, MemoryType::System, Role::System, prompt, priority::CRITICAL);
            candidates.push(Candidate::new(memory, SectionType::System, SYSTEM_SCORE));
        }

        let pinned = self
            .store
            .get_session_memories(input.session_id, &MemoryFilter::pinned(), input.options.pinned_limit)
            .await?;
        let pinned_count = pinned.len();
        candidates.extend(
            pinned
                .into_iter()
                .map(|m| Candidate::new(m, SectionType::Pinned, PINNED_SCORE)),
        );

        let recent = self
            .store
            .get_recent_memories(input.session_id, input.options.history_limit)
            .await?;
        let history_count = recent.len();
        candidates.extend(history_candidates(recent, input.options));

        if input.options.include_summary
            && let Some(summary) = self
                .store
                .get_session(input.session_id)
                .await?
                .and_then(|s| s.summary)
                .filter(|s| !s.trim().is_empty())
        {
            let memory = self.synthesize(input, SESSION_SUMMARY_ID, MemoryType::Summary, Role::System, &summary, priority::HIGH);
            candidates.push(Candidate::new(memory, SectionType::Summary, SUMMARY_SCORE));
        }

        let memory = self.synthesize(
            input,
            USER_MESSAGE_ID,
            MemoryType::Message,
            Role::User,
            input.user_message,
            priority::CRITICAL,
        );
        candidates.push(Candidate::new(memory, SectionType::UserMessage, USER_MESSAGE_SCORE));

        let rag_count = if input.options.rag_sources.is_empty() {
            0
        } else {
            let hits = self.retrieve(input).await;
            let count = hits.len();
            candidates.extend(hits.into_iter().map(|m| Candidate::new(m, SectionType::Rag, RAG_SCORE)));
            count
        };

        for (ordinal, candidate) in candidates.iter_mut().enumerate() {
            candidate.ordinal = ordinal;
        }

        debug!(
            session_id = input.session_id,
            total = candidates.len(),
            pinned = pinned_count,
            history = history_count,
            rag = rag_count,
            "Gathered candidates"
        );

        Ok(candidates)
    }

    /// Full-text hits from other sessions. Failures degrade to no hits.
    async fn retrieve(&self, input: &GatherInput<'_>) -> Vec<Memory> {
        match self
            .store
            .search_memories_fts(input.user_message, input.options.max_rag_results)
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .filter(|m| m.session_id.as_deref() != Some(input.session_id))
                .collect(),
            Err(e) => {
                warn!(
                    session_id = input.session_id,
                    store = self.store.name(),
                    error = %e,
                    "Retrieval failed, continuing without RAG"
                );
                Vec::new()
            }
        }
    }

    fn synthesize(
        &self,
        input: &GatherInput<'_>,
        id: &str,
        memory_type: MemoryType,
        role: Role,
        content: &str,
        prio: u8,
    ) -> Memory {
        Memory {
            id: id.to_string(),
            session_id: Some(input.session_id.to_string()),
            memory_type,
            role,
            content: content.to_string(),
            tokens: self.estimator.estimate(content),
            priority: prio,
            pinned: false,
            created_at: input.now,
            metadata: serde_json::Map::new(),
        }
    }
}

/// History candidates in chronological order with recency weights applied.
///
/// `recent` arrives newest first, as the store returns it. The weight starts
/// at 1.0 and is multiplied by `recency_decay` for each subsequent item in
/// the decay direction.
fn history_candidates(recent: Vec<Memory>, options: &AssemblyOptions) -> Vec<Candidate> {
    let mut weight = 1.0;
    let mut weigh = |memory: Memory| {
        let candidate = Candidate::new(memory, SectionType::History, HISTORY_SCORE).with_recency(weight);
        weight *= options.recency_decay;
        candidate
    };

    match options.recency_direction {
        RecencyDirection::DecayFromOldest => recent.into_iter().rev().map(&mut weigh).collect(),
        RecencyDirection::DecayFromNewest => {
            let mut candidates: Vec<Candidate> = recent.into_iter().map(&mut weigh).collect();
            candidates.reverse();
            candidates
        }
    }
}
