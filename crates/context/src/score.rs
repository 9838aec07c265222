//! Relevance scoring and the composite ranking key.
//!
//! The ranking key decides greedy admission order only. Final in-section
//! order is the section builder's concern.

use crate::candidate::Candidate;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const PRIORITY_WEIGHT: f64 = 0.4;
pub const RELEVANCE_WEIGHT: f64 = 0.3;
pub const RECENCY_WEIGHT: f64 = 0.2;
pub const SCORE_WEIGHT: f64 = 0.1;

/// Scores candidates against one query (the current user message).
pub struct Scorer {
    query_terms: HashSet<String>,
}

impl Scorer {
    pub fn new(query: &str) -> Self {
        Self {
            query_terms: terms(query),
        }
    }

    /// |query terms ∩ content terms| / max(|query terms|, 1), clamped to [0, 1].
    pub fn relevance(&self, content: &str) -> f64 {
        let content_terms = terms(content);
        let overlap = self.query_terms.intersection(&content_terms).count();
        (overlap as f64 / self.query_terms.len().max(1) as f64).clamp(0.0, 1.0)
    }

    /// Fill in `relevance` for every candidate.
    pub fn score_all(&self, candidates: &mut [Candidate]) {
        for candidate in candidates.iter_mut() {
            candidate.relevance = self.relevance(&candidate.memory.content);
        }
    }

    /// 0.4·priority + 0.3·relevance + 0.2·recency + 0.1·score.
    pub fn composite(candidate: &Candidate) -> f64 {
        PRIORITY_WEIGHT * (f64::from(candidate.priority()) / 100.0)
            + RELEVANCE_WEIGHT * candidate.relevance
            + RECENCY_WEIGHT * candidate.recency
            + SCORE_WEIGHT * candidate.score
    }

    /// Sort descending by composite key into greedy admission order.
    ///
    /// Ties fall back to priority, then relevance, then gather order.
    pub fn rank(candidates: &mut [Candidate]) {
        candidates.sort_by(Self::admission_order);
    }

    fn admission_order(a: &Candidate, b: &Candidate) -> Ordering {
        Self::composite(b)
            .total_cmp(&Self::composite(a))
            .then_with(|| b.priority().cmp(&a.priority()))
            .then_with(|| b.relevance.total_cmp(&a.relevance))
            .then_with(|| a.ordinal.cmp(&b.ordinal))
    }
}

/// Lowercased whitespace terms. No stemming, no stopwords.
fn terms(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
