//! Token estimation utilities.
//!
//! Stored memories carry precomputed token counts. Only the candidates the
//! assembler synthesizes itself (system prompt, current user message,
//! session summary) are sized here.

use std::sync::Arc;
use threadwise_config::TokenEstimatorKind;

/// Sizes a piece of text in approximate token units.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// One token per whitespace-separated word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCountEstimator;

impl TokenEstimator for WordCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Character-based heuristic: 1 token ≈ 4 characters. Rounds up.
///
/// Accurate within ~10% for BPE tokenizers on English text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHeuristicEstimator;

impl TokenEstimator for CharHeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        text.len().div_ceil(4)
    }
}

/// The estimator a configuration names.
pub fn estimator_for(kind: TokenEstimatorKind) -> Arc<dyn TokenEstimator> {
    match kind {
        TokenEstimatorKind::Words => Arc::new(WordCountEstimator),
        TokenEstimatorKind::Chars => Arc::new(CharHeuristicEstimator),
    }
}
