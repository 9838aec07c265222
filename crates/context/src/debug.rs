//! The audit trail of one assembly.

use crate::candidate::Candidate;
use std::collections::BTreeMap;
use std::time::Duration;
use threadwise_core::context::{CacheStats, ContextSection, DebugInfo, SectionAttribution};

/// Source ids sampled per section in the attribution.
pub const SAMPLE_SOURCES: usize = 5;

pub struct DebugRecorder;

impl DebugRecorder {
    pub fn record(
        candidates: &[Candidate],
        sections: &[ContextSection],
        tokens_used: usize,
        elapsed: Duration,
        cache: CacheStats,
    ) -> DebugInfo {
        let included = candidates.iter().filter(|c| c.included).count();

        let mut exclusion_reasons = BTreeMap::new();
        for reason in candidates.iter().filter_map(|c| c.exclusion_reason.as_ref()) {
            *exclusion_reasons.entry(reason.clone()).or_insert(0) += 1;
        }

        DebugInfo {
            candidates_considered: candidates.len(),
            candidates_included: included,
            candidates_excluded: candidates.len() - included,
            section_tokens: Self::attribute(sections, tokens_used),
            exclusion_reasons,
            assembly_time_ms: elapsed.as_secs_f64() * 1000.0,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
        }
    }

    /// Token attribution per section, in section order.
    pub fn attribute(sections: &[ContextSection], tokens_used: usize) -> Vec<SectionAttribution> {
        let denominator = tokens_used.max(1) as f64;
        sections
            .iter()
            .map(|s| SectionAttribution {
                section_type: s.section_type,
                tokens: s.tokens,
                percentage: s.tokens as f64 / denominator,
                source_count: s.source_ids.len(),
                sample_sources: s.source_ids.iter().take(SAMPLE_SOURCES).cloned().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::test_support::candidate;
    use threadwise_core::context::SectionType;
    use threadwise_core::memory::priority;

    #[test]
    fn histogram_counts_reasons() {
        let mut a = candidate("a", SectionType::Pinned, "a", 1, priority::HIGH);
        a.exclude("Budget exceeded for pinned");
        let mut b = candidate("b", SectionType::Pinned, "b", 1, priority::HIGH);
        b.exclude("Budget exceeded for pinned");
        let mut c = candidate("c", SectionType::Rag, "c", 1, priority::MEDIUM);
        c.exclude("Budget exceeded for rag");
        let mut d = candidate("d", SectionType::UserMessage, "d", 1, priority::CRITICAL);
        d.include();

        let info = DebugRecorder::record(
            &[a, b, c, d],
            &[],
            0,
            Duration::from_micros(1500),
            CacheStats { hits: 3, misses: 1 },
        );
        assert_eq!(info.candidates_considered, 4);
        assert_eq!(info.candidates_included, 1);
        assert_eq!(info.candidates_excluded, 3);
        assert_eq!(info.exclusion_reasons["Budget exceeded for pinned"], 2);
        assert_eq!(info.exclusion_reasons["Budget exceeded for rag"], 1);
        assert_eq!(info.cache_hits, 3);
        assert_eq!(info.cache_misses, 1);
        assert!((info.assembly_time_ms - 1.5).abs() < 1e-9);
    }

    #[test]
    fn attribution_samples_first_five() {
        let section = ContextSection {
            section_type: SectionType::History,
            content: String::new(),
            tokens: 6,
            priority: 50,
            source_ids: (0..7).map(|i| format!("h{i}")).collect(),
        };
        let attribution = DebugRecorder::attribute(&[section], 8);
        assert_eq!(attribution[0].source_count, 7);
        assert_eq!(attribution[0].sample_sources, vec!["h0", "h1", "h2", "h3", "h4"]);
        assert_eq!(attribution[0].percentage, 0.75);
    }

    #[test]
    fn zero_total_does_not_divide_by_zero() {
        let section = ContextSection {
            section_type: SectionType::UserMessage,
            content: String::new(),
            tokens: 0,
            priority: 100,
            source_ids: vec!["user_message".into()],
        };
        let attribution = DebugRecorder::attribute(&[section], 0);
        assert_eq!(attribution[0].percentage, 0.0);
    }
}
