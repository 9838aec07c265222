//! Per-section budget caps and greedy admission.

use crate::candidate::Candidate;
use std::collections::BTreeMap;
use threadwise_core::context::{SectionFractions, SectionType};
use tracing::debug;

/// Token cap for every section type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetCaps {
    caps: BTreeMap<SectionType, usize>,
}

impl BudgetCaps {
    pub fn cap(&self, section: SectionType) -> usize {
        self.caps.get(&section).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionType, usize)> + '_ {
        self.caps.iter().map(|(s, c)| (*s, *c))
    }
}

pub struct BudgetAllocator;

impl BudgetAllocator {
    /// `cap = floor(token_budget * fraction)` for each section.
    ///
    /// Fractions are independent caps. They may sum past 1.0.
    pub fn allocate(token_budget: usize, fractions: &SectionFractions) -> BudgetCaps {
        let caps = SectionType::ORDERED
            .iter()
            .map(|&section| {
                let raw = (token_budget as f64 * fractions.get(section)).floor();
                // Negative or NaN fractions are rejected by config validation; `as` saturates anyway.
                (section, raw as usize)
            })
            .collect();
        BudgetCaps { caps }
    }
}

/// Reason recorded when a candidate does not fit its section's cap.
pub fn budget_exceeded(section: SectionType) -> String {
    format!("Budget exceeded for {section}")
}

pub struct Selector;

impl Selector {
    /// Walk `ranked` in order and admit what fits.
    ///
    /// Critical candidates are admitted unconditionally and still count
    /// against their section, which may push `used` past the cap.
    /// Returns tokens used per section.
    pub fn select(ranked: &mut [Candidate], caps: &BudgetCaps) -> BTreeMap<SectionType, usize> {
        let mut used: BTreeMap<SectionType, usize> = BTreeMap::new();

        for candidate in ranked.iter_mut() {
            let section_used = used.entry(candidate.section).or_insert(0);
            let cap = caps.cap(candidate.section);

            let tokens = candidate.tokens();
            if candidate.is_critical() {
                *section_used = section_used.saturating_add(tokens);
                candidate.include();
            } else if section_used.checked_add(tokens).is_some_and(|total| total <= cap) {
                *section_used += tokens;
                candidate.include();
            } else {
                candidate.exclude(budget_exceeded(candidate.section));
            }
        }

        for (section, tokens) in &used {
            let cap = caps.cap(*section);
            if *tokens > cap {
                debug!(section = %section, used = tokens, cap, "Critical items overran section cap");
            }
        }

        used
    }
}
