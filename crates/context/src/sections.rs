//! Grouping admitted candidates into sections.

use crate::candidate::Candidate;
use threadwise_core::context::{ContextSection, SectionType};

/// Separator between member contents inside one section.
pub const SECTION_SEPARATOR: &str = "\n\n";

pub struct SectionBuilder;

impl SectionBuilder {
    /// Build one section per non-empty section type, in message order.
    ///
    /// `admitted` must be in admission order; that order breaks score ties
    /// outside the history section.
    pub fn build(admitted: &[Candidate]) -> Vec<ContextSection> {
        SectionType::ORDERED
            .iter()
            .filter_map(|&section| {
                let members: Vec<&Candidate> = admitted
                    .iter()
                    .filter(|c| c.included && c.section == section)
                    .collect();
                Self::build_section(section, members)
            })
            .collect()
    }

    fn build_section(section: SectionType, mut members: Vec<&Candidate>) -> Option<ContextSection> {
        if members.is_empty() {
            return None;
        }

        if section == SectionType::History {
            // Chronological replay, whatever the admission order was.
            members.sort_by(|a, b| {
                a.memory
                    .created_at
                    .cmp(&b.memory.created_at)
                    .then_with(|| a.ordinal.cmp(&b.ordinal))
            });
        } else {
            members.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        let content = members
            .iter()
            .map(|c| c.memory.content.as_str())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);
        let tokens = members.iter().fold(0usize, |acc, c| acc.saturating_add(c.tokens()));
        let priority_sum: usize = members.iter().map(|c| usize::from(c.priority())).sum();
        let priority = (priority_sum / members.len()) as u8;
        let source_ids = members.iter().map(|c| c.memory.id.clone()).collect();

        Some(ContextSection {
            section_type: section,
            content,
            tokens,
            priority,
            source_ids,
        })
    }
}
