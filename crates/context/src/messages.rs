//! Rendering sections into the role-tagged message list.

use threadwise_core::context::{ContextSection, SectionType};
use threadwise_core::message::{ContextMessage, Role};

/// Prefix of the single system message that carries the history section.
pub const HISTORY_PREFIX: &str = "Conversation history:\n";

pub struct MessageBuilder;

impl MessageBuilder {
    /// One message per present section, in fixed section order.
    ///
    /// History is folded into one system block rather than replayed as
    /// individual turns.
    pub fn build(sections: &[ContextSection]) -> Vec<ContextMessage> {
        SectionType::ORDERED
            .iter()
            .filter_map(|&section_type| {
                sections
                    .iter()
                    .find(|s| s.section_type == section_type)
                    .map(Self::render)
            })
            .collect()
    }

    pub fn role_for(section: SectionType) -> Role {
        match section {
            SectionType::System | SectionType::Summary | SectionType::Rag | SectionType::Pinned => Role::System,
            SectionType::History => Role::System,
            SectionType::WorkingMemory => Role::Assistant,
            SectionType::UserMessage => Role::User,
        }
    }

    fn render(section: &ContextSection) -> ContextMessage {
        let content = match section.section_type {
            SectionType::History => format!("{HISTORY_PREFIX}{}", section.content),
            _ => section.content.clone(),
        };
        ContextMessage {
            role: Self::role_for(section.section_type),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(section_type: SectionType, content: &str) -> ContextSection {
        ContextSection {
            section_type,
            content: content.into(),
            tokens: 1,
            priority: 50,
            source_ids: vec![],
        }
    }

    #[test]
    fn fixed_order_regardless_of_input_order() {
        let sections = vec![
            section(SectionType::UserMessage, "Hi"),
            section(SectionType::History, "a\n\nb"),
            section(SectionType::Pinned, "fact"),
            section(SectionType::System, "Be concise."),
        ];
        let messages = MessageBuilder::build(&sections);
        assert_eq!(
            messages,
            vec![
                ContextMessage::system("Be concise."),
                ContextMessage::system("fact"),
                ContextMessage::system("Conversation history:\na\n\nb"),
                ContextMessage::user("Hi"),
            ]
        );
    }

    #[test]
    fn role_mapping() {
        assert_eq!(MessageBuilder::role_for(SectionType::Summary), Role::System);
        assert_eq!(MessageBuilder::role_for(SectionType::Rag), Role::System);
        assert_eq!(MessageBuilder::role_for(SectionType::WorkingMemory), Role::Assistant);
        assert_eq!(MessageBuilder::role_for(SectionType::UserMessage), Role::User);
    }

    #[test]
    fn no_sections_no_messages() {
        assert!(MessageBuilder::build(&[]).is_empty());
    }
}
