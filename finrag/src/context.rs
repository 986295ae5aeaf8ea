//! Prompt-context assembly.
//!
//! [`ContextAssembler::assemble`] is a positional join. Sections appear in a
//! fixed order and retrieved passages keep their ranking, so nothing is
//! reordered or deduplicated:
//!
//! 1. retrieved passages, most relevant first
//! 2. the user profile summary, if any
//! 3. live market data per detected symbol
//! 4. static domain-knowledge tables

use crate::document::Document;
use crate::knowledge::StaticKnowledge;
use crate::market::LiveData;
use crate::profile::UserProfile;

/// Joins retrieval output, profile data and knowledge tables into one string.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    passage_separator: String,
    section_separator: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { passage_separator: "\n".to_string(), section_separator: "\n\n".to_string() }
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom separators between passages and between sections.
    pub fn with_separators(passage: impl Into<String>, section: impl Into<String>) -> Self {
        Self { passage_separator: passage.into(), section_separator: section.into() }
    }

    pub fn assemble(
        &self,
        retrieved: &[Document],
        profile: Option<&UserProfile>,
        static_knowledge: &StaticKnowledge,
        live_data: &[LiveData],
    ) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !retrieved.is_empty() {
            let passages: Vec<&str> = retrieved.iter().map(|d| d.content.as_str()).collect();
            sections.push(passages.join(&self.passage_separator));
        }

        if let Some(profile) = profile {
            sections.push(profile.summary());
        }

        for data in live_data.iter().filter(|d| !d.metrics.is_empty()) {
            let metrics = serde_json::to_string_pretty(&data.metrics)
                .unwrap_or_else(|_| format!("{:?}", data.metrics));
            sections.push(format!("Stock Data for {}:\n{}", data.symbol, metrics));
        }

        if !static_knowledge.is_empty() {
            sections.push(static_knowledge.to_text());
        }

        sections.join(&self.section_separator)
    }
}
