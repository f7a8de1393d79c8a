//! Per-community summaries

use serde::{Deserialize, Serialize};

/// Natural-language summary of one community.
///
/// When the model call fails the text is a placeholder and `error` keeps the
/// cause, so the summary list stays aligned with the community list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub community_index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommunitySummary {
    pub fn generated(community_index: usize, text: impl Into<String>) -> Self {
        Self {
            community_index,
            text: text.into(),
            error: None,
        }
    }

    pub fn placeholder(community_index: usize, error: impl Into<String>) -> Self {
        Self {
            community_index,
            text: format!("Error summarizing community {}", community_index),
            error: Some(error.into()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// One line per community, numbered from 1
pub fn digest(summaries: &[CommunitySummary]) -> String {
    summaries
        .iter()
        .map(|s| format!("Community {}: {}", s.community_index + 1, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let summary = CommunitySummary::placeholder(3, "timed out");
        assert_eq!(summary.text, "Error summarizing community 3");
        assert!(summary.is_placeholder());
    }

    #[test]
    fn test_digest_numbers_from_one() {
        let summaries = vec![
            CommunitySummary::generated(0, "Finance people"),
            CommunitySummary::generated(1, "Sports clubs"),
        ];
        assert_eq!(
            digest(&summaries),
            "Community 1: Finance people\nCommunity 2: Sports clubs"
        );
    }

    #[test]
    fn test_error_not_serialized_when_absent() {
        let json = serde_json::to_string(&CommunitySummary::generated(0, "x")).unwrap();
        assert!(!json.contains("error"));
    }
}
