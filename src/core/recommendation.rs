//! Recommendation model and prioritization
//!
//! Every rule attaches a structured [`Priority`] when it fires, so ordering
//! never depends on the wording of the message. [`Priority::from_text`] is
//! only for callers that hand in plain strings.

use serde::{Deserialize, Serialize};

/// Recommendation priority (higher sorts first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low = 1,
    High = 2,
    Critical = 3,
}

const CRITICAL_KEYWORDS: &[&str] = &[
    "緊急", "重大", "深刻", "危険", "リーク", "critical", "urgent", "severe", "leak",
];

const HIGH_KEYWORDS: &[&str] = &[
    "高", "推奨", "検討", "増加", "high", "recommend", "consider", "increase",
];

impl Priority {
    /// Numeric level (Critical = 3, High = 2, Low = 1)
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Infer a priority from recommendation text by keyword tiers
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if CRITICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Priority::Critical
        } else if HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Priority::High
        } else {
            Priority::Low
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::High => write!(f, "High"),
            Priority::Critical => write!(f, "Critical"),
        }
    }
}

/// Which rule set produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Trend,
    Objects,
    Fragmentation,
    GarbageCollection,
    Pattern,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub message: String,
}

impl Recommendation {
    pub fn new(
        priority: Priority,
        category: RecommendationCategory,
        message: impl Into<String>,
    ) -> Self {
        Self { priority, category, message: message.into() }
    }

    /// Wrap a plain string, inferring its priority from the text
    pub fn from_text(category: RecommendationCategory, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            priority: Priority::from_text(&message),
            category,
            message,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.priority, self.message)
    }
}

/// Stable sort, highest priority first; ties keep discovery order
pub fn prioritize(mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

/// Prioritize text-only recommendations using the keyword scan
pub fn prioritize_messages<I, S>(messages: I) -> Vec<Recommendation>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    prioritize(
        messages
            .into_iter()
            .map(|m| Recommendation::from_text(RecommendationCategory::General, m))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_tiers() {
        assert_eq!(Priority::from_text("CRITICAL: heap exhausted"), Priority::Critical);
        assert_eq!(Priority::from_text("メモリリークの可能性があります"), Priority::Critical);
        assert_eq!(Priority::from_text("Consider pooling buffers"), Priority::High);
        assert_eq!(Priority::from_text("オブジェクトプールの使用を推奨"), Priority::High);
        assert_eq!(Priority::from_text("All good"), Priority::Low);
    }

    #[test]
    fn test_prioritize_is_stable() {
        let recs = vec![
            Recommendation::new(Priority::Low, RecommendationCategory::Trend, "a"),
            Recommendation::new(Priority::High, RecommendationCategory::Trend, "b"),
            Recommendation::new(Priority::Low, RecommendationCategory::Trend, "c"),
            Recommendation::new(Priority::High, RecommendationCategory::Trend, "d"),
            Recommendation::new(Priority::Critical, RecommendationCategory::Pattern, "e"),
        ];
        let order: Vec<String> = prioritize(recs).into_iter().map(|r| r.message).collect();
        assert_eq!(order, vec!["e", "b", "d", "a", "c"]);
    }

    #[test]
    fn test_prioritize_messages() {
        let recs = prioritize_messages(["tidy up", "urgent: leak suspected", "consider pooling"]);
        assert_eq!(recs[0].priority, Priority::Critical);
        assert_eq!(recs[1].priority, Priority::High);
        assert_eq!(recs[2].message, "tidy up");
        assert_eq!(recs[0].priority.level(), 3);
    }
}
