//! Deterministic content classifier for on-platform messages.
//!
//! Detection is a fixed rule table so every verdict can be replayed and explained during
//! a dispute. No scoring here depends on history; temporal heuristics live in
//! [`crate::monitoring`].

mod rules;

pub use rules::{default_rules, CategoryRule, ViolationCategory};

use rules::{merge_spans, round_confidence};
use serde::{Deserialize, Serialize};

/// Replacement text for every redacted span.
pub const REDACTED: &str = "[REDACTED]";

const BLOCK_CONFIDENCE: f32 = 0.8;
const BLOCK_CATEGORY_COUNT: usize = 3;

/// Matches for a single category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFlag {
    pub category: ViolationCategory,
    pub masked_matches: Vec<String>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn from_signals(confidence: f32, categories: usize) -> Self {
        if confidence >= 0.9 || categories >= 3 {
            Self::Critical
        } else if confidence >= 0.8 || categories >= 2 {
            Self::High
        } else if confidence >= 0.6 || categories >= 1 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Verdict for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub flags: Vec<CategoryFlag>,
    pub confidence: f32,
    pub should_block: bool,
    pub risk_level: RiskLevel,
}

impl Classification {
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn has_bypass_intent(&self) -> bool {
        self.flags
            .iter()
            .any(|flag| flag.category.is_bypass_intent())
    }

    pub fn categories(&self) -> Vec<ViolationCategory> {
        self.flags.iter().map(|flag| flag.category).collect()
    }
}

/// Stateless classifier over a [`CategoryRule`] table.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    rules: Vec<CategoryRule>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl PatternDetector {
    pub fn with_rules(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn classify(&self, text: &str) -> Classification {
        let flags: Vec<CategoryFlag> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let spans = rule.find_spans(text);
                if spans.is_empty() {
                    return None;
                }
                Some(CategoryFlag {
                    category: rule.category,
                    masked_matches: spans
                        .iter()
                        .map(|&(start, end)| mask(&text[start..end]))
                        .collect(),
                    confidence: rule.confidence_for(spans.len()),
                })
            })
            .collect();

        let confidence = round_confidence(
            flags
                .iter()
                .map(|flag| flag.confidence)
                .fold(0.0_f32, f32::max),
        );
        let should_block = confidence >= BLOCK_CONFIDENCE || flags.len() >= BLOCK_CATEGORY_COUNT;
        let risk_level = RiskLevel::from_signals(confidence, flags.len());

        Classification {
            flags,
            confidence,
            should_block,
            risk_level,
        }
    }

    /// Replace every span any rule matches with [`REDACTED`].
    pub fn redact(&self, text: &str) -> String {
        let mut spans: Vec<(usize, usize)> = self
            .rules
            .iter()
            .flat_map(|rule| rule.find_spans(text))
            .collect();
        let spans = merge_spans(&mut spans);

        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end) in spans {
            output.push_str(&text[cursor..start]);
            output.push_str(REDACTED);
            cursor = end;
        }
        output.push_str(&text[cursor..]);
        output
    }
}

/// Keep the first two characters so reviewers can tell matches apart without the raw value.
pub(crate) fn mask(value: &str) -> String {
    value
        .chars()
        .enumerate()
        .map(|(index, ch)| if index < 2 || ch.is_whitespace() { ch } else { '*' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_number_blocks_with_high_confidence() {
        let verdict = PatternDetector::default().classify("Call me on 07123456789");
        assert!(verdict.should_block);
        assert!(verdict.confidence >= 0.8);
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
        assert_eq!(verdict.categories(), vec![ViolationCategory::PhoneNumber]);
    }

    #[test]
    fn platform_courtesy_message_is_clean() {
        let verdict = PatternDetector::default()
            .classify("Thank you for your application, let's proceed through the platform");
        assert!(!verdict.should_block);
        assert!(verdict.confidence < 0.5);
        assert!(verdict.is_clean());
        assert_eq!(verdict.risk_level, RiskLevel::Low);
    }

    #[test]
    fn overall_confidence_is_the_max_across_categories() {
        let verdict = PatternDetector::default()
            .classify("let's meet for coffee, message me on whatsapp");
        assert_eq!(verdict.flags.len(), 2);
        assert_eq!(verdict.confidence, 0.85);
        assert!(verdict.should_block);
        assert_eq!(verdict.risk_level, RiskLevel::High);
    }

    #[test]
    fn lone_meetup_request_is_flagged_without_blocking() {
        let verdict = PatternDetector::default().classify("happy to meet in person next week");
        assert!(!verdict.should_block);
        assert_eq!(verdict.confidence, 0.75);
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn three_low_confidence_categories_block() {
        let rules = default_rules()
            .into_iter()
            .map(|mut rule| {
                rule.base_confidence = 0.3;
                rule
            })
            .collect();
        let detector = PatternDetector::with_rules(rules);
        let verdict = detector.classify("whatsapp me, grab a coffee, we can avoid the fees");
        assert_eq!(verdict.flags.len(), 3);
        assert!(verdict.confidence < 0.8);
        assert!(verdict.should_block);
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn masked_matches_hide_contact_details() {
        let verdict = PatternDetector::default().classify("write to jo@example.com");
        let flag = &verdict.flags[0];
        assert_eq!(flag.masked_matches, vec!["jo************".to_string()]);
    }

    #[test]
    fn redact_replaces_every_matched_span() {
        let detector = PatternDetector::default();
        let redacted = detector.redact("ring 07123456789 or jo@example.com, cheers");
        assert_eq!(redacted, "ring [REDACTED] or [REDACTED], cheers");
    }
}
