use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Content categories the detector knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    PhoneNumber,
    EmailAddress,
    ExternalPlatform,
    MeetupRequest,
    BypassIntent,
}

impl ViolationCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PhoneNumber => "phone number",
            Self::EmailAddress => "email address",
            Self::ExternalPlatform => "external platform",
            Self::MeetupRequest => "meetup request",
            Self::BypassIntent => "bypass intent",
        }
    }

    /// Phrasing that states an intent to take the relationship off-platform.
    pub const fn is_bypass_intent(self) -> bool {
        matches!(self, Self::BypassIntent)
    }
}

/// One row of the detection table: a category, its confidence curve, and the patterns
/// that count as a match.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: ViolationCategory,
    pub base_confidence: f32,
    pub increment: f32,
    pub cap: f32,
    patterns: Vec<Regex>,
}

impl CategoryRule {
    pub fn new(
        category: ViolationCategory,
        base_confidence: f32,
        increment: f32,
        cap: f32,
        patterns: &[&str],
    ) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            category,
            base_confidence,
            increment,
            cap,
            patterns,
        })
    }

    /// Byte spans matched by any of this rule's patterns, with overlaps collapsed.
    pub fn find_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans: Vec<(usize, usize)> = self
            .patterns
            .iter()
            .flat_map(|pattern| pattern.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();
        merge_spans(&mut spans)
    }

    /// Base confidence for the first match, plus the increment for each further one.
    pub fn confidence_for(&self, matches: usize) -> f32 {
        if matches == 0 {
            return 0.0;
        }
        let extra = (matches - 1) as f32;
        let raw = (self.base_confidence + self.increment * extra).min(self.cap);
        round_confidence(raw)
    }
}

pub(crate) fn round_confidence(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn merge_spans(spans: &mut Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for &(start, end) in spans.iter() {
        match merged.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

const PHONE_PATTERNS: &[&str] = &[
    // UK mobiles: 07xxx xxxxxx, +44 7xxx xxxxxx
    r"(?:\+44\s?\(?0?\)?\s?|\b0)7(?:[\s-]?\d){9}\b",
    // UK landlines and non-geographic numbers
    r"(?:\+44\s?\(?0?\)?\s?|\b0)[1-3](?:[\s-]?\d){8,9}\b",
];

const EMAIL_PATTERNS: &[&str] = &[
    r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
    r"(?i)\b[a-z0-9._%+-]+\s*(?:\(at\)|\[at\]|\sat\s)\s*[a-z0-9-]+\s*(?:\(dot\)|\[dot\]|\sdot\s)\s*[a-z]{2,}\b",
];

const PLATFORM_PATTERNS: &[&str] = &[
    r"(?i)\b(?:whats\s?app|telegram|skype|linked\s?in|facebook|instagram|snapchat|wechat|viber|discord|zoom|google\s+meet|microsoft\s+teams|hangouts)\b",
    r"(?i)\b(?:indeed|totaljobs|reed\.co\.uk|signal\s+(?:app|me|messenger))\b",
];

const MEETUP_PATTERNS: &[&str] = &[
    r"(?i)\bmeet\s+(?:up|in\s+person|for\s+(?:a\s+)?(?:coffee|drink|lunch|chat))\b",
    r"(?i)\bgrab\s+(?:a\s+)?(?:coffee|drink|lunch|bite)\b",
    r"(?i)\b(?:in\s+person|face\s+to\s+face)\b",
    r"(?i)\b(?:come|pop)\s+(?:to|by|into)\s+(?:our|my|the)\s+office\b",
];

const BYPASS_PATTERNS: &[&str] = &[
    r"(?i)\boff\s+(?:the\s+)?platform\b",
    r"(?i)\boutside\s+(?:of\s+)?(?:the\s+|this\s+)?(?:platform|site|app)\b",
    r"(?i)\b(?:avoid|skip|dodge|save\s+on)\s+(?:the\s+)?(?:platform\s+|agency\s+|recruitment\s+)?fees?\b",
    r"(?i)\bcut\s+out\s+the\s+middle\s?man\b",
    r"(?i)\b(?:contact|call|email|text|message|reach|pay|hire)\s+(?:me|you)\s+directly\b",
    r"(?i)\b(?:call|text|message|email|contact)\s+me\s+(?:asap|urgently|right\s+away|now)\b",
    r"(?i)\b(?:keep\s+(?:this|it)\s+)?between\s+(?:us|ourselves)\b",
    r"(?i)\bdon'?t\s+tell\s+(?:the\s+)?(?:platform|site|anyone)\b",
];

static DEFAULT_RULES: LazyLock<Vec<CategoryRule>> = LazyLock::new(|| {
    [
        (ViolationCategory::PhoneNumber, 0.95, PHONE_PATTERNS),
        (ViolationCategory::EmailAddress, 0.90, EMAIL_PATTERNS),
        (ViolationCategory::ExternalPlatform, 0.85, PLATFORM_PATTERNS),
        (ViolationCategory::MeetupRequest, 0.75, MEETUP_PATTERNS),
        (ViolationCategory::BypassIntent, 0.65, BYPASS_PATTERNS),
    ]
    .into_iter()
    .map(|(category, base, patterns)| {
        CategoryRule::new(category, base, 0.05, 1.0, patterns).expect("invalid detection pattern")
    })
    .collect()
});

pub fn default_rules() -> Vec<CategoryRule> {
    DEFAULT_RULES.clone()
}
