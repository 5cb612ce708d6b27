//! Best-effort extraction of structured facts from agent output.
//!
//! Only list-shaped lines are considered: bullets (`-`, `*`, `•`, `>`) and
//! numbered items (`1.`, `12.`). Each candidate is classified by keyword,
//! checking decision, requirement, then insight; everything else is a fact.

use crate::models::{FactItem, FactKind};

const MIN_CHARS: usize = 10;
const MAX_CHARS: usize = 500;
const MAX_ITEMS: usize = 10;
const CONFIDENCE: f64 = 0.7;

const DECISION_KEYWORDS: &[&str] = &[
    "recommend", "should", "suggest", "price", "choose", "decision", "strategy",
];
const REQUIREMENT_KEYWORDS: &[&str] = &[
    "must", "need", "require", "essential", "critical", "should have",
];
const INSIGHT_KEYWORDS: &[&str] = &[
    "trend", "predict", "expect", "analysis", "conclude", "indicates",
];

#[derive(Debug, Clone, Default)]
pub struct FactExtractor;

impl FactExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Never fails; text without list items yields nothing.
    pub fn extract(&self, text: &str, agent_id: &str, agent_role: &str) -> Vec<FactItem> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(list_item_content)
            .filter(|content| {
                let n = content.chars().count();
                n > MIN_CHARS && n < MAX_CHARS
            })
            .take(MAX_ITEMS)
            .map(|content| {
                let mut item = FactItem::new(classify(content), content, agent_id, agent_role);
                item.confidence = CONFIDENCE;
                item
            })
            .collect()
    }
}

fn list_item_content(line: &str) -> Option<&str> {
    if line.starts_with(['-', '*', '•', '>']) {
        return Some(line.trim_start_matches(['-', '*', '•', '>', ' ']).trim());
    }

    let starts_with_digit = line.chars().next().is_some_and(|c| c.is_ascii_digit());
    let dot_early = line.chars().take(3).any(|c| c == '.');
    if starts_with_digit && dot_early {
        return line.split_once('.').map(|(_, rest)| rest.trim());
    }
    None
}

/// Keyword classification in priority order.
pub fn classify(content: &str) -> FactKind {
    let lower = content.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|kw| lower.contains(kw));

    if has_any(DECISION_KEYWORDS) {
        FactKind::Decision
    } else if has_any(REQUIREMENT_KEYWORDS) {
        FactKind::Requirement
    } else if has_any(INSIGHT_KEYWORDS) {
        FactKind::Insight
    } else {
        FactKind::Fact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_bullets_and_numbered_items() {
        let text = "\
# Findings
Intro paragraph that is not a list item at all.
- The market grew by 12 percent last year
* We recommend a premium pricing tier
• Buyers need offline support in the app
> Analysis indicates demand keeps rising
1. Three competitors dominate the segment
12. Short";

        let facts = FactExtractor::new().extract(text, "analyst", "Market Analyst");
        let kinds: Vec<_> = facts.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FactKind::Fact,
                FactKind::Decision,
                FactKind::Requirement,
                FactKind::Insight,
                FactKind::Fact,
            ]
        );
        assert_eq!(facts[0].content, "The market grew by 12 percent last year");
        assert_eq!(facts[4].content, "Three competitors dominate the segment");
        assert!(facts.iter().all(|f| f.confidence == 0.7));
        assert!(facts.iter().all(|f| f.source_agent == "analyst"));
        assert!(facts.iter().all(|f| f.source_role == "Market Analyst"));
    }

    #[test]
    fn test_bounds_on_length_and_count() {
        let long = format!("- {}", "x".repeat(500));
        let exactly_ten = "- abcdefghij";
        let text = format!("{}\n{}\n- eleven chars", long, exactly_ten);
        let facts = FactExtractor::new().extract(&text, "a", "R");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "eleven chars");

        let many: String = (0..25)
            .map(|i| format!("- observation number {}\n", i))
            .collect();
        let facts = FactExtractor::new().extract(&many, "a", "R");
        assert_eq!(facts.len(), 10);
        assert_eq!(facts[9].content, "observation number 9");
    }

    #[test]
    fn test_empty_and_plain_text() {
        let ex = FactExtractor::new();
        assert!(ex.extract("", "a", "R").is_empty());
        assert!(ex.extract("   \n\t", "a", "R").is_empty());
        assert!(ex.extract("Just a paragraph of prose without structure.", "a", "R").is_empty());
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(classify("You should have a backup plan"), FactKind::Decision);
        assert_eq!(classify("It is critical to ship on time"), FactKind::Requirement);
        assert_eq!(classify("We expect costs to fall"), FactKind::Insight);
        assert_eq!(classify("Revenue was flat"), FactKind::Fact);
    }
}
