//! Quality evaluation — pluggable, trait-based scorer for generated output text.
//!
//! Default: `RuleBasedEvaluator` (pure-Rust, deterministic, fully testable).
//!
//! `AppState` holds an `Arc<dyn QualityEvaluator>`, swapped at startup.

use std::collections::BTreeSet;

use tracing::debug;

use crate::evaluation::models::{Grade, QualityResult, TaskCategory};

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Scores a generated response for a given task category.
/// Implementations must be pure: same inputs, same result.
pub trait QualityEvaluator: Send + Sync {
    fn evaluate(&self, output_text: &str, category: TaskCategory) -> QualityResult;
}

// ────────────────────────────────────────────────────────────────────────────
// Rule tables
// ────────────────────────────────────────────────────────────────────────────

/// Distinct indicators counted for the structure bucket (presence, not multiplicity).
const STRUCTURE_INDICATORS: &[&str] = &["###", "**", "1.", "2.", "3.", "•", "-", "\n\n"];

const ACTIONABILITY_KEYWORDS: &[&str] = &[
    "step",
    "action",
    "recommendation",
    "should",
    "consider",
    "try",
    "start",
];

const TONE_KEYWORDS: &[&str] = &[
    "professional",
    "industry",
    "best practice",
    "recommend",
    "suggest",
];

const CATEGORY_CAP: u32 = 30;

/// Keyword list and weighting for one task category.
struct CategoryRule {
    keywords: &'static [&'static str],
    weight: u32,
    tag_threshold: usize,
    tag: &'static str,
}

const CAREER_ADVICE: CategoryRule = CategoryRule {
    keywords: &[
        "skill",
        "experience",
        "growth",
        "opportunity",
        "market",
        "salary",
        "trend",
    ],
    weight: 4,
    tag_threshold: 5,
    tag: "comprehensive_career_advice",
};

const GENERATE_RESUME: CategoryRule = CategoryRule {
    keywords: &[
        "achieved", "led", "managed", "improved", "increased", "%", "result",
    ],
    weight: 5,
    tag_threshold: 4,
    tag: "quantified_achievements",
};

const MOCK_INTERVIEW: CategoryRule = CategoryRule {
    keywords: &[
        "question",
        "behavior",
        "technical",
        "experience",
        "situation",
        "challenge",
    ],
    weight: 5,
    tag_threshold: 4,
    tag: "comprehensive_interview_prep",
};

const LEARNING_RESOURCES: CategoryRule = CategoryRule {
    keywords: &[
        "course", "book", "tutorial", "practice", "project", "skill", "learn",
    ],
    weight: 4,
    tag_threshold: 5,
    tag: "diverse_learning_resources",
};

fn category_rule(category: TaskCategory) -> Option<&'static CategoryRule> {
    match category {
        TaskCategory::CareerAdvice => Some(&CAREER_ADVICE),
        TaskCategory::GenerateResume => Some(&GENERATE_RESUME),
        TaskCategory::MockInterview => Some(&MOCK_INTERVIEW),
        TaskCategory::LearningResources => Some(&LEARNING_RESOURCES),
        TaskCategory::Other => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RuleBasedEvaluator — default implementation
// ────────────────────────────────────────────────────────────────────────────

/// Point-based evaluator. Five independent buckets, 100 points total:
///
/// | bucket        | max |
/// |---------------|-----|
/// | length        | 20  |
/// | structure     | 25  |
/// | category      | 30  |
/// | actionability | 15  |
/// | tone          | 10  |
///
/// Keyword matching is case-insensitive substring containment with no
/// tokenization or stemming ("led" matches "settled").
pub struct RuleBasedEvaluator;

impl QualityEvaluator for RuleBasedEvaluator {
    fn evaluate(&self, output_text: &str, category: TaskCategory) -> QualityResult {
        evaluate_rules(output_text, category)
    }
}

fn evaluate_rules(output_text: &str, category: TaskCategory) -> QualityResult {
    let lowered = output_text.to_lowercase();
    let mut factors = BTreeSet::new();

    let length = length_points(output_text.chars().count());
    let structure = structure_points(output_text, &mut factors);
    let relevance = category_points(&lowered, category, &mut factors);
    let actionability = actionability_points(&lowered, &mut factors);
    let tone = tone_points(&lowered, &mut factors);

    let score = length + structure + relevance + actionability + tone;

    debug!(
        "Quality {category}: length={length} structure={structure} relevance={relevance} \
         actionability={actionability} tone={tone} total={score}"
    );

    QualityResult {
        score,
        grade: Grade::from_score(score),
        factors,
    }
}

fn length_points(len: usize) -> u32 {
    if (200..=3000).contains(&len) {
        20
    } else if len > 100 {
        10
    } else {
        0
    }
}

fn structure_points(text: &str, factors: &mut BTreeSet<String>) -> u32 {
    let present = STRUCTURE_INDICATORS
        .iter()
        .filter(|i| text.contains(*i))
        .count();

    if present >= 5 {
        factors.insert("well_structured".to_string());
        25
    } else if present >= 2 {
        factors.insert("basic_structure".to_string());
        15
    } else {
        0
    }
}

fn category_points(lowered: &str, category: TaskCategory, factors: &mut BTreeSet<String>) -> u32 {
    let Some(rule) = category_rule(category) else {
        return 0;
    };

    let matches = count_present(lowered, rule.keywords);
    if matches >= rule.tag_threshold {
        factors.insert(rule.tag.to_string());
    }
    (matches as u32 * rule.weight).min(CATEGORY_CAP)
}

fn actionability_points(lowered: &str, factors: &mut BTreeSet<String>) -> u32 {
    let matches = count_present(lowered, ACTIONABILITY_KEYWORDS);

    if matches >= 5 {
        factors.insert("highly_actionable".to_string());
        15
    } else if matches >= 2 {
        factors.insert("somewhat_actionable".to_string());
        8
    } else {
        0
    }
}

fn tone_points(lowered: &str, factors: &mut BTreeSet<String>) -> u32 {
    if TONE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        factors.insert("professional_tone".to_string());
        10
    } else {
        0
    }
}

fn count_present(lowered: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lowered.contains(*k)).count()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
