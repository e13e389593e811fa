use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Functional bucket of a request. Selects the keyword list used for scoring.
///
/// Unknown strings deserialize to `Other`, which scores zero in the category
/// bucket instead of rejecting the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    CareerAdvice,
    GenerateResume,
    MockInterview,
    LearningResources,
    #[serde(other)]
    Other,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::CareerAdvice => "career-advice",
            TaskCategory::GenerateResume => "generate-resume",
            TaskCategory::MockInterview => "mock-interview",
            TaskCategory::LearningResources => "learning-resources",
            TaskCategory::Other => "other",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => Grade::A,
            s if s >= 60 => Grade::B,
            s if s >= 40 => Grade::C,
            _ => Grade::D,
        }
    }
}

/// Objective statistics derived from an input/output text pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    /// 8-char hex fingerprint of input + output. Identical pairs share an id.
    pub response_id: String,
    pub response_time_seconds: f64,
    pub input_length: usize,
    pub output_length: usize,
    pub input_word_count: usize,
    pub output_word_count: usize,
    pub compression_ratio: f64,
    pub words_per_second: f64,
    pub has_structured_format: bool,
    pub has_quantified_data: bool,
    pub completeness_score: f64, // 0.0 – 1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityResult {
    pub score: u32, // 0 – 100
    pub grade: Grade,
    pub factors: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub rating: u8, // 1 – 5
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One completed request. Only `user_feedback` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRecord {
    pub timestamp: DateTime<Utc>,
    pub task_category: TaskCategory,
    pub input_text: String,
    pub output_text: String,
    pub processing_time_seconds: f64,
    pub metrics: Metrics,
    pub quality: QualityResult,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub user_feedback: Option<Feedback>,
}

impl EvaluationRecord {
    pub fn response_id(&self) -> &str {
        &self.metrics.response_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryStats {
    pub count: usize,
    pub avg_quality: f64,
    pub avg_processing_time: f64,
}

/// Aggregate view over every stored record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateStats {
    pub count: usize,
    pub avg_quality_score: f64,
    pub avg_processing_time: f64,
    pub avg_output_length: f64,
    /// Only grades that occur at least once are present.
    pub grade_distribution: BTreeMap<Grade, usize>,
    pub per_category_stats: BTreeMap<TaskCategory, CategoryStats>,
    /// Records carrying user feedback, and their mean rating (None when zero).
    pub feedback_count: usize,
    pub avg_feedback_rating: Option<f64>,
}
