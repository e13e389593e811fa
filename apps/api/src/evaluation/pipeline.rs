//! Builds an `EvaluationRecord` from one completed LLM exchange.
//!
//! metrics → quality → record. The caller decides whether to store it.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::evaluation::metrics::MetricsCalculator;
use crate::evaluation::models::{EvaluationRecord, TaskCategory};
use crate::evaluation::quality::QualityEvaluator;

/// One finished request as reported by the LLM-calling layer.
pub struct Exchange<'a> {
    pub task_category: TaskCategory,
    pub input_text: &'a str,
    pub output_text: &'a str,
    pub processing_time_seconds: f64,
    pub metadata: BTreeMap<String, String>,
}

pub fn evaluate_exchange(
    evaluator: &dyn QualityEvaluator,
    exchange: Exchange<'_>,
) -> EvaluationRecord {
    let Exchange {
        task_category,
        input_text,
        output_text,
        processing_time_seconds,
        metadata,
    } = exchange;

    let metrics = MetricsCalculator::compute(input_text, output_text, processing_time_seconds);
    let quality = evaluator.evaluate(output_text, task_category);

    EvaluationRecord {
        timestamp: Utc::now(),
        task_category,
        input_text: input_text.to_string(),
        output_text: output_text.to_string(),
        processing_time_seconds,
        metrics,
        quality,
        metadata,
        user_feedback: None,
    }
}
