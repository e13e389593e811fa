//! Metrics calculation — objective statistics for an input/output text pair.
//!
//! Pure and deterministic: identical arguments always produce identical metrics,
//! including the `response_id` fingerprint.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::evaluation::models::Metrics;

/// Any of these in the output counts as structured formatting.
const STRUCTURE_MARKERS: &[&str] = &["###", "**", "1.", "2.", "•", "-"];

/// Floor for processing time so near-zero timings don't blow up the rate.
const MIN_PROCESSING_SECONDS: f64 = 0.1;

/// Output length at which the completeness proxy saturates.
const COMPLETE_OUTPUT_CHARS: f64 = 500.0;

const RESPONSE_ID_LEN: usize = 8;

/// Digit followed within 10 characters by a percent sign. Approximate, not a number parser.
static QUANTIFIED_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d.{0,10}%").expect("Valid quantified data regex"));

pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn compute(input_text: &str, output_text: &str, processing_time: f64) -> Metrics {
        let input_length = input_text.chars().count();
        let output_length = output_text.chars().count();
        let input_word_count = input_text.split_whitespace().count();
        let output_word_count = output_text.split_whitespace().count();

        Metrics {
            response_id: response_id(input_text, output_text),
            response_time_seconds: processing_time,
            input_length,
            output_length,
            input_word_count,
            output_word_count,
            compression_ratio: output_length as f64 / input_length.max(1) as f64,
            words_per_second: output_word_count as f64
                / processing_time.max(MIN_PROCESSING_SECONDS),
            has_structured_format: STRUCTURE_MARKERS.iter().any(|m| output_text.contains(m)),
            has_quantified_data: QUANTIFIED_DATA.is_match(output_text),
            completeness_score: (output_length as f64 / COMPLETE_OUTPUT_CHARS).min(1.0),
        }
    }
}

/// Short fingerprint of `input_text ++ output_text`, used to correlate feedback.
///
/// Two requests that produce byte-identical text get the same id.
pub fn response_id(input_text: &str, output_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input_text.as_bytes());
    hasher.update(output_text.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..RESPONSE_ID_LEN].to_string()
}
