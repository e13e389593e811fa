//! Axum route handlers for the Evaluation API.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::evaluation::models::{
    CategoryStats, EvaluationRecord, Grade, Metrics, TaskCategory,
};
use crate::evaluation::pipeline::{evaluate_exchange, Exchange};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub task_category: TaskCategory,
    pub input_text: String,
    pub output_text: String,
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// What the LLM-calling layer echoes back to the end user next to the answer.
#[derive(Debug, Serialize)]
pub struct EvaluationSummary {
    pub response_id: String,
    pub quality_score: u32,
    pub quality_grade: Grade,
    pub quality_factors: Vec<String>,
    pub response_time: f64,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize)]
pub struct OverallStatistics {
    pub average_quality_score: f64,
    pub average_response_time: f64,
    pub average_response_length: f64,
    pub quality_grade_distribution: BTreeMap<Grade, usize>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackSummary {
    pub count: usize,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub framework: String,
    pub base_model: String,
    pub scoring: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelEvaluationResponse {
    pub total_evaluations: usize,
    pub overall_statistics: OverallStatistics,
    pub endpoint_performance: BTreeMap<TaskCategory, CategoryStats>,
    pub user_feedback: FeedbackSummary,
    pub model_info: ModelInfo,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub total_conversations: usize,
    pub conversations: Vec<EvaluationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub response_id: String,
    pub rating: i64,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
    pub response_id: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/evaluations
///
/// Scores one completed exchange, stores it, and returns the summary.
/// Unknown task categories are scored as `other` rather than rejected.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluationSummary>, AppError> {
    if !request.processing_time_seconds.is_finite() || request.processing_time_seconds < 0.0 {
        return Err(AppError::Validation(
            "processing_time_seconds must be a non-negative number".to_string(),
        ));
    }

    let record = evaluate_exchange(
        state.evaluator.as_ref(),
        Exchange {
            task_category: request.task_category,
            input_text: &request.input_text,
            output_text: &request.output_text,
            processing_time_seconds: request.processing_time_seconds,
            metadata: request.metadata,
        },
    );

    let summary = EvaluationSummary {
        response_id: record.metrics.response_id.clone(),
        quality_score: record.quality.score,
        quality_grade: record.quality.grade,
        quality_factors: record.quality.factors.iter().cloned().collect(),
        response_time: record.processing_time_seconds,
        metrics: record.metrics.clone(),
    };

    state.store.append(record).await;

    Ok(Json(summary))
}

/// GET /api/v1/model-evaluation
pub async fn handle_model_evaluation(
    State(state): State<AppState>,
) -> Json<ModelEvaluationResponse> {
    let stats = state.store.aggregate().await;

    Json(ModelEvaluationResponse {
        total_evaluations: stats.count,
        overall_statistics: OverallStatistics {
            average_quality_score: stats.avg_quality_score,
            average_response_time: stats.avg_processing_time,
            average_response_length: stats.avg_output_length,
            quality_grade_distribution: stats.grade_distribution,
        },
        endpoint_performance: stats.per_category_stats,
        user_feedback: FeedbackSummary {
            count: stats.feedback_count,
            average_rating: stats.avg_feedback_rating,
        },
        model_info: ModelInfo {
            framework: state.config.model_framework.clone(),
            base_model: state.config.model_name.clone(),
            scoring: "rule-based",
        },
    })
}

/// GET /api/v1/conversation-history?limit=n
pub async fn handle_conversation_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let (total_conversations, conversations) = state.store.history(limit).await;

    Json(HistoryResponse {
        total_conversations,
        conversations,
    })
}

/// POST /api/v1/feedback
///
/// 404 echoes the unknown response_id back to the caller.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    state
        .feedback
        .attach(&request.response_id, request.rating, &request.feedback)
        .await?;

    Ok(Json(FeedbackResponse {
        status: "recorded",
        response_id: request.response_id,
    }))
}
