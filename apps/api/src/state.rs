use std::sync::Arc;

use crate::config::Config;
use crate::evaluation::feedback::FeedbackLinker;
use crate::evaluation::quality::QualityEvaluator;
use crate::evaluation::store::EvaluationStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EvaluationStore>,
    pub feedback: FeedbackLinker,
    /// Pluggable quality evaluator. Default: RuleBasedEvaluator.
    pub evaluator: Arc<dyn QualityEvaluator>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<EvaluationStore>, evaluator: Arc<dyn QualityEvaluator>, config: Config) -> Self {
        Self {
            feedback: FeedbackLinker::new(store.clone()),
            store,
            evaluator,
            config,
        }
    }
}
