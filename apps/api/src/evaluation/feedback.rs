//! Feedback linking — attaches user ratings to stored evaluations by response id.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::evaluation::models::Feedback;
use crate::evaluation::store::EvaluationStore;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum FeedbackError {
    #[error("No evaluation with response_id '{0}'")]
    NotFound(String),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),
}

#[derive(Clone)]
pub struct FeedbackLinker {
    store: Arc<EvaluationStore>,
}

impl FeedbackLinker {
    pub fn new(store: Arc<EvaluationStore>) -> Self {
        Self { store }
    }

    /// Sets `user_feedback` on the first record whose response id matches.
    ///
    /// Replaces any earlier feedback (last write wins) and persists the store.
    /// On `NotFound` the store is untouched.
    pub async fn attach(
        &self,
        response_id: &str,
        rating: i64,
        text: &str,
    ) -> Result<(), FeedbackError> {
        let rating = validate_rating(rating)?;
        let feedback = Feedback {
            rating,
            text: text.to_string(),
            timestamp: Utc::now(),
        };

        let attached = self
            .store
            .update_first(
                |r| r.response_id() == response_id,
                |r| r.user_feedback = Some(feedback),
            )
            .await;

        if !attached {
            return Err(FeedbackError::NotFound(response_id.to_string()));
        }

        info!("Attached rating {rating}/5 to evaluation {response_id}");
        Ok(())
    }
}

fn validate_rating(rating: i64) -> Result<u8, FeedbackError> {
    if (MIN_RATING as i64..=MAX_RATING as i64).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(FeedbackError::InvalidRating(rating))
    }
}
