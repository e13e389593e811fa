// Response evaluation core.
// Implements: metrics calculation, rule-based quality scoring, the persisted
// evaluation log, and feedback linking. Pure scoring lives in metrics/quality;
// only store/persistence touch I/O.

pub mod feedback;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod quality;
pub mod store;
