//! Evaluation store — append-only in-process log of evaluation records.
//!
//! Every read and mutation goes through one async mutex, so append, feedback
//! attachment and the persist that follows each mutation are serialized even
//! on the multi-threaded runtime. Persistence is best-effort: failures are
//! logged and the in-memory log is kept as is.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::evaluation::models::{AggregateStats, CategoryStats, EvaluationRecord};
use crate::evaluation::persistence::{PersistenceError, RecordSink};

pub struct EvaluationStore {
    records: Mutex<Vec<EvaluationRecord>>,
    sink: Arc<dyn RecordSink>,
    persist_timeout: Duration,
}

impl EvaluationStore {
    /// Creates an empty store. Nothing is read from the sink.
    pub fn new(sink: Arc<dyn RecordSink>, persist_timeout: Duration) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sink,
            persist_timeout,
        }
    }

    /// Creates a store seeded with whatever the sink last persisted.
    /// An unparseable log is quarantined by the sink before starting empty, so
    /// the first append cannot overwrite it.
    pub async fn open(sink: Arc<dyn RecordSink>, persist_timeout: Duration) -> Self {
        let records = match sink.load().await {
            Ok(records) => {
                info!("Loaded {} evaluation records", records.len());
                records
            }
            Err(e @ PersistenceError::Serialize(_)) => {
                match sink.quarantine().await {
                    Ok(Some(moved)) => warn!(
                        "Evaluation log is corrupt ({e}), kept at {} and starting empty",
                        moved.display()
                    ),
                    Ok(None) => warn!("Evaluation log is corrupt, starting empty: {e}"),
                    Err(q) => error!(
                        "Evaluation log is corrupt ({e}) and could not be moved aside: {q}"
                    ),
                }
                Vec::new()
            }
            Err(e) => {
                warn!("Could not load evaluation log, starting empty: {e}");
                Vec::new()
            }
        };

        Self {
            records: Mutex::new(records),
            sink,
            persist_timeout,
        }
    }

    pub async fn append(&self, record: EvaluationRecord) {
        let mut records = self.records.lock().await;
        info!(
            "Recording evaluation {} ({}, score {})",
            record.response_id(),
            record.task_category,
            record.quality.score
        );
        records.push(record);
        self.persist(&records).await;
    }

    /// All records in insertion order.
    pub async fn all(&self) -> Vec<EvaluationRecord> {
        self.records.lock().await.clone()
    }

    /// The last `n` records, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<EvaluationRecord> {
        self.history(n).await.1
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Total record count and the last `n` records, read under one lock.
    pub async fn history(&self, n: usize) -> (usize, Vec<EvaluationRecord>) {
        let records = self.records.lock().await;
        let start = records.len().saturating_sub(n);
        (records.len(), records[start..].to_vec())
    }

    /// Applies `update` to the first record matching `predicate`, then persists.
    /// Returns false (and persists nothing) when no record matches.
    pub async fn update_first<P, F>(&self, predicate: P, update: F) -> bool
    where
        P: Fn(&EvaluationRecord) -> bool,
        F: FnOnce(&mut EvaluationRecord),
    {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|r| predicate(r)) else {
            return false;
        };
        update(record);
        self.persist(&records).await;
        true
    }

    pub async fn aggregate(&self) -> AggregateStats {
        let records = self.records.lock().await;
        compute_aggregate(&records)
    }

    async fn persist(&self, records: &[EvaluationRecord]) {
        let result = match tokio::time::timeout(self.persist_timeout, self.sink.persist(records))
            .await
        {
            Ok(r) => r,
            Err(_) => Err(PersistenceError::Timeout(self.persist_timeout)),
        };

        if let Err(e) = result {
            error!(
                "Failed to persist {} evaluation records (kept in memory): {e}",
                records.len()
            );
        }
    }
}

/// Aggregates over a record slice. Empty input yields zeroed stats.
fn compute_aggregate(records: &[EvaluationRecord]) -> AggregateStats {
    if records.is_empty() {
        return AggregateStats::default();
    }

    let count = records.len();
    let mut total_quality = 0.0;
    let mut total_time = 0.0;
    let mut total_length = 0.0;
    let mut grade_distribution = BTreeMap::new();
    let mut ratings = Vec::new();

    // category → (count, quality sum, time sum)
    let mut per_category: BTreeMap<_, (usize, f64, f64)> = BTreeMap::new();

    for record in records {
        let quality = record.quality.score as f64;
        total_quality += quality;
        total_time += record.processing_time_seconds;
        total_length += record.metrics.output_length as f64;
        *grade_distribution.entry(record.quality.grade).or_insert(0) += 1;
        if let Some(feedback) = &record.user_feedback {
            ratings.push(feedback.rating as f64);
        }

        let entry = per_category.entry(record.task_category).or_default();
        entry.0 += 1;
        entry.1 += quality;
        entry.2 += record.processing_time_seconds;
    }

    let per_category_stats = per_category
        .into_iter()
        .map(|(category, (n, quality, time))| {
            (
                category,
                CategoryStats {
                    count: n,
                    avg_quality: quality / n as f64,
                    avg_processing_time: time / n as f64,
                },
            )
        })
        .collect();

    AggregateStats {
        count,
        avg_quality_score: total_quality / count as f64,
        avg_processing_time: total_time / count as f64,
        avg_output_length: total_length / count as f64,
        grade_distribution,
        per_category_stats,
        feedback_count: ratings.len(),
        avg_feedback_rating: (!ratings.is_empty())
            .then(|| ratings.iter().sum::<f64>() / ratings.len() as f64),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::evaluation::metrics::MetricsCalculator;
    use crate::evaluation::feedback::FeedbackLinker;
    use crate::evaluation::models::{Feedback, Grade, QualityResult, TaskCategory};
    use crate::evaluation::persistence::JsonFileSink;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that counts calls and always fails.
    pub(crate) struct FailingSink {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn persist(&self, _records: &[EvaluationRecord]) -> Result<(), PersistenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )))
        }

        async fn load(&self) -> Result<Vec<EvaluationRecord>, PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )))
        }
    }

    /// Sink that never finishes a write.
    struct StalledSink;

    #[async_trait]
    impl RecordSink for StalledSink {
        async fn persist(&self, _records: &[EvaluationRecord]) -> Result<(), PersistenceError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn load(&self) -> Result<Vec<EvaluationRecord>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    pub(crate) fn make_record(
        category: TaskCategory,
        output: &str,
        score: u32,
        processing_time: f64,
    ) -> EvaluationRecord {
        EvaluationRecord {
            timestamp: Utc::now(),
            task_category: category,
            input_text: "How do I move into ML engineering?".to_string(),
            output_text: output.to_string(),
            processing_time_seconds: processing_time,
            metrics: MetricsCalculator::compute(
                "How do I move into ML engineering?",
                output,
                processing_time,
            ),
            quality: QualityResult {
                score,
                grade: Grade::from_score(score),
                factors: BTreeSet::new(),
            },
            metadata: BTreeMap::new(),
            user_feedback: None,
        }
    }

    fn file_store(dir: &tempfile::TempDir) -> (EvaluationStore, Arc<JsonFileSink>) {
        let sink = Arc::new(JsonFileSink::new(dir.path().join("evals.json")));
        let store = EvaluationStore::new(sink.clone(), Duration::from_secs(5));
        (store, sink)
    }

    #[tokio::test]
    async fn test_append_then_recent_one_returns_it() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = file_store(&dir);

        store
            .append(make_record(TaskCategory::CareerAdvice, "first", 50, 1.0))
            .await;
        let latest = make_record(TaskCategory::CareerAdvice, "second", 70, 2.0);
        store.append(latest.clone()).await;

        let recent = store.recent(1).await;
        assert_eq!(recent, vec![latest]);
    }

    #[tokio::test]
    async fn test_all_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = file_store(&dir);

        for output in ["a", "b", "c"] {
            store
                .append(make_record(TaskCategory::Other, output, 10, 1.0))
                .await;
        }

        let outputs: Vec<String> = store.all().await.into_iter().map(|r| r.output_text).collect();
        assert_eq!(outputs, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_recent_more_than_stored_returns_all() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = file_store(&dir);
        store
            .append(make_record(TaskCategory::Other, "only", 10, 1.0))
            .await;

        assert_eq!(store.recent(10).await.len(), 1);
        assert!(store.recent(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_every_append_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sink) = file_store(&dir);

        store
            .append(make_record(TaskCategory::Other, "one", 10, 1.0))
            .await;
        assert_eq!(sink.load().await.unwrap().len(), 1);

        store
            .append(make_record(TaskCategory::Other, "two", 10, 1.0))
            .await;
        assert_eq!(sink.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_open_reloads_persisted_records() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sink) = file_store(&dir);
        store
            .append(make_record(TaskCategory::MockInterview, "persisted", 65, 3.0))
            .await;

        let reopened = EvaluationStore::open(sink, Duration::from_secs(5)).await;
        let records = reopened.all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].output_text, "persisted");
    }

    #[tokio::test]
    async fn test_open_with_unreadable_sink_starts_empty() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let store = EvaluationStore::open(sink, Duration::from_secs(5)).await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_record_in_memory() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let store = EvaluationStore::new(sink.clone(), Duration::from_secs(5));

        store
            .append(make_record(TaskCategory::Other, "kept", 10, 1.0))
            .await;

        assert_eq!(store.len().await, 1);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_persist_times_out() {
        let store = EvaluationStore::new(Arc::new(StalledSink), Duration::from_secs(30));

        store
            .append(make_record(TaskCategory::Other, "slow disk", 10, 1.0))
            .await;

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_first_without_match_changes_nothing() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let store = EvaluationStore::new(sink.clone(), Duration::from_secs(5));
        store
            .append(make_record(TaskCategory::Other, "x", 10, 1.0))
            .await;

        let updated = store
            .update_first(|r| r.output_text == "nope", |r| r.output_text.clear())
            .await;

        assert!(!updated);
        assert_eq!(store.all().await[0].output_text, "x");
        // Only the append persisted
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_aggregate_scores_90_50_30() {
        let records = vec![
            make_record(TaskCategory::CareerAdvice, "a", 90, 1.0),
            make_record(TaskCategory::CareerAdvice, "bb", 50, 2.0),
            make_record(TaskCategory::MockInterview, "cccc", 30, 6.0),
        ];

        let stats = compute_aggregate(&records);

        assert_eq!(stats.count, 3);
        assert!((stats.avg_quality_score - 170.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_processing_time - 3.0).abs() < 1e-9);
        assert!((stats.avg_output_length - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            stats.grade_distribution,
            BTreeMap::from([(Grade::A, 1), (Grade::C, 1), (Grade::D, 1)])
        );

        let career = &stats.per_category_stats[&TaskCategory::CareerAdvice];
        assert_eq!(career.count, 2);
        assert!((career.avg_quality - 70.0).abs() < 1e-9);
        assert!((career.avg_processing_time - 1.5).abs() < 1e-9);

        let interview = &stats.per_category_stats[&TaskCategory::MockInterview];
        assert_eq!(interview.count, 1);
        assert!((interview.avg_quality - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_store_aggregate_reflects_appends() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = file_store(&dir);
        store
            .append(make_record(TaskCategory::LearningResources, "xy", 82, 1.0))
            .await;
        store
            .append(make_record(TaskCategory::LearningResources, "xyzw", 62, 3.0))
            .await;

        let stats = store.aggregate().await;
        assert_eq!(stats.count, 2);
        assert!((stats.avg_quality_score - 72.0).abs() < 1e-9);
        assert_eq!(
            stats.grade_distribution,
            BTreeMap::from([(Grade::A, 1), (Grade::B, 1)])
        );
        assert_eq!(
            stats.per_category_stats[&TaskCategory::LearningResources].count,
            2
        );
    }

    #[test]
    fn test_aggregate_empty_is_zeroed() {
        let stats = compute_aggregate(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.avg_quality_score, 0.0);
        assert!(stats.grade_distribution.is_empty());
        assert!(stats.per_category_stats.is_empty());
        assert_eq!(stats.feedback_count, 0);
        assert_eq!(stats.avg_feedback_rating, None);
    }

    #[test]
    fn test_aggregate_averages_feedback_ratings() {
        let mut rated = make_record(TaskCategory::CareerAdvice, "a", 90, 1.0);
        rated.user_feedback = Some(Feedback {
            rating: 4,
            text: String::new(),
            timestamp: Utc::now(),
        });
        let mut also_rated = make_record(TaskCategory::CareerAdvice, "b", 50, 1.0);
        also_rated.user_feedback = Some(Feedback {
            rating: 1,
            text: "too vague".to_string(),
            timestamp: Utc::now(),
        });
        let unrated = make_record(TaskCategory::Other, "c", 30, 1.0);

        let stats = compute_aggregate(&[rated, also_rated, unrated]);

        assert_eq!(stats.feedback_count, 2);
        assert_eq!(stats.avg_feedback_rating, Some(2.5));
    }

    #[tokio::test]
    async fn test_history_counts_and_slices_together() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = file_store(&dir);
        for output in ["a", "b", "c", "d"] {
            store
                .append(make_record(TaskCategory::Other, output, 10, 1.0))
                .await;
        }

        let (total, recent) = store.history(2).await;
        assert_eq!(total, 4);
        let outputs: Vec<&str> = recent.iter().map(|r| r.output_text.as_str()).collect();
        assert_eq!(outputs, vec!["c", "d"]);

        let (total, recent) = store.history(50).await;
        assert_eq!(total, 4);
        assert_eq!(recent.len(), 4);
    }

    #[tokio::test]
    async fn test_open_moves_truncated_log_aside_before_appending() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sink) = file_store(&dir);
        for output in ["a", "b", "c"] {
            store
                .append(make_record(TaskCategory::Other, output, 10, 1.0))
                .await;
        }
        drop(store);

        // Simulate a crash that left half a document on disk
        let full = std::fs::read(sink.path()).unwrap();
        let truncated = &full[..full.len() / 2];
        std::fs::write(sink.path(), truncated).unwrap();

        let reopened = EvaluationStore::open(sink.clone(), Duration::from_secs(5)).await;
        assert_eq!(reopened.len().await, 0);
        reopened
            .append(make_record(TaskCategory::Other, "d", 10, 1.0))
            .await;

        // The damaged bytes survive next to the fresh log
        let corrupt: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with("evals.json.corrupt-")
            })
            .collect();
        assert_eq!(corrupt.len(), 1);
        assert_eq!(std::fs::read(&corrupt[0]).unwrap(), truncated);

        let live = sink.load().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].output_text, "d");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_and_feedback_stay_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sink) = file_store(&dir);
        let store = Arc::new(store);

        let seeded = make_record(TaskCategory::CareerAdvice, "seeded answer", 70, 1.0);
        let seeded_id = seeded.response_id().to_string();
        store.append(seeded).await;

        let linker = FeedbackLinker::new(store.clone());
        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let output = format!("concurrent answer {i}");
                store
                    .append(make_record(TaskCategory::Other, &output, 10, 1.0))
                    .await;
            }));
        }
        for rating in 1..=5 {
            let linker = linker.clone();
            let id = seeded_id.clone();
            tasks.push(tokio::spawn(async move {
                linker
                    .attach(&id, rating, &format!("rated {rating}"))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let in_memory = store.all().await;
        let on_disk = sink.load().await.unwrap();
        assert_eq!(in_memory.len(), 21);
        assert_eq!(on_disk.len(), 21);

        // Last persist happened under the lock after the last mutation
        let ids = |records: &[EvaluationRecord]| -> Vec<String> {
            records.iter().map(|r| r.response_id().to_string()).collect()
        };
        assert_eq!(ids(&in_memory), ids(&on_disk));

        let memory_feedback = in_memory[0].user_feedback.as_ref().unwrap();
        let disk_feedback = on_disk[0].user_feedback.as_ref().unwrap();
        assert!((1..=5).contains(&memory_feedback.rating));
        assert_eq!(memory_feedback.rating, disk_feedback.rating);
        assert_eq!(memory_feedback.text, disk_feedback.text);
    }
}
