//! Run orchestrators
//!
//! `ValidationService` drives the full scan/classify/report pipeline;
//! `RepairService` drives the syntactic-only repair run that feeds the
//! worker queue and folds the result messages into a repair report. Both are
//! single-shot: a run goes to completion, there is no mid-flight cancel.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use marina_core::models::{
    FixedUrlRecord, RepairOutcome, RepairReason, RepairReport, RepairResult, RepairTask,
    ValidationReport, ValidationResult, REPAIR_RESULT_TOPIC, REPAIR_TOPIC,
};
use marina_core::{AppError, Config, TaskError, TaskResultExt};
use marina_db::DocumentStore;
use marina_queue::{Message, MessageHandler, Queue};

use crate::classifier::{classify_syntactic, Classifier};
use crate::reporter::{RepairTallies, Reporter, RunAggregator};
use crate::scanner::scan_document;

pub struct ValidationService {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<Classifier>,
    queue: Arc<dyn Queue>,
    /// Without a reporter the report is returned but not persisted
    /// (single-process memory runs).
    reporter: Option<Reporter>,
    collections: Vec<String>,
    validator_concurrency: usize,
    max_scan_depth: usize,
    enqueue_repairs: bool,
}

impl ValidationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        classifier: Arc<Classifier>,
        queue: Arc<dyn Queue>,
        reporter: Option<Reporter>,
        config: &Config,
        enqueue_repairs: bool,
    ) -> Self {
        Self {
            store,
            classifier,
            queue,
            reporter,
            collections: config.collections.clone(),
            validator_concurrency: config.validator_concurrency,
            max_scan_depth: config.max_scan_depth,
            enqueue_repairs,
        }
    }

    /// Validate every configured collection and produce one report.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<ValidationReport, AppError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        if self.enqueue_repairs {
            self.queue.ensure_topic(REPAIR_TOPIC).await?;
        }

        let mut aggregator = RunAggregator::new();
        let semaphore = Arc::new(Semaphore::new(self.validator_concurrency));
        let mut enqueued = 0u64;

        for collection in &self.collections {
            let documents = self.store.list_documents(collection).await?;
            tracing::info!(collection, count = documents.len(), "Scanning collection");

            for document in documents {
                aggregator.note_document(collection);
                let references =
                    scan_document(collection, &document.id, &document.data, self.max_scan_depth);

                let mut classifications: JoinSet<ValidationResult> = JoinSet::new();
                for reference in references {
                    let permit = semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Internal(format!("Semaphore closed: {e}")))?;
                    let classifier = self.classifier.clone();
                    let collection = collection.clone();
                    let doc_id = document.id.clone();
                    classifications.spawn(async move {
                        let _permit = permit;
                        classifier.classify(&collection, &doc_id, reference).await
                    });
                }

                while let Some(joined) = classifications.join_next().await {
                    let result = joined
                        .map_err(|e| AppError::Internal(format!("Classification task failed: {e}")))?;
                    if self.enqueue_repairs {
                        enqueued += self.maybe_enqueue_repair(run_id, &result).await?;
                    }
                    aggregator.record(&result);
                }
            }
        }

        let stats = aggregator.finish();
        let execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            total_urls = stats.total_urls,
            valid_urls = stats.valid_urls,
            invalid_urls = stats.invalid_urls,
            repairs_enqueued = enqueued,
            execution_time_ms,
            "Validation run complete"
        );

        match &self.reporter {
            Some(reporter) => reporter.persist_validation(&stats, execution_time_ms).await,
            None => Ok(ValidationReport {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                stats,
                execution_time_ms,
            }),
        }
    }

    async fn maybe_enqueue_repair(
        &self,
        run_id: Uuid,
        result: &ValidationResult,
    ) -> Result<u64, AppError> {
        if !result.status.is_repairable() {
            return Ok(0);
        }
        let Ok(reason) = RepairReason::try_from(result.status) else {
            return Ok(0);
        };
        let task = RepairTask {
            run_id,
            collection: result.collection.clone(),
            doc_id: result.doc_id.clone(),
            path: result.reference.path.clone(),
            old_url: result.reference.url.clone(),
            reason,
            declared_type: result.reference.declared_type,
        };
        self.queue
            .publish(REPAIR_TOPIC, serde_json::to_value(&task)?)
            .await?;
        Ok(1)
    }
}

pub struct RepairService {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn Queue>,
    reporter: Option<Reporter>,
    collections: Vec<String>,
    max_scan_depth: usize,
    /// Upper bound on waiting for result messages; the run finishes early
    /// once every published task is accounted for.
    result_wait: std::time::Duration,
}

impl RepairService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: Arc<dyn Queue>,
        reporter: Option<Reporter>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            queue,
            reporter,
            collections: config.collections.clone(),
            max_scan_depth: config.max_scan_depth,
            result_wait: config.queue_redelivery,
        }
    }

    /// Scan, publish a repair task per syntactically repairable URL, then
    /// collect worker results into a persisted repair report. Only syntactic
    /// classification runs here; no probes.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<RepairReport, AppError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        self.queue.ensure_topic(REPAIR_TOPIC).await?;
        self.queue.ensure_topic(REPAIR_RESULT_TOPIC).await?;

        let (tx, mut rx) = mpsc::channel::<RepairResult>(256);
        let subscription = self
            .queue
            .subscribe(REPAIR_RESULT_TOPIC, Arc::new(ResultCollector { tx, run_id }))
            .await?;

        let mut expected = 0u64;
        for collection in &self.collections {
            for document in self.store.list_documents(collection).await? {
                for reference in
                    scan_document(collection, &document.id, &document.data, self.max_scan_depth)
                {
                    let Some(status) = classify_syntactic(&reference.url) else {
                        continue;
                    };
                    let Ok(reason) = RepairReason::try_from(status) else {
                        continue;
                    };
                    let task = RepairTask {
                        run_id,
                        collection: collection.clone(),
                        doc_id: document.id.clone(),
                        path: reference.path,
                        old_url: reference.url,
                        reason,
                        declared_type: reference.declared_type,
                    };
                    self.queue
                        .publish(REPAIR_TOPIC, serde_json::to_value(&task)?)
                        .await?;
                    expected += 1;
                }
            }
        }
        tracing::info!(expected, "Repair tasks published, awaiting results");

        let mut tallies = RepairTallies::default();
        let mut records = Vec::new();
        let deadline = tokio::time::Instant::now() + self.result_wait;
        while tallies.attempted < expected {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(result)) => {
                    tallies.record(result.outcome);
                    if result.outcome == RepairOutcome::Fixed {
                        if let Some(new_url) = result.new_url {
                            records.push(FixedUrlRecord {
                                doc_id: result.task.doc_id,
                                collection: result.task.collection,
                                field: FixedUrlRecord::field_from_path(&result.task.path),
                                field_path: result.task.path,
                                old_url: result.task.old_url,
                                new_url,
                            });
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        received = tallies.attempted,
                        expected,
                        "Timed out waiting for repair results"
                    );
                    break;
                }
            }
        }
        subscription.close().await;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            attempted = tallies.attempted,
            fixed = tallies.fixed,
            already_fixed = tallies.already_fixed,
            skipped = tallies.skipped,
            failed = tallies.failed,
            execution_time_ms,
            "Repair run complete"
        );

        match &self.reporter {
            Some(reporter) => {
                reporter
                    .persist_repair(&tallies, execution_time_ms, &records)
                    .await
            }
            None => Ok(RepairReport {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                attempted: tallies.attempted,
                fixed: tallies.fixed,
                already_fixed: tallies.already_fixed,
                skipped: tallies.skipped,
                failed: tallies.failed,
                execution_time_ms,
            }),
        }
    }
}

/// Forwards this run's result messages into the run's channel. Results
/// stamped with another run's id are stale (published while no run was
/// subscribed) and are dropped; counting them would attribute a different
/// run's outcomes to this report. A closed channel nacks so a result
/// published during shutdown is not lost.
struct ResultCollector {
    tx: mpsc::Sender<RepairResult>,
    run_id: Uuid,
}

#[async_trait]
impl MessageHandler for ResultCollector {
    async fn handle(&self, message: &Message) -> Result<(), TaskError> {
        let result: RepairResult =
            serde_json::from_value(message.payload.clone()).unrecoverable()?;
        if result.task.run_id != self.run_id {
            tracing::warn!(
                message_id = %message.id,
                result_run_id = %result.task.run_id,
                "Dropping repair result from another run"
            );
            return Ok(());
        }
        self.tx
            .send(result)
            .await
            .map_err(|_| TaskError::recoverable(anyhow::anyhow!("Result channel closed")))?;
        Ok(())
    }
}
