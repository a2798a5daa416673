//! Run aggregation and report persistence
//!
//! `RunAggregator` folds classification results into `RunStats`; recording is
//! commutative, so results may arrive in any order. `Reporter` wraps the
//! report repository and owns the aggregate-first write ordering for repair
//! runs.

use marina_core::models::{
    FixedUrlRecord, RepairOutcome, RepairReport, RunStats, UrlStatus, ValidationReport,
    ValidationResult,
};
use marina_core::AppError;
use marina_db::ReportRepository;

#[derive(Debug, Default)]
pub struct RunAggregator {
    stats: RunStats,
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_document(&mut self, collection: &str) {
        self.stats.total_documents += 1;
        self.stats
            .by_collection
            .entry(collection.to_string())
            .or_default()
            .documents += 1;
    }

    pub fn record(&mut self, result: &ValidationResult) {
        self.stats.total_fields += 1;
        self.stats.total_urls += 1;
        *self
            .stats
            .by_status
            .entry(result.status.to_string())
            .or_insert(0) += 1;

        let collection = self
            .stats
            .by_collection
            .entry(result.collection.clone())
            .or_default();
        collection.urls += 1;

        if result.status.is_valid() {
            self.stats.valid_urls += 1;
            collection.valid += 1;
        } else if result.status == UrlStatus::Missing {
            self.stats.missing_urls += 1;
            collection.missing += 1;
        } else {
            self.stats.invalid_urls += 1;
            collection.invalid += 1;
            match result.status {
                UrlStatus::Blob => collection.blob += 1,
                UrlStatus::Relative => collection.relative += 1,
                _ => {}
            }
        }
    }

    pub fn finish(self) -> RunStats {
        self.stats
    }
}

/// Outcome counts for one repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairTallies {
    pub attempted: u64,
    pub fixed: u64,
    pub already_fixed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RepairTallies {
    pub fn record(&mut self, outcome: RepairOutcome) {
        self.attempted += 1;
        match outcome {
            RepairOutcome::Fixed => self.fixed += 1,
            RepairOutcome::AlreadyFixed => self.already_fixed += 1,
            RepairOutcome::Skipped => self.skipped += 1,
            RepairOutcome::Failed => self.failed += 1,
        }
    }
}

/// Persistence facade for run reports. The reporter exclusively owns report
/// writes; workers only emit result messages.
#[derive(Clone)]
pub struct Reporter {
    repo: ReportRepository,
}

impl Reporter {
    pub fn new(repo: ReportRepository) -> Self {
        Self { repo }
    }

    pub async fn persist_validation(
        &self,
        stats: &RunStats,
        execution_time_ms: u64,
    ) -> Result<ValidationReport, AppError> {
        Ok(self
            .repo
            .insert_validation_report(stats, execution_time_ms)
            .await?)
    }

    /// `None` when no validation run has been persisted yet.
    pub async fn latest_report(&self) -> Result<Option<ValidationReport>, AppError> {
        Ok(self.repo.latest_report().await?)
    }

    pub async fn list_reports(&self, limit: i64) -> Result<Vec<ValidationReport>, AppError> {
        Ok(self.repo.list_reports(limit).await?)
    }

    /// Aggregate first, detail batch second. A detail failure is logged and
    /// swallowed so it cannot corrupt the already-written aggregate.
    pub async fn persist_repair(
        &self,
        tallies: &RepairTallies,
        execution_time_ms: u64,
        records: &[FixedUrlRecord],
    ) -> Result<RepairReport, AppError> {
        let report = self
            .repo
            .insert_repair_report(
                tallies.attempted,
                tallies.fixed,
                tallies.already_fixed,
                tallies.skipped,
                tallies.failed,
                execution_time_ms,
            )
            .await?;

        if let Err(e) = self.repo.insert_fixed_urls(report.id, records).await {
            tracing::error!(
                report_id = %report.id,
                error = %e,
                "Fixed-url batch failed, aggregate report kept"
            );
        }

        Ok(report)
    }

    pub async fn repair_history(
        &self,
        limit: i64,
    ) -> Result<Vec<(RepairReport, Vec<FixedUrlRecord>)>, AppError> {
        let reports = self.repo.list_repair_reports(limit).await?;
        let mut history = Vec::with_capacity(reports.len());
        for report in reports {
            let records = self.repo.fixed_urls_for_report(report.id).await?;
            history.push((report, records));
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marina_core::models::MediaReference;

    fn result(collection: &str, status: UrlStatus) -> ValidationResult {
        ValidationResult {
            reference: MediaReference {
                path: "mainImage".to_string(),
                url: "https://cdn.example.com/a.jpg".to_string(),
                declared_type: None,
            },
            collection: collection.to_string(),
            doc_id: "d1".to_string(),
            status,
            detail: None,
        }
    }

    #[test]
    fn by_status_sums_to_total_urls() {
        let mut aggregator = RunAggregator::new();
        aggregator.note_document("yacht_profiles");
        for status in [
            UrlStatus::Valid,
            UrlStatus::Valid,
            UrlStatus::Blob,
            UrlStatus::Relative,
            UrlStatus::Missing,
            UrlStatus::HttpError(404),
            UrlStatus::OkExtensionOverride,
        ] {
            aggregator.record(&result("yacht_profiles", status));
        }
        let stats = aggregator.finish();

        assert_eq!(stats.total_urls, 7);
        assert_eq!(stats.by_status.values().sum::<u64>(), stats.total_urls);
        assert_eq!(
            stats.valid_urls + stats.invalid_urls + stats.missing_urls,
            stats.total_urls
        );
        assert_eq!(stats.valid_urls, 3);
        assert_eq!(stats.missing_urls, 1);
        assert_eq!(stats.invalid_urls, 3);
        assert_eq!(stats.count_for(UrlStatus::HttpError(404)), 1);
    }

    #[test]
    fn per_collection_counts() {
        let mut aggregator = RunAggregator::new();
        aggregator.note_document("yacht_profiles");
        aggregator.note_document("articles_and_guides");
        aggregator.record(&result("yacht_profiles", UrlStatus::Blob));
        aggregator.record(&result("yacht_profiles", UrlStatus::Valid));
        aggregator.record(&result("articles_and_guides", UrlStatus::Relative));
        let stats = aggregator.finish();

        let yachts = &stats.by_collection["yacht_profiles"];
        assert_eq!(yachts.documents, 1);
        assert_eq!(yachts.urls, 2);
        assert_eq!(yachts.blob, 1);
        assert_eq!(yachts.valid, 1);

        let articles = &stats.by_collection["articles_and_guides"];
        assert_eq!(articles.relative, 1);
        assert_eq!(articles.invalid, 1);
    }

    #[test]
    fn recording_is_commutative() {
        let statuses = [UrlStatus::Valid, UrlStatus::Blob, UrlStatus::Missing];

        let mut forward = RunAggregator::new();
        for status in statuses {
            forward.record(&result("c", status));
        }
        let mut reverse = RunAggregator::new();
        for status in statuses.iter().rev() {
            reverse.record(&result("c", *status));
        }

        assert_eq!(forward.finish(), reverse.finish());
    }

    #[test]
    fn tallies_track_outcomes() {
        let mut tallies = RepairTallies::default();
        tallies.record(RepairOutcome::Fixed);
        tallies.record(RepairOutcome::Fixed);
        tallies.record(RepairOutcome::AlreadyFixed);
        tallies.record(RepairOutcome::Failed);
        assert_eq!(tallies.attempted, 4);
        assert_eq!(tallies.fixed, 2);
        assert_eq!(tallies.already_fixed, 1);
        assert_eq!(tallies.skipped, 0);
        assert_eq!(tallies.failed, 1);
    }
}
