//! Report persistence
//!
//! The reporter exclusively owns these tables; workers never write reports.
//! Validation reports are immutable after insert and superseded by newer
//! rows, never deleted.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use marina_core::models::{FixedUrlRecord, RepairReport, RunStats, ValidationReport};

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, stats))]
    pub async fn insert_validation_report(
        &self,
        stats: &RunStats,
        execution_time_ms: u64,
    ) -> Result<ValidationReport> {
        let stats_json = serde_json::to_value(stats).context("Failed to serialize run stats")?;

        let report: ValidationReport = sqlx::query_as::<Postgres, ValidationReport>(
            r#"
            INSERT INTO validation_reports (stats, execution_time_ms)
            VALUES ($1, $2)
            RETURNING id, created_at, stats, execution_time_ms
            "#,
        )
        .bind(stats_json)
        .bind(execution_time_ms as i64)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert validation report")?;

        tracing::info!(
            report_id = %report.id,
            total_urls = stats.total_urls,
            valid_urls = stats.valid_urls,
            invalid_urls = stats.invalid_urls,
            "Validation report written"
        );

        Ok(report)
    }

    /// The report with the newest `created_at`; `None` means no prior run.
    #[tracing::instrument(skip(self))]
    pub async fn latest_report(&self) -> Result<Option<ValidationReport>> {
        let report = sqlx::query_as::<Postgres, ValidationReport>(
            r#"
            SELECT id, created_at, stats, execution_time_ms
            FROM validation_reports
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest validation report")?;

        Ok(report)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_reports(&self, limit: i64) -> Result<Vec<ValidationReport>> {
        let reports = sqlx::query_as::<Postgres, ValidationReport>(
            r#"
            SELECT id, created_at, stats, execution_time_ms
            FROM validation_reports
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list validation reports")?;

        Ok(reports)
    }

    #[tracing::instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_repair_report(
        &self,
        attempted: u64,
        fixed: u64,
        already_fixed: u64,
        skipped: u64,
        failed: u64,
        execution_time_ms: u64,
    ) -> Result<RepairReport> {
        let report = sqlx::query_as::<Postgres, RepairReport>(
            r#"
            INSERT INTO repair_reports (
                attempted, fixed, already_fixed, skipped, failed, execution_time_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
                id, created_at, attempted, fixed, already_fixed, skipped, failed,
                execution_time_ms
            "#,
        )
        .bind(attempted as i64)
        .bind(fixed as i64)
        .bind(already_fixed as i64)
        .bind(skipped as i64)
        .bind(failed as i64)
        .bind(execution_time_ms as i64)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert repair report")?;

        tracing::info!(
            report_id = %report.id,
            attempted = attempted,
            fixed = fixed,
            "Repair report written"
        );

        Ok(report)
    }

    /// Batch-insert the fixed-URL detail records for a repair report. A
    /// failure here must not corrupt the already-written aggregate; callers
    /// log and continue.
    #[tracing::instrument(skip(self, records))]
    pub async fn insert_fixed_urls(
        &self,
        report_id: Uuid,
        records: &[FixedUrlRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for fixed-url batch")?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO fixed_url_records (
                    report_id, doc_id, collection, field, field_path, old_url, new_url
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(report_id)
            .bind(&record.doc_id)
            .bind(&record.collection)
            .bind(&record.field)
            .bind(&record.field_path)
            .bind(&record.old_url)
            .bind(&record.new_url)
            .execute(&mut *tx)
            .await
            .context("Failed to insert fixed-url record")?;
        }

        tx.commit()
            .await
            .context("Failed to commit fixed-url batch")?;

        tracing::info!(
            report_id = %report_id,
            count = records.len(),
            "Fixed-url batch written"
        );

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_repair_reports(&self, limit: i64) -> Result<Vec<RepairReport>> {
        let reports = sqlx::query_as::<Postgres, RepairReport>(
            r#"
            SELECT
                id, created_at, attempted, fixed, already_fixed, skipped, failed,
                execution_time_ms
            FROM repair_reports
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list repair reports")?;

        Ok(reports)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fixed_urls_for_report(&self, report_id: Uuid) -> Result<Vec<FixedUrlRecord>> {
        let records = sqlx::query_as::<Postgres, FixedUrlRecord>(
            r#"
            SELECT doc_id, collection, field, field_path, old_url, new_url
            FROM fixed_url_records
            WHERE report_id = $1
            ORDER BY collection, doc_id, field_path
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch fixed-url records")?;

        Ok(records)
    }
}
