//! SQLite-backed job store.
//!
//! One row per job, one column per field. `status` and `tier` are stored as
//! their canonical lowercase names and rejected on unknown values;
//! timestamps are RFC 3339 text; absent optional fields are SQL `NULL`,
//! which is natively distinguishable from an empty string.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::job::{JobRecord, JobStatus, Tier};

use super::{Database, JobStore, StoreError};

pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &Row<'_>) -> Result<JobRecord, StoreError> {
        let tier: String = row.get("tier")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(JobRecord {
            job_id: row.get("job_id")?,
            source_path: row.get("source_path")?,
            source_lang: row.get("source_lang")?,
            target_lang: row.get("target_lang")?,
            tier: Tier::parse(&tier).ok_or(StoreError::Corrupt {
                field: "tier",
                value: tier.clone(),
            })?,
            status: JobStatus::parse(&status).ok_or(StoreError::Corrupt {
                field: "status",
                value: status.clone(),
            })?,
            progress: row.get("progress")?,
            total_pages: row.get("total_pages")?,
            processed_pages: row.get("processed_pages")?,
            extraction_output: row.get("extraction_output")?,
            translation_output: row.get("translation_output")?,
            final_output: row.get("final_output")?,
            error: row.get("error")?,
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
            revision: row.get("revision")?,
        })
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            field,
            value: value.to_string(),
        })
}

/// Fixed-width UTC rendering so `created_at` ordering matches the text
/// ordering SQLite sees.
fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl JobStore for SqliteJobStore {
    fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO jobs (job_id, source_path, source_lang, target_lang, tier,
                 status, progress, total_pages, processed_pages, extraction_output,
                 translation_output, final_output, error, created_at, updated_at, revision)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    record.job_id,
                    record.source_path,
                    record.source_lang,
                    record.target_lang,
                    record.tier.as_str(),
                    record.status.as_str(),
                    record.progress,
                    record.total_pages,
                    record.processed_pages,
                    record.extraction_output,
                    record.translation_output,
                    record.final_output,
                    record.error,
                    format_timestamp(&record.created_at),
                    format_timestamp(&record.updated_at),
                    record.revision,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::Duplicate(record.job_id.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn get(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM jobs WHERE job_id = ?1")?;
            let mut rows = stmt.query(params![job_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(Self::from_row(row)?)),
                None => Ok(None),
            }
        })
    }

    fn put(&self, record: &JobRecord) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET source_path=?2, source_lang=?3, target_lang=?4, tier=?5,
                 status=?6, progress=?7, total_pages=?8, processed_pages=?9,
                 extraction_output=?10, translation_output=?11, final_output=?12,
                 error=?13, updated_at=?14, revision=revision+1
                 WHERE job_id=?1 AND revision=?15",
                params![
                    record.job_id,
                    record.source_path,
                    record.source_lang,
                    record.target_lang,
                    record.tier.as_str(),
                    record.status.as_str(),
                    record.progress,
                    record.total_pages,
                    record.processed_pages,
                    record.extraction_output,
                    record.translation_output,
                    record.final_output,
                    record.error,
                    format_timestamp(&record.updated_at),
                    record.revision,
                ],
            )?;
            if changed == 1 {
                return Ok(record.revision + 1);
            }

            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM jobs WHERE job_id = ?1)",
                params![record.job_id],
                |row| row.get(0),
            )?;
            if exists {
                Err(StoreError::RevisionConflict {
                    job_id: record.job_id.clone(),
                    expected: record.revision,
                })
            } else {
                Err(StoreError::NotFound(record.job_id.clone()))
            }
        })
    }

    fn list_active(&self, limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM jobs WHERE status NOT IN ('completed', 'failed')
                 ORDER BY created_at DESC LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![limit as i64])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(Self::from_row(row)?);
            }
            Ok(records)
        })
    }
}
