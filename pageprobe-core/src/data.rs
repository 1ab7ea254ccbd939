use crate::error::{PersistenceError, Result};
use crate::store::ResultStore;
use pageprobe_scanner::{AnalysisResult, BrokenLink, HeadingCounts, MarkupVersion};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct Database {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSort {
    Id,
    Url,
    Status,
    CreatedAt,
}

impl JobSort {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "id" => Some(JobSort::Id),
            "url" => Some(JobSort::Url),
            "status" => Some(JobSort::Status),
            "created_at" | "created" => Some(JobSort::CreatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            JobSort::Id => "id",
            JobSort::Url => "url",
            JobSort::Status => "status",
            JobSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub url: String,
    pub status: JobStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: i64,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// A persisted analysis together with the broken links that were written for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: i64,
    pub job_id: i64,
    pub created_at: i64,
    pub result: AnalysisResult,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status: String = row.get(2)?;
    let status = JobStatus::from_str(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown job status '{}'", status).into(),
        )
    })?;

    Ok(Job {
        id: row.get(0)?,
        url: row.get(1)?,
        status,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    // A poisoned lock still guards a usable connection
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued'
        CHECK(status IN ('queued', 'running', 'completed', 'failed')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

-- One aggregate row per job; replaced on every rerun
CREATE TABLE IF NOT EXISTS analysis_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL DEFAULT '',
    markup_version TEXT NOT NULL CHECK(markup_version IN ('HTML5', 'XHTML')),
    h1_count INTEGER NOT NULL DEFAULT 0,
    h2_count INTEGER NOT NULL DEFAULT 0,
    h3_count INTEGER NOT NULL DEFAULT 0,
    h4_count INTEGER NOT NULL DEFAULT 0,
    h5_count INTEGER NOT NULL DEFAULT 0,
    h6_count INTEGER NOT NULL DEFAULT 0,
    internal_links INTEGER NOT NULL DEFAULT 0,
    external_links INTEGER NOT NULL DEFAULT 0,
    inaccessible_links INTEGER NOT NULL DEFAULT 0,
    has_login_form BOOLEAN NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,

    FOREIGN KEY(job_id) REFERENCES jobs(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS broken_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    status_code INTEGER NOT NULL DEFAULT 0,
    reason TEXT,
    created_at INTEGER NOT NULL,

    FOREIGN KEY(result_id) REFERENCES analysis_results(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_broken_links_result ON broken_links(result_id);
            ",
        )?;
        Ok(())
    }

    // Job management
    pub fn create_job(&self, url: &str) -> Result<i64> {
        let timestamp = current_timestamp();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO jobs (url, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![url, JobStatus::Queued.as_str(), timestamp],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_job(&self, job_id: i64) -> Result<Option<Job>> {
        let job = self
            .conn()
            .query_row(
                "SELECT id, url, status, created_at, updated_at FROM jobs WHERE id = ?1",
                params![job_id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    /// One page of jobs. `page` is 1-based; a zero page or page size is clamped to 1.
    pub fn list_jobs(
        &self,
        page: usize,
        page_size: usize,
        sort: JobSort,
        order: SortOrder,
    ) -> Result<JobPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let conn = self.conn();

        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let offset = (page - 1)
            .checked_mul(page_size)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(|| {
                PersistenceError::InvalidValue(format!("page {} is out of range", page))
            })?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;

        // Column and direction come from closed enums, never from user text
        let query = format!(
            "SELECT id, url, status, created_at, updated_at FROM jobs
             ORDER BY {} {}, id {}
             LIMIT ?1 OFFSET ?2",
            sort.column(),
            order.keyword(),
            order.keyword()
        );
        let mut stmt = conn.prepare(&query)?;
        let jobs = stmt
            .query_map(
                params![limit, offset],
                job_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let total_pages = (total as usize).div_ceil(page_size);

        Ok(JobPage {
            jobs,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    pub fn delete_job(&self, job_id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM jobs WHERE id = ?1", params![job_id])?;
        Ok(deleted > 0)
    }

    pub fn update_job_status(&self, job_id: i64, status: JobStatus) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), current_timestamp(), job_id],
        )?;
        if updated == 0 {
            return Err(PersistenceError::InvalidValue(format!(
                "job {} does not exist",
                job_id
            )));
        }
        Ok(())
    }

    // Result operations
    pub fn save_result(&self, job_id: i64, result: &AnalysisResult) -> Result<i64> {
        let conn = self.conn();

        conn.execute(
            "DELETE FROM analysis_results WHERE job_id = ?1",
            params![job_id],
        )?;

        let counts = &result.heading_counts;
        conn.execute(
            "INSERT INTO analysis_results (
                job_id, title, markup_version, h1_count, h2_count, h3_count,
                h4_count, h5_count, h6_count, internal_links, external_links,
                inaccessible_links, has_login_form, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                job_id,
                &result.title,
                result.markup_version.as_str(),
                counts.h1 as i64,
                counts.h2 as i64,
                counts.h3 as i64,
                counts.h4 as i64,
                counts.h5 as i64,
                counts.h6 as i64,
                result.internal_links as i64,
                result.external_links as i64,
                result.inaccessible_links as i64,
                result.has_login_form,
                current_timestamp(),
            ],
        )?;

        let result_id = conn.last_insert_rowid();
        debug!("Stored result {} for job {}", result_id, job_id);
        Ok(result_id)
    }

    pub fn add_broken_link(&self, result_id: i64, link: &BrokenLink) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO broken_links (result_id, url, status_code, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result_id,
                &link.url,
                link.status_code,
                &link.reason,
                current_timestamp()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_result(&self, job_id: i64) -> Result<Option<StoredResult>> {
        let conn = self.conn();

        let stored = conn
            .query_row(
                "SELECT id, job_id, created_at, title, markup_version,
                        h1_count, h2_count, h3_count, h4_count, h5_count, h6_count,
                        internal_links, external_links, inaccessible_links, has_login_form
                 FROM analysis_results WHERE job_id = ?1",
                params![job_id],
                |row| {
                    let markup: String = row.get(4)?;
                    let mut heading_counts = HeadingCounts::default();
                    for level in 1..=6u8 {
                        let count: i64 = row.get(4 + level as usize)?;
                        heading_counts.set(level, count as usize);
                    }

                    Ok((
                        markup,
                        StoredResult {
                            id: row.get(0)?,
                            job_id: row.get(1)?,
                            created_at: row.get(2)?,
                            result: AnalysisResult {
                                title: row.get(3)?,
                                heading_counts,
                                internal_links: row.get::<_, i64>(11)? as usize,
                                external_links: row.get::<_, i64>(12)? as usize,
                                inaccessible_links: row.get::<_, i64>(13)? as usize,
                                has_login_form: row.get(14)?,
                                ..AnalysisResult::default()
                            },
                        },
                    ))
                },
            )
            .optional()?;

        let Some((markup, mut stored)) = stored else {
            return Ok(None);
        };

        stored.result.markup_version = MarkupVersion::from_str(&markup).ok_or_else(|| {
            PersistenceError::InvalidValue(format!("unknown markup version '{}'", markup))
        })?;

        let mut stmt = conn.prepare(
            "SELECT url, status_code, reason FROM broken_links WHERE result_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![stored.id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        stored.result.broken_links = rows
            .into_iter()
            .map(|(url, status_code, reason)| {
                let status_code = u16::try_from(status_code).map_err(|_| {
                    PersistenceError::InvalidValue(format!(
                        "status code {} for broken link {}",
                        status_code, url
                    ))
                })?;
                Ok(BrokenLink {
                    url,
                    status_code,
                    reason: reason.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(stored))
    }
}

impl ResultStore for Database {
    fn replace_result(&self, job_id: i64, result: &AnalysisResult) -> Result<i64> {
        self.save_result(job_id, result)
    }

    fn insert_broken_link(&self, result_id: i64, link: &BrokenLink) -> Result<i64> {
        self.add_broken_link(result_id, link)
    }

    fn set_job_status(&self, job_id: i64, status: JobStatus) -> Result<()> {
        self.update_job_status(job_id, status)
    }
}
