// Persistence boundary used by analysis runs

use crate::data::JobStatus;
use crate::error::Result;
use pageprobe_scanner::{AnalysisResult, BrokenLink};

/// What an analysis run needs from storage. Implementations serialize
/// conflicting writes to the same job themselves.
pub trait ResultStore: Send + Sync {
    /// Deletes any stored result for `job_id`, inserts `result` and returns the
    /// new result id. Broken links are not written here.
    fn replace_result(&self, job_id: i64, result: &AnalysisResult) -> Result<i64>;

    fn insert_broken_link(&self, result_id: i64, link: &BrokenLink) -> Result<i64>;

    fn set_job_status(&self, job_id: i64, status: JobStatus) -> Result<()>;
}
