// Tests for analysis runs, result hand-off and job control

use pageprobe_core::analysis::{JobOutcome, JobRunner, complete, finalize, run_analysis};
use pageprobe_core::data::{Database, JobStatus};
use pageprobe_core::error::{PersistenceError, Result};
use pageprobe_core::store::ResultStore;
use pageprobe_scanner::{
    AnalysisResult, BrokenLink, CancellationToken, ScanConfig, Scanner,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// In-memory store that records every call and can be told to fail.
#[derive(Default)]
struct RecordingStore {
    fail_replace: bool,
    fail_link_urls: Vec<String>,
    calls: Mutex<Vec<String>>,
    links: Mutex<Vec<BrokenLink>>,
    statuses: Mutex<Vec<(i64, JobStatus)>>,
}

impl RecordingStore {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn last_status(&self, job_id: i64) -> Option<JobStatus> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| *id == job_id)
            .map(|(_, status)| *status)
    }
}

impl ResultStore for RecordingStore {
    fn replace_result(&self, job_id: i64, _result: &AnalysisResult) -> Result<i64> {
        self.calls.lock().unwrap().push(format!("replace:{}", job_id));
        if self.fail_replace {
            return Err(PersistenceError::InvalidValue("disk full".to_string()));
        }
        Ok(100 + job_id)
    }

    fn insert_broken_link(&self, result_id: i64, link: &BrokenLink) -> Result<i64> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("link:{}:{}", result_id, link.url));
        if self.fail_link_urls.contains(&link.url) {
            return Err(PersistenceError::InvalidValue("constraint".to_string()));
        }
        self.links.lock().unwrap().push(link.clone());
        Ok(1)
    }

    fn set_job_status(&self, job_id: i64, status: JobStatus) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("status:{}:{}", job_id, status.as_str()));
        self.statuses.lock().unwrap().push((job_id, status));
        Ok(())
    }
}

fn scanner() -> Scanner {
    Scanner::new(
        &ScanConfig::new()
            .with_fetch_timeout(Duration::from_secs(2))
            .with_probe_timeout(Duration::from_millis(500)),
    )
    .unwrap()
}

fn result_with_broken(urls: &[&str]) -> AnalysisResult {
    let mut result = AnalysisResult::new();
    for url in urls {
        result.record_broken(BrokenLink::new(url.to_string(), "link check failed"));
    }
    result
}

async fn mount_page(mock_server: &MockServer, html: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_bytes(html.as_bytes()),
        )
        .mount(mock_server)
        .await;
}

// ============================================================================
// Finalize Tests
// ============================================================================

#[test]
fn test_finalize_replaces_then_inserts_links_in_order() {
    let store = RecordingStore::default();
    let result = result_with_broken(&["http://a/1", "http://a/2"]);

    let result_id = finalize(&store, 5, &result).unwrap();

    assert_eq!(result_id, 105);
    assert_eq!(
        store.calls(),
        vec!["replace:5", "link:105:http://a/1", "link:105:http://a/2"]
    );
}

#[test]
fn test_finalize_skips_failed_link_inserts() {
    let store = RecordingStore {
        fail_link_urls: vec!["http://a/1".to_string()],
        ..RecordingStore::default()
    };
    let result = result_with_broken(&["http://a/1", "http://a/2", "http://a/3"]);

    assert!(finalize(&store, 1, &result).is_ok());

    let stored: Vec<String> = store.links.lock().unwrap().iter().map(|l| l.url.clone()).collect();
    assert_eq!(stored, vec!["http://a/2", "http://a/3"]);
}

#[test]
fn test_finalize_aggregate_failure_is_fatal() {
    let store = RecordingStore {
        fail_replace: true,
        ..RecordingStore::default()
    };
    let result = result_with_broken(&["http://a/1"]);

    assert!(finalize(&store, 1, &result).is_err());
    assert_eq!(store.calls(), vec!["replace:1"]);
}

#[test]
fn test_complete_after_stop_writes_nothing() {
    let store = RecordingStore::default();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = complete(&store, 4, &result_with_broken(&["http://a/1"]), &token);

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(store.calls().is_empty());
}

#[test]
fn test_complete_marks_job_completed() {
    let store = RecordingStore::default();

    let outcome = complete(
        &store,
        4,
        &result_with_broken(&["http://a/1"]),
        &CancellationToken::new(),
    );

    assert_eq!(outcome, JobOutcome::Completed { result_id: 104 });
    assert_eq!(
        store.calls(),
        vec!["replace:4", "link:104:http://a/1", "status:4:completed"]
    );
}

// ============================================================================
// Run Tests
// ============================================================================

#[tokio::test]
async fn test_run_analysis_completes_and_stores_result() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        r#"<title>Shop</title><h1>x</h1><a href="/gone">g</a><a href="/here">h</a>"#,
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/here"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
    let job_id = db.create_job(&mock_server.uri()).unwrap();

    let outcome = run_analysis(
        &db,
        &scanner(),
        job_id,
        &mock_server.uri(),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(outcome, JobOutcome::Completed { .. }));
    assert_eq!(db.get_job(job_id).unwrap().unwrap().status, JobStatus::Completed);

    let stored = db.get_result(job_id).unwrap().unwrap();
    assert_eq!(stored.result.title, "Shop");
    assert_eq!(stored.result.internal_links, 2);
    assert_eq!(stored.result.inaccessible_links, 1);
    assert_eq!(stored.result.broken_links.len(), 1);
    assert_eq!(
        stored.result.broken_links[0].url,
        format!("{}/gone", mock_server.uri())
    );
}

#[tokio::test]
async fn test_run_analysis_404_fails_without_result() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
    let job_id = db.create_job(&mock_server.uri()).unwrap();

    let outcome = run_analysis(
        &db,
        &scanner(),
        job_id,
        &mock_server.uri(),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    assert_eq!(db.get_job(job_id).unwrap().unwrap().status, JobStatus::Failed);
    assert!(db.get_result(job_id).unwrap().is_none());
}

#[tokio::test]
async fn test_run_analysis_persistence_failure_marks_failed() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "<title>ok</title>").await;

    let store = RecordingStore {
        fail_replace: true,
        ..RecordingStore::default()
    };

    let outcome = run_analysis(
        &store,
        &scanner(),
        3,
        &mock_server.uri(),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    assert_eq!(store.last_status(3), Some(JobStatus::Failed));
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let store = RecordingStore::default();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = run_analysis(&store, &scanner(), 9, "http://127.0.0.1:1/", &token).await;

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(store.calls().is_empty());
}

// ============================================================================
// Job Runner Tests
// ============================================================================

#[tokio::test]
async fn test_runner_start_many_runs_jobs_concurrently() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>t</title>")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
    let jobs: Vec<(i64, String)> = (0..4)
        .map(|i| {
            let url = format!("{}/page{}", mock_server.uri(), i);
            (db.create_job(&url).unwrap(), url)
        })
        .collect();
    let job_ids: Vec<i64> = jobs.iter().map(|(id, _)| *id).collect();

    let runner = JobRunner::new(db.clone(), Arc::new(scanner()));
    let start = std::time::Instant::now();
    let handles = runner.start_many(jobs);
    assert_eq!(handles.len(), 4);

    for (_, handle) in handles {
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { .. }));
    }
    assert!(start.elapsed() < Duration::from_millis(1200));

    for job_id in job_ids {
        assert_eq!(db.get_job(job_id).unwrap().unwrap().status, JobStatus::Completed);
    }
    assert!(runner.active_jobs().is_empty());
}

#[tokio::test]
async fn test_runner_stop_interrupts_in_flight_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>slow</title>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
    let job_id = db.create_job(&mock_server.uri()).unwrap();

    let runner = JobRunner::new(db.clone(), Arc::new(scanner()));
    let handle = runner.start(job_id, mock_server.uri()).unwrap();
    assert_eq!(db.get_job(job_id).unwrap().unwrap().status, JobStatus::Running);
    assert_eq!(runner.active_jobs(), vec![job_id]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runner.stop(job_id).unwrap());

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(db.get_job(job_id).unwrap().unwrap().status, JobStatus::Queued);
    assert!(db.get_result(job_id).unwrap().is_none());
}

#[tokio::test]
async fn test_runner_stop_idle_job_only_rewrites_status() {
    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
    let job_id = db.create_job("https://example.com").unwrap();
    db.set_job_status(job_id, JobStatus::Failed).unwrap();

    let runner = JobRunner::new(db.clone(), Arc::new(scanner()));
    assert!(!runner.stop(job_id).unwrap());
    assert_eq!(db.get_job(job_id).unwrap().unwrap().status, JobStatus::Queued);
}

#[tokio::test]
async fn test_runner_start_unknown_job_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
    let runner = JobRunner::new(db, Arc::new(scanner()));

    assert!(runner.start(77, "https://example.com".to_string()).is_err());
    assert!(runner.active_jobs().is_empty());
}
