use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use pageprobe_core::analysis::{JobOutcome, JobRunner};
use pageprobe_core::data::{Database, Job, JobSort, JobStatus, SortOrder};
use pageprobe_core::report::{
    ReportFormat, format_iso8601_timestamp, generate_json_report, generate_text_report, save_report,
};
use pageprobe_scanner::{ScanConfig, Scanner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

// Helper functions for job intake

/// Collect target URLs from the positional arguments or a hosts file
pub fn load_urls_from_source(
    urls: &[String],
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        return load_urls_from_file(hosts_file_path);
    }

    let parsed: Vec<String> = urls
        .iter()
        .filter_map(|url| parse_url_line(url.trim()))
        .collect();

    if urls.is_empty() {
        Err("Either a URL or --hosts-file must be provided".to_string())
    } else if parsed.is_empty() {
        Err("None of the given URLs are valid".to_string())
    } else {
        Ok(parsed)
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as an http(s) URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let is_web = |url: &Url| matches!(url.scheme(), "http" | "https") && url.has_host();

    if Url::parse(line).is_ok_and(|url| is_web(&url)) {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|url| is_web(&url)) {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow().bold(), line);
    None
}

pub fn resolve_db_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Opens the database, creating its parent directory on first use.
pub fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Database::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Builds the scanner configuration from the `--timeout`, `--probe-timeout`
/// and `--probe-workers` flags, falling back to library defaults.
pub fn scan_config_from_args(args: &ArgMatches) -> ScanConfig {
    let mut config = ScanConfig::new();
    if let Some(secs) = args.get_one::<u64>("timeout") {
        config = config.with_fetch_timeout(Duration::from_secs(*secs));
    }
    if let Some(secs) = args.get_one::<u64>("probe-timeout") {
        config = config.with_probe_timeout(Duration::from_secs(*secs));
    }
    if let Some(workers) = args.get_one::<usize>("probe-workers") {
        config = config.with_probe_concurrency(*workers);
    }
    config
}

fn report_format_from_args(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn status_label(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Queued => status.as_str().blue(),
        JobStatus::Running => status.as_str().yellow(),
        JobStatus::Completed => status.as_str().green(),
        JobStatus::Failed => status.as_str().red(),
    }
}

pub fn describe_outcome(job_id: i64, outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed { result_id } => {
            format!("Job {} completed (result {})", job_id, result_id)
        }
        JobOutcome::Failed { reason } => format!("Job {} failed: {}", job_id, reason),
        JobOutcome::Cancelled => format!("Job {} stopped", job_id),
    }
}

fn print_outcome(job_id: i64, outcome: &JobOutcome) {
    let marker = match outcome {
        JobOutcome::Completed { .. } => "✓".green().bold(),
        JobOutcome::Failed { .. } => "✗".red().bold(),
        JobOutcome::Cancelled => "→".yellow().bold(),
    };
    println!("{} {}", marker, describe_outcome(job_id, outcome));
}

fn spinner(quiet: bool, message: String) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message);
    Ok(spinner)
}

/// Highlights broken-link entries of a plain text report for terminal output.
pub fn colorize_text_report(report: &str) -> String {
    report
        .lines()
        .map(|line| match line.strip_prefix("  ✗ ") {
            Some(entry) => {
                let (url, reason) = entry.split_once(" - ").unwrap_or((entry, ""));
                let mut line = format!("  {} {}", "✗".red().bold(), url);
                if !reason.is_empty() {
                    line.push_str(&format!(" {}", reason.bright_black()));
                }
                line
            }
            None => line.to_string(),
        })
        .map(|line| line + "\n")
        .collect()
}

fn emit_report(
    db: &Database,
    job_id: i64,
    format: ReportFormat,
    output: Option<&PathBuf>,
) -> Result<()> {
    let job = db
        .get_job(job_id)?
        .ok_or_else(|| anyhow!("Job {} not found", job_id))?;
    let stored = db.get_result(job_id)?.ok_or_else(|| {
        anyhow!(
            "Job {} has no stored analysis (status: {})",
            job_id,
            job.status.as_str()
        )
    })?;

    let content = match format {
        ReportFormat::Text => generate_text_report(&job, &stored),
        ReportFormat::Json => generate_json_report(&job, &stored)?,
    };

    match output {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None if format == ReportFormat::Text => print!("{}", colorize_text_report(&content)),
        None => print!("{}", content),
    }
    Ok(())
}

pub fn handle_init(args: &ArgMatches, db_path: &Path) -> Result<()> {
    let force = args.get_flag("force");

    print_divider();
    println!("{}", "  PAGEPROBE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    if Database::exists(db_path) {
        if !force {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!(
                "Database already exists at {}",
                db_path.display().to_string().bright_white()
            );
            println!("Use {} to recreate it.", "--force".cyan());
            return Ok(());
        }
        Database::drop(db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        println!("{} Existing database removed", "✓".green().bold());
    }

    println!("{} Creating database...", "→".blue());
    open_database(db_path)?;
    println!(
        "{} Database created at {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    Ok(())
}

pub fn handle_add(args: &ArgMatches, db_path: &Path) -> Result<()> {
    let urls: Vec<String> = args
        .get_many::<String>("URL")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let hosts_file = args.get_one::<PathBuf>("hosts-file");

    let urls = load_urls_from_source(&urls, hosts_file).map_err(|e| anyhow!(e))?;
    let db = open_database(db_path)?;

    for url in urls {
        let job_id = db.create_job(&url)?;
        println!(
            "{} Queued job {} for {}",
            "✓".green().bold(),
            job_id.to_string().bright_white(),
            url
        );
    }
    Ok(())
}

pub fn handle_list(args: &ArgMatches, db_path: &Path) -> Result<()> {
    let page = args.get_one::<usize>("page").copied().unwrap_or(1);
    let page_size = args.get_one::<usize>("page-size").copied().unwrap_or(20);
    let sort = args
        .get_one::<String>("sort")
        .and_then(|s| JobSort::from_str(s))
        .unwrap_or(JobSort::Id);
    let order = args
        .get_one::<String>("order")
        .and_then(|s| SortOrder::from_str(s))
        .unwrap_or(SortOrder::Desc);

    let db = open_database(db_path)?;
    let listing = db.list_jobs(page, page_size, sort, order)?;

    if listing.jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{}",
        format!("{:>6}  {:<10}  {:<25}  {}", "ID", "STATUS", "CREATED", "URL").bold()
    );
    for job in &listing.jobs {
        print_job_row(job);
    }
    println!(
        "\nPage {} of {} ({} job(s))",
        listing.page,
        listing.total_pages.max(1),
        listing.total
    );
    Ok(())
}

fn print_job_row(job: &Job) {
    println!(
        "{:>6}  {:<10}  {:<25}  {}",
        job.id,
        status_label(job.status),
        format_iso8601_timestamp(job.created_at),
        job.url
    );
}

pub async fn handle_analyze(args: &ArgMatches, db_path: &Path, quiet: bool) -> Result<()> {
    let raw = args
        .get_one::<String>("URL")
        .ok_or_else(|| anyhow!("A URL is required"))?;
    let url = parse_url_line(raw.trim()).ok_or_else(|| anyhow!("Invalid URL '{}'", raw))?;
    let format = report_format_from_args(args);
    let output = args.get_one::<PathBuf>("output");

    let db = Arc::new(open_database(db_path)?);
    let scanner = Arc::new(Scanner::new(&scan_config_from_args(args))?);
    let runner = JobRunner::new(db.clone(), scanner);

    let job_id = db.create_job(&url)?;
    debug!("Created job {} for {}", job_id, url);

    let progress = spinner(quiet, format!("Analyzing {}", url))?;
    let handle = runner.start(job_id, url.clone())?;

    let outcome = tokio::select! {
        joined = handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            runner.stop(job_id)?;
            JobOutcome::Cancelled
        }
    };
    progress.finish_and_clear();

    match outcome {
        JobOutcome::Completed { .. } => emit_report(&db, job_id, format, output),
        JobOutcome::Failed { reason } => bail!("Analysis of {} failed: {}", url, reason),
        JobOutcome::Cancelled => {
            print_outcome(job_id, &JobOutcome::Cancelled);
            println!("Rerun it with {}", format!("pageprobe run {}", job_id).cyan());
            Ok(())
        }
    }
}

pub async fn handle_run(args: &ArgMatches, db_path: &Path, quiet: bool) -> Result<()> {
    let ids: Vec<i64> = args
        .get_many::<i64>("ID")
        .map(|values| values.copied().collect())
        .unwrap_or_default();

    let db = Arc::new(open_database(db_path)?);
    let mut jobs = Vec::with_capacity(ids.len());
    for id in ids {
        match db.get_job(id)? {
            Some(job) => jobs.push((job.id, job.url)),
            None => eprintln!("{} Job {} not found, skipping", "⚠".yellow().bold(), id),
        }
    }
    if jobs.is_empty() {
        bail!("No jobs to run");
    }

    let scanner = Arc::new(Scanner::new(&scan_config_from_args(args))?);
    let runner = JobRunner::new(db.clone(), scanner);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(jobs.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };
    progress.set_message("analyzing");

    let handles = runner.start_many(jobs);
    let collect = async {
        let mut outcomes = Vec::with_capacity(handles.len());
        for (job_id, handle) in handles {
            let outcome = handle.await;
            progress.inc(1);
            outcomes.push((job_id, outcome));
        }
        outcomes
    };

    tokio::select! {
        outcomes = collect => {
            progress.finish_and_clear();
            for (job_id, outcome) in outcomes {
                match outcome {
                    Ok(outcome) => print_outcome(job_id, &outcome),
                    Err(e) => println!("{} Job {} aborted: {}", "✗".red().bold(), job_id, e),
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            progress.finish_and_clear();
            let stopped = runner.stop_all();
            println!(
                "{} Stopped {} job(s) and returned them to the queue",
                "→".yellow().bold(),
                stopped.len()
            );
        }
    }
    Ok(())
}

pub fn handle_stop(args: &ArgMatches, db_path: &Path) -> Result<()> {
    let job_id = *args
        .get_one::<i64>("ID")
        .ok_or_else(|| anyhow!("A job id is required"))?;
    let db = open_database(db_path)?;
    db.update_job_status(job_id, JobStatus::Queued)?;
    println!("{} Job {} returned to the queue", "✓".green().bold(), job_id);
    Ok(())
}

pub fn handle_show(args: &ArgMatches, db_path: &Path) -> Result<()> {
    let job_id = *args
        .get_one::<i64>("ID")
        .ok_or_else(|| anyhow!("A job id is required"))?;
    let db = open_database(db_path)?;
    emit_report(
        &db,
        job_id,
        report_format_from_args(args),
        args.get_one::<PathBuf>("output"),
    )
}

pub fn handle_delete(args: &ArgMatches, db_path: &Path) -> Result<()> {
    let db = open_database(db_path)?;
    for job_id in args.get_many::<i64>("ID").into_iter().flatten() {
        if db.delete_job(*job_id)? {
            println!("{} Deleted job {}", "✓".green().bold(), job_id);
        } else {
            println!("{} Job {} not found", "⚠".yellow().bold(), job_id);
        }
    }
    Ok(())
}
