// Report generation for stored analyses

use crate::data::{Job, StoredResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn format_iso8601_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn generate_text_report(job: &Job, stored: &StoredResult) -> String {
    let result = &stored.result;
    let mut report = String::new();

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("# Job {}: {}\n", job.id, job.url));
    report.push_str(&format!("  Status: {}\n", job.status.as_str()));
    report.push_str(&format!(
        "  Analyzed: {}\n\n",
        format_iso8601_timestamp(stored.created_at)
    ));

    report.push_str("# Summary:\n");
    let title = if result.title.is_empty() {
        "(none)"
    } else {
        result.title.as_str()
    };
    report.push_str(&format!("  Title: {}\n", title));
    report.push_str(&format!(
        "  Markup version: {}\n",
        result.markup_version.as_str()
    ));
    report.push_str(&format!(
        "  Login form: {}\n",
        if result.has_login_form { "yes" } else { "no" }
    ));

    report.push_str("\n# Headings:\n");
    for (level, count) in result.heading_counts.iter() {
        report.push_str(&format!("  h{}: {}\n", level, count));
    }

    report.push_str("\n# Links:\n");
    report.push_str(&format!("  Internal: {}\n", result.internal_links));
    report.push_str(&format!("  External: {}\n", result.external_links));
    report.push_str(&format!("  Inaccessible: {}\n", result.inaccessible_links));

    if !result.broken_links.is_empty() {
        report.push_str("\n# Broken links:\n");
        for link in &result.broken_links {
            report.push_str(&format!("  ✗ {}", link.url));
            if link.status_code != 0 {
                report.push_str(&format!(" ({})", link.status_code));
            }
            report.push_str(&format!(" - {}\n", link.reason));
        }
    }

    if result.broken_links.len() < result.inaccessible_links {
        report.push_str(&format!(
            "\n  Note: {} broken link(s) could not be stored\n",
            result.inaccessible_links - result.broken_links.len()
        ));
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}

pub fn generate_json_report(job: &Job, stored: &StoredResult) -> Result<String, serde_json::Error> {
    let result = &stored.result;

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "PageProbe",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
                "format": "json"
            },
            "job": {
                "id": job.id,
                "url": job.url,
                "status": job.status,
                "created_at": format_iso8601_timestamp(job.created_at),
                "updated_at": format_iso8601_timestamp(job.updated_at)
            },
            "result": {
                "id": stored.id,
                "analyzed_at": format_iso8601_timestamp(stored.created_at),
                "title": result.title,
                "markup_version": result.markup_version,
                "heading_counts": result.heading_counts,
                "internal_links": result.internal_links,
                "external_links": result.external_links,
                "inaccessible_links": result.inaccessible_links,
                "has_login_form": result.has_login_form,
                "broken_links": result.broken_links
            }
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
