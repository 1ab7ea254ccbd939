use crate::analyzer::{analyze_document, parse_markup};
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::fetch::Fetcher;
use crate::links::classify_page;
use crate::probe::LinkProber;
use crate::result::AnalysisResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Runs one page through fetch, analysis, link classification and probing.
///
/// Steps run strictly in that order. The parsed document is dropped before
/// the first probe is awaited, so only owned signals cross await points.
pub struct Scanner {
    fetcher: Fetcher,
    prober: LinkProber,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
            prober: LinkProber::new(config)?,
        })
    }

    pub async fn scan(&self, target: &str, cancel: &CancellationToken) -> Result<AnalysisResult> {
        info!("Starting analysis of {}", target);

        let base_url = Url::parse(target)
            .map_err(|e| ScanError::Parse(format!("Invalid URL {}: {}", target, e)))?;

        let body = self.fetcher.fetch(&base_url, cancel).await?;

        let signals = {
            let document = parse_markup(&body);
            analyze_document(&document)
        };
        debug!(
            "Document walk found {} anchors, title {:?}",
            signals.hrefs.len(),
            signals.title
        );

        let classification = classify_page(&signals.hrefs, &base_url, target);
        let broken_links = self.prober.probe_all(&classification.links, cancel).await?;

        let mut result = AnalysisResult {
            title: signals.title,
            markup_version: signals.markup_version,
            heading_counts: signals.heading_counts,
            internal_links: classification.internal,
            external_links: classification.external,
            has_login_form: signals.has_login_form,
            ..AnalysisResult::default()
        };
        for link in broken_links {
            result.record_broken(link);
        }

        info!(
            "Analysis of {} complete: {} internal, {} external, {} broken",
            target, result.internal_links, result.external_links, result.inaccessible_links
        );
        Ok(result)
    }
}
