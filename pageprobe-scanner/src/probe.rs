use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::links::ResolvedLink;
use crate::result::{BrokenLink, LINK_CHECK_FAILED};
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SKIPPED_SCHEMES: [&str; 3] = ["mailto:", "tel:", "javascript:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Not a network target; treated as accessible without a request.
    Skipped,
    Accessible(u16),
    Broken(String),
}

impl ProbeOutcome {
    pub fn is_accessible(&self) -> bool {
        !matches!(self, ProbeOutcome::Broken(_))
    }
}

/// True for links that are never checked over the network.
pub fn is_skipped(href: &str, resolved: &str) -> bool {
    href.starts_with('#')
        || resolved.starts_with('#')
        || SKIPPED_SCHEMES
            .iter()
            .any(|scheme| resolved.starts_with(scheme) || href.starts_with(scheme))
}

/// Issues HEAD requests to decide whether discovered links still resolve.
pub struct LinkProber {
    client: Client,
    concurrency: usize,
}

impl LinkProber {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.probe_timeout)
            .connect_timeout(config.probe_timeout)
            .pool_max_idle_per_host(config.probe_concurrency)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            concurrency: config.probe_concurrency.max(1),
        })
    }

    pub async fn probe(
        &self,
        link: &ResolvedLink,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome> {
        if is_skipped(&link.href, link.url.as_str()) {
            debug!("Skipping probe for {}", link.href);
            return Ok(ProbeOutcome::Skipped);
        }

        let request = self.client.head(link.url.clone()).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            response = request => response,
        };

        let outcome = match response {
            Ok(response) if response.status().as_u16() >= 400 => {
                debug!("{} answered {}", link.url, response.status());
                ProbeOutcome::Broken(LINK_CHECK_FAILED.to_string())
            }
            Ok(response) => ProbeOutcome::Accessible(response.status().as_u16()),
            Err(e) => ProbeOutcome::Broken(e.to_string()),
        };

        if let ProbeOutcome::Broken(ref reason) = outcome {
            warn!("Broken link {}: {}", link.url, reason);
        }

        Ok(outcome)
    }

    /// Probes every link with at most `probe_concurrency` requests in flight.
    /// Broken links come back in the same order as `links`.
    pub async fn probe_all(
        &self,
        links: &[ResolvedLink],
        cancel: &CancellationToken,
    ) -> Result<Vec<BrokenLink>> {
        // Collected first so the returned future stays Send
        let probes: Vec<_> = links.iter().map(|link| self.probe(link, cancel)).collect();
        let outcomes: Vec<ProbeOutcome> = stream::iter(probes)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(links
            .iter()
            .zip(outcomes)
            .filter_map(|(link, outcome)| match outcome {
                ProbeOutcome::Broken(reason) => Some(BrokenLink::new(link.url.to_string(), reason)),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::classify;
    use std::time::Duration;
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn prober(workers: usize) -> LinkProber {
        LinkProber::new(
            &ScanConfig::new()
                .with_probe_timeout(Duration::from_millis(500))
                .with_probe_concurrency(workers),
        )
        .unwrap()
    }

    fn links(base: &str, hrefs: &[&str]) -> Vec<ResolvedLink> {
        let base = Url::parse(base).unwrap();
        let hrefs: Vec<String> = hrefs.iter().map(|s| s.to_string()).collect();
        classify(&hrefs, &base).links
    }

    #[test]
    fn test_skip_rules() {
        assert!(is_skipped("mailto:x@y.com", "mailto:x@y.com"));
        assert!(is_skipped("tel:+100", "tel:+100"));
        assert!(is_skipped("javascript:void(0)", "javascript:void(0)"));
        assert!(is_skipped("#top", "https://example.com/#top"));
        assert!(!is_skipped("/about", "https://example.com/about"));
    }

    #[tokio::test]
    async fn test_skipped_links_make_no_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let links = links(
            &mock_server.uri(),
            &["mailto:x@y.com", "#top", "javascript:void(0)", "tel:+1"],
        );
        let broken = prober(2)
            .probe_all(&links, &CancellationToken::new())
            .await
            .unwrap();
        assert!(broken.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_broken_with_generic_reason() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let links = links(&mock_server.uri(), &["/gone", "/ok"]);
        let prober = prober(1);
        let token = CancellationToken::new();

        let gone = prober.probe(&links[0], &token).await.unwrap();
        assert_eq!(gone, ProbeOutcome::Broken(LINK_CHECK_FAILED.to_string()));
        assert!(!gone.is_accessible());

        let ok = prober.probe(&links[1], &token).await.unwrap();
        assert_eq!(ok, ProbeOutcome::Accessible(200));

        let broken = prober.probe_all(&links, &token).await.unwrap();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].url, format!("{}/gone", mock_server.uri()));
        assert_eq!(broken[0].status_code, 0);
        assert_eq!(broken[0].reason, LINK_CHECK_FAILED);
    }

    #[tokio::test]
    async fn test_redirect_status_is_accessible() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&mock_server)
            .await;

        let links = links(&mock_server.uri(), &["/moved"]);
        let outcome = prober(1)
            .probe(&links[0], &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_accessible());
    }

    #[tokio::test]
    async fn test_transport_failure_carries_error_text() {
        let links = links("http://127.0.0.1:1/", &["/nowhere"]);
        let broken = prober(1)
            .probe_all(&links, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(broken.len(), 1);
        assert_ne!(broken[0].reason, LINK_CHECK_FAILED);
        assert!(!broken[0].reason.is_empty());
    }

    #[tokio::test]
    async fn test_parallel_probes_keep_discovery_order() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(200)))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/fine"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let links = links(&mock_server.uri(), &["/slow", "/fine", "/fast"]);
        let broken = prober(3)
            .probe_all(&links, &CancellationToken::new())
            .await
            .unwrap();

        let urls: Vec<&str> = broken.iter().map(|b| b.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}/slow", mock_server.uri()),
                format!("{}/fast", mock_server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_all_observes_cancellation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let token = CancellationToken::new();
        token.cancel();

        let links = links(&mock_server.uri(), &["/a"]);
        let err = prober(1).probe_all(&links, &token).await.unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
    }
}
