use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PROBE_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_USER_AGENT: &str = "PageProbe/0.1 (https://github.com/trapdoorsec/pageprobe)";

/// Tunables for one scanner instance.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub fetch_timeout: Duration,
    pub probe_timeout: Duration,
    pub probe_concurrency: usize,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Number of link probes allowed in flight at once. Zero is treated as one.
    pub fn with_probe_concurrency(mut self, workers: usize) -> Self {
        self.probe_concurrency = workers.max(1);
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}
