//! Client and service configuration

use std::time::Duration;

use crate::rate_limit::RateLimiter;

const DEFAULT_EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const DEFAULT_SCOPUS_BASE_URL: &str = "https://api.elsevier.com/content";

/// Configuration for the PubMed E-utilities client
///
/// # Example
///
/// ```
/// use publication_tracker::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_api_key("your_api_key_here")
///     .with_email("researcher@university.edu");
///
/// assert_eq!(config.effective_rate_limit(), 10.0);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub tool: Option<String>,
    pub base_url: Option<String>,
    pub rate_limit: Option<f64>,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            api_key: None,
            email: None,
            tool: None,
            base_url: None,
            rate_limit: None,
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        let api_key = api_key.into();
        self.api_key = if api_key.trim().is_empty() {
            None
        } else {
            Some(api_key)
        };
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Point the client at another E-utilities root (mock servers, mirrors)
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the requests-per-second budget
    pub fn with_rate_limit(mut self, rate: f64) -> Self {
        self.rate_limit = Some(rate);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// NCBI allows 10 rps with an API key and 3 rps without one
    pub fn effective_rate_limit(&self) -> f64 {
        match (self.rate_limit, &self.api_key) {
            (Some(rate), _) => rate,
            (None, Some(_)) => 10.0,
            (None, None) => 3.0,
        }
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_EUTILS_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("publication-tracker/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or("publication-tracker")
    }

    pub fn create_rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.effective_rate_limit())
    }

    /// `api_key`, `email` and `tool` query parameters, in that order.
    /// The tool name is only sent alongside an email.
    pub fn build_api_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(api_key) = &self.api_key {
            params.push(("api_key".to_string(), api_key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
            params.push(("tool".to_string(), self.effective_tool().to_string()));
        }
        params
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the Scopus Search and Abstract Retrieval client
#[derive(Debug, Clone)]
pub struct ScopusConfig {
    pub api_key: Option<String>,
    pub inst_token: Option<String>,
    pub base_url: Option<String>,
    /// Fixed pause before each per-id detail request
    pub detail_delay: Duration,
    pub timeout: Duration,
}

impl ScopusConfig {
    pub fn new() -> Self {
        Self {
            api_key: None,
            inst_token: None,
            base_url: None,
            detail_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_inst_token<S: Into<String>>(mut self, inst_token: S) -> Self {
        self.inst_token = Some(inst_token.into());
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_SCOPUS_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn search_url(&self) -> String {
        format!("{}/search/scopus", self.effective_base_url())
    }

    pub fn abstract_url(&self, scopus_id: &str) -> String {
        format!(
            "{}/abstract/scopus_id/{}?httpAccept=application/json",
            self.effective_base_url(),
            urlencoding::encode(scopus_id)
        )
    }
}

impl Default for ScopusConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for the reconciliation service
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Years before the current one covered by searches and trend charts
    pub trend_years: u32,
    pub pubmed_page_size: usize,
    pub scopus_page_size: usize,
    /// Offsets past this value return an empty result without calling a provider
    pub max_offset: usize,
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self {
            trend_years: 4,
            pubmed_page_size: 100,
            scopus_page_size: 100,
            max_offset: 9999,
        }
    }

    pub fn with_trend_years(mut self, years: u32) -> Self {
        self.trend_years = years;
        self
    }

    pub fn with_pubmed_page_size(mut self, size: usize) -> Self {
        self.pubmed_page_size = size;
        self
    }

    pub fn with_scopus_page_size(mut self, size: usize) -> Self {
        self.scopus_page_size = size;
        self
    }

    pub fn with_max_offset(mut self, max_offset: usize) -> Self {
        self.max_offset = max_offset;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}
