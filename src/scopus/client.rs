use std::collections::BTreeMap;

use chrono::{Datelike, Local};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cancel::{check_cancelled, with_cancel};
use crate::config::ScopusConfig;
use crate::error::{Result, TrackerError};
use crate::models::{
    DateRange, Provider, PublicationRecord, SearchRequest, parse_count, validate_term,
};
use crate::query::{ScopusQuery, SourceType};
use crate::scopus::parser::{parse_abstract_response, parse_entry, strip_scopus_prefix};
use crate::scopus::responses::{ScopusAbstractResponse, ScopusSearchResponse};

/// One page of Scopus search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopusSearchPage {
    /// `opensearch:totalResults`
    pub total: u64,
    /// Entries with a usable identifier, already normalised
    pub records: Vec<PublicationRecord>,
}

impl ScopusSearchPage {
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.provider_id.clone()).collect()
    }
}

/// Client for the Scopus Search and Abstract Retrieval APIs
///
/// Searches are restricted to journals. Per-id detail retrieval waits
/// `detail_delay` before every call.
#[derive(Clone)]
pub struct ScopusClient {
    client: Client,
    config: ScopusConfig,
}

impl ScopusClient {
    pub fn new() -> Self {
        Self::with_config(ScopusConfig::new())
    }

    pub fn with_config(config: ScopusConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("publication-tracker/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    pub fn config(&self) -> &ScopusConfig {
        &self.config
    }

    /// Title/abstract/keyword search over journal sources.
    ///
    /// A null or empty payload yields an empty page.
    #[instrument(skip(self, request, cancel), fields(term = %request.term, offset = request.offset, limit = request.limit))]
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<ScopusSearchPage> {
        let term = request.validated_term()?;

        let mut query = ScopusQuery::title_abs_key(term);
        if let Some(range) = request.date_range {
            // PUBYEAR AFT/BEF are exclusive bounds
            query = query.year_range(Some(range.start_year() - 1), Some(range.end_year() + 1));
        }
        query = query
            .source(SourceType::Journal)
            .start(request.offset)
            .count(request.limit);
        if let Some(sort) = request.sort {
            query = query.sort(sort);
        }

        let response = self.run_search(&query, cancel).await?;
        let total = parse_count(response.results.total_results.as_deref());

        let mut records = Vec::with_capacity(response.results.entries.len());
        for entry in &response.results.entries {
            match parse_entry(entry) {
                Some(record) => records.push(record),
                None => debug!(error = ?entry.error, "Skipping Scopus entry without identifier"),
            }
        }

        info!(total, returned = records.len(), "Scopus search completed");
        Ok(ScopusSearchPage { total, records })
    }

    /// Full detail for one document
    #[instrument(skip(self, cancel))]
    pub async fn fetch_abstract(
        &self,
        scopus_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PublicationRecord> {
        let scopus_id = strip_scopus_prefix(scopus_id);
        if scopus_id.is_empty() {
            return Err(TrackerError::InvalidQuery(
                "Scopus id cannot be empty".to_string(),
            ));
        }

        let url = self.config.abstract_url(scopus_id);
        let body = with_cancel(cancel, async {
            let response = self.make_request(&url).await.map_err(|e| match e {
                TrackerError::ApiError { status: 404, .. } => TrackerError::NotFound {
                    provider: Provider::Scopus,
                    provider_id: scopus_id.to_string(),
                },
                other => other,
            })?;
            Ok::<_, TrackerError>(response.text().await?)
        })
        .await?;

        let parsed: ScopusAbstractResponse = if body.trim().is_empty() {
            ScopusAbstractResponse::default()
        } else {
            serde_json::from_str::<Option<ScopusAbstractResponse>>(&body)?.unwrap_or_default()
        };

        let retrieval = parsed.retrieval.ok_or_else(|| TrackerError::NotFound {
            provider: Provider::Scopus,
            provider_id: scopus_id.to_string(),
        })?;
        Ok(parse_abstract_response(&retrieval, scopus_id))
    }

    /// Full detail for `ids`, one request per id with the configured delay
    /// before each call.
    ///
    /// Ids whose retrieval fails are logged and left out. Cancellation is
    /// checked before every delay and every call.
    #[instrument(skip(self, ids, cancel), fields(count = ids.len()))]
    pub async fn fetch_full(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicationRecord>> {
        let mut records = Vec::with_capacity(ids.len());

        for id in ids {
            check_cancelled(cancel)?;
            with_cancel(cancel, async {
                tokio::time::sleep(self.config.detail_delay).await;
                Ok::<(), TrackerError>(())
            })
            .await?;

            match self.fetch_abstract(id, cancel).await {
                Ok(record) => records.push(record),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!(scopus_id = %id, error = %e, "Scopus detail retrieval failed"),
            }
        }

        info!(fetched = records.len(), "Fetched Scopus details");
        Ok(records)
    }

    /// Journal publication counts per year, `start_year..=end_year`.
    /// Failed years count as 0.
    #[instrument(skip(self, cancel))]
    pub async fn counts_over_time(
        &self,
        term: &str,
        start_year: i32,
        end_year: i32,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>> {
        let term = validate_term(term)?;
        if start_year > end_year {
            return Err(TrackerError::InvalidQuery(format!(
                "Start year {} is after end year {}",
                start_year, end_year
            )));
        }

        let mut counts = BTreeMap::new();
        for year in start_year..=end_year {
            let query = ScopusQuery::title_abs_key(term)
                .source(SourceType::Journal)
                .year(year)
                .count(0);
            let count = self.count_or_zero(&query, cancel, &year.to_string()).await?;
            counts.insert(year.to_string(), count);
        }
        Ok(counts)
    }

    /// Counts per source type over `years_back` years ending this year
    #[instrument(skip(self, cancel))]
    pub async fn type_distribution(
        &self,
        term: &str,
        years_back: u32,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>> {
        let term = validate_term(term)?;
        let window = DateRange::trailing_years(Local::now().date_naive(), years_back);

        let mut counts = BTreeMap::new();
        for source in SourceType::ALL {
            let query = ScopusQuery::title_abs_key(term)
                .source(source)
                .year_range(Some(window.start.year() - 1), Some(window.end.year() + 1))
                .count(0);
            let count = self.count_or_zero(&query, cancel, source.label()).await?;
            counts.insert(source.label().to_string(), count);
        }
        Ok(counts)
    }

    async fn count_or_zero(
        &self,
        query: &ScopusQuery,
        cancel: &CancellationToken,
        bucket: &str,
    ) -> Result<u64> {
        check_cancelled(cancel)?;
        match self.run_search(query, cancel).await {
            Ok(response) => Ok(parse_count(response.results.total_results.as_deref())),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(bucket, error = %e, "Scopus count request failed, reporting 0");
                Ok(0)
            }
        }
    }

    async fn run_search(
        &self,
        query: &ScopusQuery,
        cancel: &CancellationToken,
    ) -> Result<ScopusSearchResponse> {
        let url = query.build_url(&self.config.search_url())?;
        let body = with_cancel(cancel, async {
            let response = self.make_request(&url).await?;
            Ok::<_, TrackerError>(response.text().await?)
        })
        .await?;

        if body.trim().is_empty() {
            debug!("Empty Scopus search payload");
            return Ok(ScopusSearchResponse::default());
        }
        Ok(serde_json::from_str::<Option<ScopusSearchResponse>>(&body)?.unwrap_or_default())
    }

    async fn make_request(&self, url: &str) -> Result<Response> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(api_key) = &self.config.api_key {
            request = request.header("X-ELS-APIKey", api_key);
        }
        if let Some(token) = &self.config.inst_token {
            request = request.header("X-ELS-Insttoken", token);
        }

        debug!(url = %url, "Making Scopus request");
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Scopus quota exceeded");
            return Err(TrackerError::RateLimitExceeded);
        }
        if !status.is_success() {
            warn!(status = %status, "Scopus request failed");
            return Err(TrackerError::ApiError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown error").to_string(),
            });
        }
        Ok(response)
    }
}

impl Default for ScopusClient {
    fn default() -> Self {
        Self::new()
    }
}
