use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate};
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cancel::{check_cancelled, with_cancel};
use crate::config::ClientConfig;
use crate::error::{Result, TrackerError};
use crate::models::{DateRange, PublicationRecord, SearchRequest, parse_count, validate_term};
use crate::pubmed::models::{ArticleSummary, PubMedSearchPage};
use crate::pubmed::parser::PubMedXmlParser;
use crate::pubmed::responses::{ESearchResult, ESummaryDocument, ESummaryResult};
use crate::query::PubMedQuery;
use crate::rate_limit::RateLimiter;

/// Fields the search term is matched against
pub const SEARCH_FIELDS: [&str; 1] = ["Title/Abstract"];
/// Publication type every search is restricted to
pub const SEARCH_ARTICLE_TYPE: &str = "Journal Article";
/// Relative window used when a search carries no date range
pub const DEFAULT_RELDATE_DAYS: u32 = 365;

/// Publication types reported by [`PubMedClient::type_distribution`]
pub const DISTRIBUTION_TYPES: [&str; 6] = [
    "Clinical Trial",
    "Review",
    "Meta-Analysis",
    "Case Reports",
    "Randomized Controlled Trial",
    "Journal Article",
];

/// Client for the PubMed E-utilities
///
/// Every request takes a token from the shared [`RateLimiter`] first.
#[derive(Clone)]
pub struct PubMedClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    config: ClientConfig,
}

impl PubMedClient {
    /// Client with default configuration (3 requests/second, no API key)
    pub fn new() -> Self {
        Self::with_config(ClientConfig::new())
    }

    /// ```
    /// use publication_tracker::{ClientConfig, PubMedClient};
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    ///
    /// let client = PubMedClient::with_config(config);
    /// ```
    pub fn with_config(config: ClientConfig) -> Self {
        let rate_limiter = config.create_rate_limiter();
        let base_url = config.effective_base_url().to_string();

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.effective_user_agent())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            rate_limiter,
            config,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The query every search and count call starts from
    pub fn base_query(term: &str) -> PubMedQuery {
        PubMedQuery::new(term)
            .fields(SEARCH_FIELDS)
            .article_types([SEARCH_ARTICLE_TYPE])
    }

    /// Run one ESearch page with history enabled.
    ///
    /// A null or empty payload yields an empty page rather than an error.
    #[instrument(skip(self, request, cancel), fields(term = %request.term, offset = request.offset, limit = request.limit))]
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<PubMedSearchPage> {
        let term = request.validated_term()?;

        let mut query = Self::base_query(term)
            .retstart(request.offset)
            .retmax(request.limit)
            .reldate_days(DEFAULT_RELDATE_DAYS);
        if let Some(range) = request.date_range {
            query = query.date_range(range);
        }
        if let Some(sort) = request.sort {
            query = query.sort(sort);
        }

        let result = self.esearch(&query, cancel).await?;
        let data = result.esearchresult;

        let page = PubMedSearchPage {
            total: data.total(),
            retstart: data
                .retstart
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(request.offset),
            retmax: data
                .retmax
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(request.limit),
            ids: data.idlist,
            webenv: data.webenv,
            query_key: data.query_key,
        };

        info!(
            total = page.total,
            returned = page.ids.len(),
            has_history = page.has_history(),
            "PubMed search completed"
        );
        Ok(page)
    }

    /// Summaries for a search page, replayed through the history server
    #[instrument(skip(self, page, cancel), fields(retstart = page.retstart, retmax = page.retmax))]
    pub async fn fetch_summaries(
        &self,
        page: &PubMedSearchPage,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArticleSummary>> {
        let (Some(query_key), Some(webenv)) = (&page.query_key, &page.webenv) else {
            debug!("Search page carries no history tokens, nothing to summarise");
            return Ok(Vec::new());
        };

        let url = PubMedQuery::new("")
            .retstart(page.retstart)
            .retmax(page.retmax)
            .build_esummary_url(&self.base_url, query_key, webenv);
        let body = self.get_text(&url, cancel).await?;

        let result: ESummaryResult = if body.trim().is_empty() {
            ESummaryResult::default()
        } else {
            serde_json::from_str::<Option<ESummaryResult>>(&body)?.unwrap_or_default()
        };

        let mut summaries = Vec::with_capacity(result.result.uids.len());
        for uid in &result.result.uids {
            let Some(value) = result.result.documents.get(uid) else {
                warn!(uid = %uid, "ESummary listed a uid without a document");
                continue;
            };
            match serde_json::from_value::<ESummaryDocument>(value.clone()) {
                Ok(doc) => summaries.push(ArticleSummary {
                    uid: uid.clone(),
                    title: doc.title,
                    pubdate: doc.pubdate,
                    source: if doc.source.is_empty() {
                        doc.fulljournalname
                    } else {
                        doc.source
                    },
                    authors: doc.authors.into_iter().map(|a| a.name).collect(),
                }),
                Err(e) => warn!(uid = %uid, error = %e, "Skipping malformed ESummary document"),
            }
        }

        debug!(summaries = summaries.len(), "Fetched ESummary page");
        Ok(summaries)
    }

    /// Full records for `ids` in one batched EFetch call.
    ///
    /// Articles the parser cannot use are left out of the result.
    #[instrument(skip(self, ids, cancel), fields(count = ids.len()))]
    pub async fn fetch_full(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicationRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = PubMedQuery::build_efetch_xml_url(&self.base_url, ids)?;
        let xml = self.get_text(&url, cancel).await?;
        let records = PubMedXmlParser::parse_articles(&xml)?;

        if records.len() < ids.len() {
            warn!(
                requested = ids.len(),
                parsed = records.len(),
                "Some PubMed articles were not returned or could not be parsed"
            );
        }
        info!(parsed = records.len(), "Fetched full PubMed records");
        Ok(records)
    }

    /// Publication counts per calendar year, `start_year..=end_year`.
    ///
    /// A year whose request fails is reported as 0. Only an invalid term or
    /// cancellation aborts the whole call.
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

        let today = Local::now().date_naive();
        let mut counts = BTreeMap::new();

        for year in start_year..=end_year {
            let range = year_window(year, today)?;
            let query = Self::base_query(term).date_range(range).retmax(0);
            let count = self.count_or_zero(&query, cancel, &year.to_string()).await?;
            counts.insert(year.to_string(), count);
        }

        Ok(counts)
    }

    /// Counts per publication type over `years_back` years ending today
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
        for label in DISTRIBUTION_TYPES {
            let query = PubMedQuery::new(term)
                .fields(SEARCH_FIELDS)
                .article_types([label])
                .date_range(window)
                .retmax(0);
            let count = self.count_or_zero(&query, cancel, label).await?;
            counts.insert(label.to_string(), count);
        }

        Ok(counts)
    }

    async fn count_or_zero(
        &self,
        query: &PubMedQuery,
        cancel: &CancellationToken,
        bucket: &str,
    ) -> Result<u64> {
        check_cancelled(cancel)?;
        match self.esearch(query, cancel).await {
            Ok(result) => Ok(parse_count(result.esearchresult.count.as_deref())),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(bucket, error = %e, "Count request failed, reporting 0");
                Ok(0)
            }
        }
    }

    async fn esearch(&self, query: &PubMedQuery, cancel: &CancellationToken) -> Result<ESearchResult> {
        let url = query.build_esearch_url(&self.base_url)?;
        let body = self.get_text(&url, cancel).await?;
        if body.trim().is_empty() {
            debug!("Empty ESearch payload");
            return Ok(ESearchResult::default());
        }

        let result = serde_json::from_str::<Option<ESearchResult>>(&body)?.unwrap_or_default();
        if let Some(error) = &result.esearchresult.error {
            return Err(TrackerError::ApiError {
                status: 200,
                message: format!("NCBI ESearch API error: {}", error),
            });
        }
        Ok(result)
    }

    async fn get_text(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        with_cancel(cancel, async {
            let response = self.make_request(url).await?;
            Ok::<_, TrackerError>(response.text().await?)
        })
        .await
    }

    /// Append credentials, wait for a rate-limit token and send the request
    pub(crate) async fn make_request(&self, url: &str) -> Result<Response> {
        let mut final_url = url.to_string();
        let api_params = self.config.build_api_params();
        if !api_params.is_empty() {
            let separator = if url.contains('?') { '&' } else { '?' };
            final_url.push(separator);
            let params: Vec<String> = api_params
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
                .collect();
            final_url.push_str(&params.join("&"));
        }

        self.rate_limiter.acquire().await?;
        debug!(url = %url, "Making E-utilities request");
        let response = self.client.get(&final_url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "E-utilities request failed");
            return Err(TrackerError::ApiError {
                status: response.status().as_u16(),
                message: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        Ok(response)
    }
}

impl Default for PubMedClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Jan 1 to Dec 31 of `year`, cut short at `today` for the current year
fn year_window(year: i32, today: NaiveDate) -> Result<DateRange> {
    let range = DateRange::years(year, year)?;
    if year == today.year() && today < range.end {
        DateRange::new(range.start, today)
    } else {
        Ok(range)
    }
}
