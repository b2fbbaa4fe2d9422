use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Title used when a provider payload carries none
pub const NO_TITLE: &str = "No title available";
/// Abstract used when a provider payload carries none
pub const NO_ABSTRACT: &str = "No abstract available";

/// External bibliographic data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    PubMed,
    Scopus,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::PubMed => "PubMed",
            Provider::Scopus => "Scopus",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pubmed" => Ok(Provider::PubMed),
            "scopus" => Ok(Provider::Scopus),
            other => Err(TrackerError::InvalidQuery(format!(
                "Unknown provider: {}",
                other
            ))),
        }
    }
}

/// Provider-agnostic publication record
///
/// `(provider, provider_id)` identifies a record globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub provider: Provider,
    /// PMID or Scopus id, without any `SCOPUS_ID:` prefix
    pub provider_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Author names in publication order
    pub authors: Vec<String>,
    pub publication_date: NaiveDate,
    /// Canonical record page at the provider
    pub record_url: String,
    /// Optional external link (DOI resolver, provider API link)
    pub url: Option<String>,
}

impl PublicationRecord {
    /// Whether the abstract is missing or one of the placeholder strings
    pub fn has_placeholder_abstract(&self) -> bool {
        let text = self.abstract_text.trim();
        text.is_empty() || text.starts_with(NO_ABSTRACT)
    }
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(TrackerError::InvalidQuery(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering Jan 1 of `start_year` through Dec 31 of `end_year`
    pub fn years(start_year: i32, end_year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).ok_or_else(|| {
            TrackerError::InvalidQuery(format!("Invalid year: {}", start_year))
        })?;
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31)
            .ok_or_else(|| TrackerError::InvalidQuery(format!("Invalid year: {}", end_year)))?;
        Self::new(start, end)
    }

    /// Range starting Jan 1 of `today.year() - years_back` and ending `today`
    pub fn trailing_years(today: NaiveDate, years_back: u32) -> Self {
        let start_year = today.year() - years_back as i32;
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap_or(today);
        Self { start, end: today }
    }

    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    pub fn end_year(&self) -> i32 {
        self.end.year()
    }
}

/// Result ordering requested from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Relevance,
    PublicationDate,
}

impl SortKey {
    pub fn pubmed_param(&self) -> &'static str {
        match self {
            SortKey::Relevance => "relevance",
            SortKey::PublicationDate => "pub_date",
        }
    }

    pub fn scopus_param(&self) -> &'static str {
        match self {
            SortKey::Relevance => "relevancy",
            SortKey::PublicationDate => "-coverDate",
        }
    }
}

impl FromStr for SortKey {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" | "relevancy" => Ok(SortKey::Relevance),
            "date" | "pub_date" | "publication_date" => Ok(SortKey::PublicationDate),
            other => Err(TrackerError::InvalidQuery(format!(
                "Unknown sort key: {}",
                other
            ))),
        }
    }
}

/// Logical search input shared by both providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub term: String,
    pub offset: usize,
    pub limit: usize,
    pub date_range: Option<DateRange>,
    pub sort: Option<SortKey>,
    /// Narrows the locally listed rows (title, abstract, author names)
    pub filter: Option<String>,
}

impl SearchRequest {
    pub fn new<S: Into<String>>(term: S) -> Self {
        Self {
            term: term.into(),
            offset: 0,
            limit: 100,
            date_range: None,
            sort: None,
            filter: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_filter<S: Into<String>>(mut self, filter: S) -> Self {
        let filter = filter.into();
        self.filter = if filter.trim().is_empty() {
            None
        } else {
            Some(filter)
        };
        self
    }

    /// The trimmed search term, or `InvalidQuery` when it is blank
    pub fn validated_term(&self) -> Result<&str> {
        validate_term(&self.term)
    }
}

pub(crate) fn validate_term(term: &str) -> Result<&str> {
    let trimmed = term.trim();
    // A term of only commas would leave no tag to store
    if trimmed.split(',').all(|piece| piece.trim().is_empty()) {
        return Err(TrackerError::InvalidQuery(
            "Search term cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Provider counts arrive as strings; anything unparsable counts as zero
pub(crate) fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|c| c.trim().parse().ok()).unwrap_or(0)
}
