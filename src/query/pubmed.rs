use crate::error::{Result, TrackerError};
use crate::models::{DateRange, SortKey, validate_term};

use super::form_encode;

/// Date restriction applied to an ESearch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Absolute creation-date window (`datetype=crdt&mindate&maxdate`)
    Range(DateRange),
    /// Records from the last N days (`reldate=N`)
    RelativeDays(u32),
}

/// PubMed E-utilities query
///
/// ```
/// use publication_tracker::query::PubMedQuery;
///
/// let query = PubMedQuery::new("sepsis")
///     .fields(["Title/Abstract"])
///     .article_types(["Journal Article"]);
///
/// assert_eq!(
///     query.term_expression(),
///     "(\"sepsis\"[Title/Abstract]) AND Journal Article[pt]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubMedQuery {
    term: String,
    fields: Vec<String>,
    article_types: Vec<String>,
    retstart: usize,
    retmax: usize,
    reldate_days: Option<u32>,
    date_range: Option<DateRange>,
    sort: Option<SortKey>,
}

impl PubMedQuery {
    pub fn new<S: Into<String>>(term: S) -> Self {
        Self {
            term: term.into().trim().to_string(),
            fields: Vec::new(),
            article_types: Vec::new(),
            retstart: 0,
            retmax: 100,
            reldate_days: None,
            date_range: None,
            sort: None,
        }
    }

    /// Fields the quoted term is matched against, OR-ed together
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| !f.trim().is_empty())
            .collect();
        self
    }

    /// Publication types (`[pt]`), OR-ed together and AND-ed with the term
    pub fn article_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.article_types = types
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .collect();
        self
    }

    pub fn retstart(mut self, retstart: usize) -> Self {
        self.retstart = retstart;
        self
    }

    pub fn retmax(mut self, retmax: usize) -> Self {
        self.retmax = retmax;
        self
    }

    pub fn reldate_days(mut self, days: u32) -> Self {
        self.reldate_days = Some(days);
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn get_retstart(&self) -> usize {
        self.retstart
    }

    pub fn get_retmax(&self) -> usize {
        self.retmax
    }

    /// The effective date restriction. An absolute range always wins over
    /// the relative-days window, whichever was set first.
    pub fn date_filter(&self) -> Option<DateFilter> {
        match (self.date_range, self.reldate_days) {
            (Some(range), _) => Some(DateFilter::Range(range)),
            (None, Some(days)) => Some(DateFilter::RelativeDays(days)),
            (None, None) => None,
        }
    }

    /// The unencoded `term` parameter
    pub fn term_expression(&self) -> String {
        let quoted = format!("\"{}\"", self.term);

        let term_part = if self.fields.is_empty() {
            quoted
        } else {
            let parts: Vec<String> = self
                .fields
                .iter()
                .map(|f| format!("{}[{}]", quoted, f))
                .collect();
            format!("({})", parts.join(" OR "))
        };

        match self.article_types.len() {
            0 => term_part,
            1 => format!("{} AND {}[pt]", term_part, self.article_types[0]),
            _ => {
                let types: Vec<String> = self
                    .article_types
                    .iter()
                    .map(|t| format!("{}[pt]", t))
                    .collect();
                format!("{} AND ({})", term_part, types.join(" OR "))
            }
        }
    }

    /// ESearch URL with history enabled, so the response carries a
    /// `querykey`/`webenv` pair for follow-up ESummary calls
    pub fn build_esearch_url(&self, base_url: &str) -> Result<String> {
        validate_term(&self.term)?;

        let mut url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmode=json&usehistory=y&retstart={}&retmax={}",
            base_url.trim_end_matches('/'),
            form_encode(&self.term_expression()),
            self.retstart,
            self.retmax
        );

        if let Some(sort) = self.sort {
            url.push_str("&sort=");
            url.push_str(sort.pubmed_param());
        }

        match self.date_filter() {
            Some(DateFilter::Range(range)) => {
                url.push_str(&format!(
                    "&datetype=crdt&mindate={}&maxdate={}",
                    range.start.format("%Y/%m/%d"),
                    range.end.format("%Y/%m/%d")
                ));
            }
            Some(DateFilter::RelativeDays(days)) => {
                url.push_str(&format!("&reldate={}", days));
            }
            None => {}
        }

        Ok(url)
    }

    /// ESummary URL replaying a stored search by its history tokens
    pub fn build_esummary_url(&self, base_url: &str, query_key: &str, webenv: &str) -> String {
        let mut url = format!(
            "{}/esummary.fcgi?db=pubmed&query_key={}&WebEnv={}&retmode=json&retstart={}&retmax={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(query_key),
            urlencoding::encode(webenv),
            self.retstart,
            self.retmax
        );
        if let Some(sort) = self.sort {
            url.push_str("&sort=");
            url.push_str(sort.pubmed_param());
        }
        url
    }

    /// EFetch URL returning full PubMed XML records for `ids`
    pub fn build_efetch_xml_url<S: AsRef<str>>(base_url: &str, ids: &[S]) -> Result<String> {
        Ok(format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            base_url.trim_end_matches('/'),
            join_ids(ids)?
        ))
    }

    /// ESummary URL returning JSON summaries for `ids`
    pub fn build_esummary_by_ids_url<S: AsRef<str>>(base_url: &str, ids: &[S]) -> Result<String> {
        Ok(format!(
            "{}/esummary.fcgi?db=pubmed&id={}&retmode=json",
            base_url.trim_end_matches('/'),
            join_ids(ids)?
        ))
    }
}

fn join_ids<S: AsRef<str>>(ids: &[S]) -> Result<String> {
    let ids: Vec<String> = ids
        .iter()
        .map(|id| id.as_ref().trim())
        .filter(|id| !id.is_empty())
        .map(|id| urlencoding::encode(id).into_owned())
        .collect();
    if ids.is_empty() {
        return Err(TrackerError::InvalidQuery(
            "IDs cannot be empty".to_string(),
        ));
    }
    Ok(ids.join(","))
}
