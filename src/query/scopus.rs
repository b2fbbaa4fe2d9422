use std::fmt;

use crate::error::{Result, TrackerError};
use crate::models::{SortKey, validate_term};

/// Scopus source types (`SRCTYPE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Journal,
    Conference,
    Book,
    BookSeries,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::Journal,
        SourceType::Conference,
        SourceType::Book,
        SourceType::BookSeries,
    ];

    /// Map a human-readable type name; unknown names yield `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "journal" | "journals" => Some(SourceType::Journal),
            "conference" | "conference proceeding" | "proceedings" => {
                Some(SourceType::Conference)
            }
            "book" | "books" => Some(SourceType::Book),
            "book series" | "series" => Some(SourceType::BookSeries),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            SourceType::Journal => 'j',
            SourceType::Conference => 'p',
            SourceType::Book => 'b',
            SourceType::BookSeries => 'k',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceType::Journal => "Journal",
            SourceType::Conference => "Conference",
            SourceType::Book => "Book",
            SourceType::BookSeries => "Book Series",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scopus Search API query
///
/// Clauses are AND-ed in the order they were added.
///
/// ```
/// use publication_tracker::query::ScopusQuery;
///
/// let query = ScopusQuery::title_abs_key("sepsis")
///     .year_range(Some(2020), Some(2025))
///     .source_type("journal");
///
/// assert_eq!(
///     query.query_string(),
///     "TITLE-ABS-KEY(sepsis) AND PUBYEAR AFT 2020 AND PUBYEAR BEF 2025 AND SRCTYPE(j)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopusQuery {
    /// Set by [`ScopusQuery::title_abs_key`], checked when the URL is built
    term: Option<String>,
    clauses: Vec<String>,
    start: usize,
    count: usize,
    sort: Option<SortKey>,
    view: String,
}

impl ScopusQuery {
    /// Query with no clauses. Add at least one before building a URL.
    pub fn new() -> Self {
        Self {
            term: None,
            clauses: Vec::new(),
            start: 0,
            count: 25,
            sort: None,
            view: "STANDARD".to_string(),
        }
    }

    /// Title, abstract and keyword match on `term`. A blank term makes
    /// [`ScopusQuery::build_url`] fail.
    pub fn title_abs_key(term: &str) -> Self {
        let term = term.trim();
        let mut query = Self::new().clause(format!("TITLE-ABS-KEY({})", term));
        query.term = Some(term.to_string());
        query
    }

    /// Add a raw clause
    pub fn clause<S: Into<String>>(mut self, clause: S) -> Self {
        let clause = clause.into();
        if !clause.trim().is_empty() {
            self.clauses.push(clause.trim().to_string());
        }
        self
    }

    /// Exclusive year bounds (`PUBYEAR AFT from`, `PUBYEAR BEF to`)
    pub fn year_range(self, from_year: Option<i32>, to_year: Option<i32>) -> Self {
        let mut query = self;
        if let Some(from) = from_year {
            query = query.clause(format!("PUBYEAR AFT {}", from));
        }
        if let Some(to) = to_year {
            query = query.clause(format!("PUBYEAR BEF {}", to));
        }
        query
    }

    pub fn year(self, year: i32) -> Self {
        self.clause(format!("PUBYEAR = {}", year))
    }

    /// Source-type filter from a human-readable name. Unknown names add nothing.
    pub fn source_type(self, label: &str) -> Self {
        match SourceType::from_label(label) {
            Some(source) => self.source(source),
            None => self,
        }
    }

    pub fn source(self, source: SourceType) -> Self {
        self.clause(format!("SRCTYPE({})", source.code()))
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn view<S: Into<String>>(mut self, view: S) -> Self {
        self.view = view.into();
        self
    }

    pub fn query_string(&self) -> String {
        self.clauses.join(" AND ")
    }

    pub fn build_url(&self, search_url: &str) -> Result<String> {
        if let Some(term) = &self.term {
            validate_term(term)?;
        }
        if self.clauses.is_empty() {
            return Err(TrackerError::InvalidQuery(
                "Scopus query cannot be empty".to_string(),
            ));
        }

        let mut url = format!(
            "{}?query={}&start={}&count={}&view={}",
            search_url,
            urlencoding::encode(&self.query_string()),
            self.start,
            self.count,
            urlencoding::encode(&self.view)
        );
        if let Some(sort) = self.sort {
            url.push_str("&sort=");
            url.push_str(&urlencoding::encode(sort.scopus_param()));
        }
        Ok(url)
    }
}

impl Default for ScopusQuery {
    fn default() -> Self {
        Self::new()
    }
}
