use serde::{Deserialize, Serialize};

/// One ESearch page plus the history tokens needed to replay it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubMedSearchPage {
    /// Total hits reported by PubMed, across all pages
    pub total: u64,
    /// PMIDs on this page
    pub ids: Vec<String>,
    pub retstart: usize,
    pub retmax: usize,
    /// WebEnv session identifier for the history server
    pub webenv: Option<String>,
    pub query_key: Option<String>,
}

impl PubMedSearchPage {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn has_history(&self) -> bool {
        self.webenv.is_some() && self.query_key.is_some()
    }
}

/// Lightweight ESummary document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub uid: String,
    pub title: String,
    pub pubdate: String,
    /// Journal abbreviation
    pub source: String,
    pub authors: Vec<String>,
}
