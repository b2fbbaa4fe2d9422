use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::parse_count;

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ESearchResult {
    #[serde(default)]
    pub esearchresult: ESearchData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ESearchData {
    #[serde(default, rename = "ERROR")]
    pub error: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default)]
    pub retmax: Option<String>,
    #[serde(default)]
    pub retstart: Option<String>,
    #[serde(default)]
    pub idlist: Vec<String>,
    #[serde(default)]
    pub webenv: Option<String>,
    #[serde(default, rename = "querykey")]
    pub query_key: Option<String>,
}

impl ESearchData {
    pub fn total(&self) -> u64 {
        parse_count(self.count.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ESummaryResult {
    #[serde(default)]
    pub result: ESummaryResultData,
}

/// `result` holds a `uids` list plus one object per uid keyed by the uid
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ESummaryResultData {
    #[serde(default)]
    pub uids: Vec<String>,
    #[serde(flatten)]
    pub documents: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ESummaryDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pubdate: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub fulljournalname: String,
    #[serde(default)]
    pub authors: Vec<ESummaryAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ESummaryAuthor {
    #[serde(default)]
    pub name: String,
}
