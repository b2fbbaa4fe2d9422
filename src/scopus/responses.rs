use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopusSearchResponse {
    #[serde(default, rename = "search-results")]
    pub results: ScopusSearchResults,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopusSearchResults {
    #[serde(default, rename = "opensearch:totalResults")]
    pub total_results: Option<String>,
    #[serde(default, rename = "entry")]
    pub entries: Vec<ScopusEntry>,
}

/// One search hit. An empty result set is reported as a single entry
/// carrying only an `error` field.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopusEntry {
    #[serde(default, rename = "dc:identifier")]
    pub identifier: Option<String>,
    #[serde(default, rename = "dc:title")]
    pub title: Option<String>,
    #[serde(default, rename = "prism:publicationName")]
    pub publication_name: Option<String>,
    #[serde(default, rename = "prism:coverDate")]
    pub cover_date: Option<String>,
    #[serde(default, rename = "dc:creator")]
    pub creator: Option<String>,
    #[serde(default, rename = "dc:description")]
    pub description: Option<String>,
    #[serde(default, rename = "prism:url")]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopusAbstractResponse {
    #[serde(default, rename = "abstracts-retrieval-response")]
    pub retrieval: Option<AbstractsRetrievalResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AbstractsRetrievalResponse {
    #[serde(default)]
    pub coredata: CoreData,
    #[serde(default)]
    pub item: Option<AbstractItem>,
    #[serde(default)]
    pub authors: Option<AbstractAuthors>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CoreData {
    #[serde(default, rename = "dc:identifier")]
    pub identifier: Option<String>,
    #[serde(default, rename = "dc:title")]
    pub title: Option<String>,
    #[serde(default, rename = "prism:doi")]
    pub doi: Option<String>,
    #[serde(default, rename = "prism:url")]
    pub url: Option<String>,
    #[serde(default, rename = "prism:coverDate")]
    pub cover_date: Option<String>,
    #[serde(default, rename = "subtypeDescription")]
    pub subtype_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AbstractItem {
    #[serde(default)]
    pub bibrecord: Option<BibRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BibRecord {
    #[serde(default)]
    pub head: Option<BibHead>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BibHead {
    /// Usually a string, occasionally null or structured
    #[serde(default)]
    pub abstracts: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AbstractAuthors {
    #[serde(default)]
    pub author: Vec<AbstractAuthor>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AbstractAuthor {
    #[serde(default, rename = "ce:indexed-name")]
    pub indexed_name: Option<String>,
}

impl AbstractsRetrievalResponse {
    /// The abstract text, if the payload carries a non-blank string
    pub fn abstract_text(&self) -> Option<&str> {
        self.item
            .as_ref()?
            .bibrecord
            .as_ref()?
            .head
            .as_ref()?
            .abstracts
            .as_ref()?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
