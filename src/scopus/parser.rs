//! Scopus JSON to [`PublicationRecord`]

use chrono::NaiveDate;

use crate::models::{NO_ABSTRACT, Provider, PublicationRecord};
use crate::scopus::responses::{AbstractsRetrievalResponse, ScopusEntry};

/// Title placeholder for Scopus entries without `dc:title`
pub const NO_SCOPUS_TITLE: &str = "No title";
/// Author placeholder for entries without `dc:creator`
pub const UNKNOWN_AUTHOR: &str = "Unknown";

const SCOPUS_ID_PREFIX: &str = "SCOPUS_ID:";

/// Provider id from a `dc:identifier` value
pub fn strip_scopus_prefix(identifier: &str) -> &str {
    let identifier = identifier.trim();
    identifier
        .strip_prefix(SCOPUS_ID_PREFIX)
        .unwrap_or(identifier)
        .trim()
}

pub fn record_url(scopus_id: &str) -> String {
    format!("https://www.scopus.com/pages/publications/{}", scopus_id)
}

/// Best-effort cover date. Unparsable dates become the epoch.
pub fn parse_cover_date(raw: Option<&str>) -> NaiveDate {
    raw.map(str::trim)
        .and_then(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
                .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01-01", s), "%Y-%m-%d"))
                .ok()
        })
        .unwrap_or_default()
}

/// Map a search entry to a record. Entries without an identifier (such as
/// the empty-result marker) yield `None`.
pub(crate) fn parse_entry(entry: &ScopusEntry) -> Option<PublicationRecord> {
    let id = strip_scopus_prefix(entry.identifier.as_deref()?);
    if id.is_empty() {
        return None;
    }

    Some(PublicationRecord {
        provider: Provider::Scopus,
        provider_id: id.to_string(),
        title: non_blank(entry.title.as_deref())
            .unwrap_or(NO_SCOPUS_TITLE)
            .to_string(),
        abstract_text: non_blank(entry.description.as_deref())
            .unwrap_or(NO_ABSTRACT)
            .to_string(),
        authors: vec![
            non_blank(entry.creator.as_deref())
                .unwrap_or(UNKNOWN_AUTHOR)
                .to_string(),
        ],
        publication_date: parse_cover_date(entry.cover_date.as_deref()),
        record_url: record_url(id),
        url: non_blank(entry.url.as_deref()).map(str::to_string),
    })
}

/// Map an Abstract Retrieval payload to a record. A blank abstract is
/// replaced by a placeholder naming the document subtype.
pub(crate) fn parse_abstract_response(
    response: &AbstractsRetrievalResponse,
    requested_id: &str,
) -> PublicationRecord {
    let core = &response.coredata;
    let id = core
        .identifier
        .as_deref()
        .map(strip_scopus_prefix)
        .filter(|id| !id.is_empty())
        .unwrap_or(requested_id)
        .to_string();

    let abstract_text = match response.abstract_text() {
        Some(text) => text.to_string(),
        None => format!(
            "{} (type: {})",
            NO_ABSTRACT,
            core.subtype_description.as_deref().unwrap_or_default()
        ),
    };

    let authors = response
        .authors
        .as_ref()
        .map(|a| {
            a.author
                .iter()
                .filter_map(|author| non_blank(author.indexed_name.as_deref()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PublicationRecord {
        provider: Provider::Scopus,
        title: non_blank(core.title.as_deref())
            .unwrap_or(NO_SCOPUS_TITLE)
            .to_string(),
        abstract_text,
        authors,
        publication_date: parse_cover_date(core.cover_date.as_deref()),
        record_url: record_url(&id),
        url: non_blank(core.doi.as_deref()).map(|doi| format!("https://doi.org/{}", doi)),
        provider_id: id,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
