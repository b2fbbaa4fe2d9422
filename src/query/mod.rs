//! Provider query builders
//!
//! Each builder is an immutable value: every setter consumes the query and
//! returns an updated copy, and URL construction only reads it.

pub mod pubmed;
pub mod scopus;

pub use pubmed::{DateFilter, PubMedQuery};
pub use scopus::{ScopusQuery, SourceType};

/// `application/x-www-form-urlencoded` style encoding: spaces become `+`,
/// everything else outside the unreserved set is percent-encoded.
pub(crate) fn form_encode(value: &str) -> String {
    value
        .split(' ')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("+")
}
