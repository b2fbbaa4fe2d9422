//! PubMed E-utilities client
//!
//! ESearch (JSON, with history) finds ids, ESummary replays a page through
//! the history server, and EFetch (XML) returns full records.

pub mod client;
pub mod models;
pub mod parser;
pub(crate) mod responses;

pub use client::PubMedClient;
pub use models::{ArticleSummary, PubMedSearchPage};
pub use parser::PubMedXmlParser;
