//! Scopus Search and Abstract Retrieval client
//!
//! Authentication is header based (`X-ELS-APIKey`, optional
//! `X-ELS-Insttoken`). Searches return normalised entries directly; abstracts
//! need one detail request per document.

pub mod client;
pub mod parser;
pub(crate) mod responses;

pub use client::{ScopusClient, ScopusSearchPage};
