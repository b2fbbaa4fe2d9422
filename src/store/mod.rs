//! Local publication store
//!
//! Records are keyed by `(provider, provider_id)`, carry an ordered author
//! list and a comma-joined search-tag string. Two backends share one enum
//! front so callers never box a trait object.

pub mod memory;
pub mod sqlite;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Provider, PublicationRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A persisted record with its row id and search tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPublication {
    pub id: i64,
    #[serde(flatten)]
    pub record: PublicationRecord,
    pub search_terms: String,
}

/// Listing of rows surfaced by a search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub provider: Provider,
    /// Rows whose tag string contains this text (case-insensitive)
    pub term: String,
    /// Narrows rows by title, abstract or author name (case-insensitive)
    pub filter: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    /// Rows matching the term
    pub total: usize,
    /// Rows matching the term and the filter
    pub filtered: usize,
    pub rows: Vec<StoredPublication>,
}

#[derive(Debug, Clone, Default)]
pub enum StoreBackendConfig {
    #[default]
    Memory,
    Sqlite {
        path: PathBuf,
    },
}

#[derive(Clone)]
pub enum PublicationStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl PublicationStore {
    /// Stored rows for whichever of `ids` are already known
    pub async fn find_existing(
        &self,
        provider: Provider,
        ids: &[String],
    ) -> Result<Vec<StoredPublication>> {
        match self {
            PublicationStore::Memory(s) => s.find_existing(provider, ids).await,
            PublicationStore::Sqlite(s) => s.find_existing(provider, ids).await,
        }
    }

    /// Append `term` to the tags of every row in `row_ids` as one batch.
    ///
    /// Each row's current tag string is re-read and merged inside the write,
    /// so concurrent appends never drop each other's tags. Returns the number
    /// of rows whose tags changed.
    pub async fn append_search_term(&self, row_ids: Vec<i64>, term: &str) -> Result<usize> {
        if row_ids.is_empty() {
            return Ok(0);
        }
        match self {
            PublicationStore::Memory(s) => s.append_search_term(row_ids, term).await,
            PublicationStore::Sqlite(s) => s.append_search_term(row_ids, term).await,
        }
    }

    /// Insert `records` tagged with `search_terms`. Records whose key is
    /// already present are skipped. Returns the number inserted.
    pub async fn insert_new(
        &self,
        records: Vec<PublicationRecord>,
        search_terms: &str,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        match self {
            PublicationStore::Memory(s) => s.insert_new(records, search_terms).await,
            PublicationStore::Sqlite(s) => s.insert_new(records, search_terms).await,
        }
    }

    /// Replace the abstract of a stored record. Returns `false` when the
    /// record is unknown.
    pub async fn update_abstract(
        &self,
        provider: Provider,
        provider_id: &str,
        abstract_text: &str,
    ) -> Result<bool> {
        match self {
            PublicationStore::Memory(s) => {
                s.update_abstract(provider, provider_id, abstract_text).await
            }
            PublicationStore::Sqlite(s) => {
                s.update_abstract(provider, provider_id, abstract_text).await
            }
        }
    }

    pub async fn get(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<StoredPublication>> {
        match self {
            PublicationStore::Memory(s) => s.get(provider, provider_id).await,
            PublicationStore::Sqlite(s) => s.get(provider, provider_id).await,
        }
    }

    /// Newest publication date first, then insertion order
    pub async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        match self {
            PublicationStore::Memory(s) => s.list(query).await,
            PublicationStore::Sqlite(s) => s.list(query).await,
        }
    }

    pub async fn count(&self, provider: Provider) -> Result<usize> {
        match self {
            PublicationStore::Memory(s) => s.count(provider).await,
            PublicationStore::Sqlite(s) => s.count(provider).await,
        }
    }
}

pub fn create_store(config: &StoreBackendConfig) -> Result<PublicationStore> {
    match config {
        StoreBackendConfig::Memory => Ok(PublicationStore::Memory(MemoryStore::new())),
        StoreBackendConfig::Sqlite { path } => Ok(PublicationStore::Sqlite(SqliteStore::open(path)?)),
    }
}

/// Substring test ignoring ASCII case, matching SQLite's `lower()`
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
