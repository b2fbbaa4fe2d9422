use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Provider, PublicationRecord};
use crate::store::{ListPage, ListQuery, StoredPublication, contains_ci};
use crate::tags::merge_search_term;

/// In-process store, mostly for tests and one-off runs
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    rows: BTreeMap<i64, StoredPublication>,
    keys: HashMap<(Provider, String), i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find_existing(
        &self,
        provider: Provider,
        ids: &[String],
    ) -> Result<Vec<StoredPublication>> {
        let state = self.state.read().await;
        let found: Vec<StoredPublication> = ids
            .iter()
            .filter_map(|id| state.keys.get(&(provider, id.clone())))
            .filter_map(|row_id| state.rows.get(row_id).cloned())
            .collect();
        debug!(requested = ids.len(), found = found.len(), "Looked up existing records");
        Ok(found)
    }

    pub async fn append_search_term(&self, row_ids: Vec<i64>, term: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for id in row_ids {
            let Some(row) = state.rows.get_mut(&id) else {
                continue;
            };
            if let Some(merged) = merge_search_term(Some(row.search_terms.as_str()), term) {
                row.search_terms = merged;
                changed += 1;
            }
        }
        info!(changed, "Updated search tags");
        Ok(changed)
    }

    pub async fn insert_new(
        &self,
        records: Vec<PublicationRecord>,
        search_terms: &str,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for record in records {
            let key = (record.provider, record.provider_id.clone());
            if state.keys.contains_key(&key) {
                debug!(provider_id = %record.provider_id, "Skipping duplicate record");
                continue;
            }
            state.next_id += 1;
            let id = state.next_id;
            state.keys.insert(key, id);
            state.rows.insert(
                id,
                StoredPublication {
                    id,
                    record,
                    search_terms: search_terms.to_string(),
                },
            );
            inserted += 1;
        }
        info!(inserted, "Inserted records");
        Ok(inserted)
    }

    pub async fn update_abstract(
        &self,
        provider: Provider,
        provider_id: &str,
        abstract_text: &str,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(id) = state.keys.get(&(provider, provider_id.to_string())).copied() else {
            return Ok(false);
        };
        match state.rows.get_mut(&id) {
            Some(row) => {
                row.record.abstract_text = abstract_text.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn get(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<StoredPublication>> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .get(&(provider, provider_id.to_string()))
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    pub async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        let state = self.state.read().await;

        let matching: Vec<&StoredPublication> = state
            .rows
            .values()
            .filter(|row| {
                row.record.provider == query.provider && contains_ci(&row.search_terms, &query.term)
            })
            .collect();
        let total = matching.len();

        let mut filtered: Vec<&StoredPublication> = match query.filter.as_deref() {
            Some(filter) => matching
                .into_iter()
                .filter(|row| matches_filter(&row.record, filter))
                .collect(),
            None => matching,
        };
        // BTreeMap iteration is in id order, so a stable sort keeps ties by id
        filtered.sort_by(|a, b| b.record.publication_date.cmp(&a.record.publication_date));

        let rows = filtered
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|row| (*row).clone())
            .collect();

        Ok(ListPage {
            total,
            filtered: filtered.len(),
            rows,
        })
    }

    pub async fn count(&self, provider: Provider) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .rows
            .values()
            .filter(|row| row.record.provider == provider)
            .count())
    }
}

fn matches_filter(record: &PublicationRecord, filter: &str) -> bool {
    contains_ci(&record.title, filter)
        || contains_ci(&record.abstract_text, filter)
        || record.authors.iter().any(|a| contains_ci(a, filter))
}
