//! Merge provider search results into the local store
//!
//! For every search the provider's id page is split into ids the store
//! already knows and new ones. Known rows gain the search term as a tag
//! (one batched update); new ids are fetched in full, tagged and inserted.
//! The caller then gets a page of stored rows for the term.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Local;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cancel::check_cancelled;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::models::{DateRange, Provider, PublicationRecord, SearchRequest};
use crate::pubmed::PubMedClient;
use crate::scopus::ScopusClient;
use crate::store::{ListQuery, PublicationStore, StoredPublication};
use crate::tags::normalize_search_term;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Ids on the provider page
    pub seen: usize,
    /// Known rows that gained the search term, including rows found on the
    /// pre-insert re-check
    pub tagged: usize,
    pub inserted: usize,
    /// New ids found in the store on the pre-insert re-check
    pub skipped_duplicates: usize,
    /// New ids for which no usable record came back
    pub dropped: usize,
}

/// Result of a provider search as seen by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub total_records: u64,
    pub filtered_records: u64,
    pub rows: Vec<StoredPublication>,
    pub report: ReconcileReport,
}

#[derive(Clone)]
pub struct Reconciler {
    store: PublicationStore,
    pubmed: PubMedClient,
    scopus: ScopusClient,
    config: TrackerConfig,
}

impl Reconciler {
    pub fn new(
        store: PublicationStore,
        pubmed: PubMedClient,
        scopus: ScopusClient,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            pubmed,
            scopus,
            config,
        }
    }

    pub fn store(&self) -> &PublicationStore {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Jan 1 of `current_year - trend_years` through today
    pub fn trend_window(&self) -> DateRange {
        DateRange::trailing_years(Local::now().date_naive(), self.config.trend_years)
    }

    /// Search PubMed, reconcile the page into the store and list stored rows
    #[instrument(skip(self, request, cancel), fields(term = %request.term, offset = request.offset))]
    pub async fn search_pubmed(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let term = request.validated_term()?.to_string();
        if request.offset > self.config.max_offset {
            debug!(offset = request.offset, "Offset beyond provider paging limit");
            return Ok(SearchOutcome::default());
        }
        let tag = normalize_search_term(&term);

        let provider_request = self.provider_request(request, &term, self.config.pubmed_page_size);
        let page = self.pubmed.search(&provider_request, cancel).await?;
        let ids = dedup_ids(page.ids.iter().cloned());

        let mut report = ReconcileReport {
            seen: ids.len(),
            ..Default::default()
        };
        let new_ids = self
            .tag_existing(Provider::PubMed, &ids, &tag, &mut report)
            .await?;

        if !new_ids.is_empty() {
            check_cancelled(cancel)?;
            let records = self.pubmed.fetch_full(&new_ids, cancel).await?;
            let records = keep_requested(records, &new_ids);
            report.dropped = new_ids.len() - records.len();
            self.insert_fresh(Provider::PubMed, records, &tag, &mut report)
                .await?;
        }

        info!(?report, "PubMed reconciliation finished");
        self.outcome(Provider::PubMed, request, &tag, page.total, report)
            .await
    }

    /// Search Scopus, reconcile the page into the store and list stored rows.
    ///
    /// New records come from the search entries; their placeholder
    /// abstracts are then backfilled one detail request at a time.
    #[instrument(skip(self, request, cancel), fields(term = %request.term, offset = request.offset))]
    pub async fn search_scopus(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let term = request.validated_term()?.to_string();
        if request.offset > self.config.max_offset {
            debug!(offset = request.offset, "Offset beyond provider paging limit");
            return Ok(SearchOutcome::default());
        }
        let tag = normalize_search_term(&term);

        let provider_request = self.provider_request(request, &term, self.config.scopus_page_size);
        let page = self.scopus.search(&provider_request, cancel).await?;
        let ids = dedup_ids(page.records.iter().map(|r| r.provider_id.clone()));

        let mut report = ReconcileReport {
            seen: ids.len(),
            ..Default::default()
        };
        let new_ids = self
            .tag_existing(Provider::Scopus, &ids, &tag, &mut report)
            .await?;

        if !new_ids.is_empty() {
            check_cancelled(cancel)?;
            let records = keep_requested(page.records, &new_ids);
            let records = self.backfill_abstracts(records, cancel).await?;
            report.dropped = new_ids.len() - records.len();
            self.insert_fresh(Provider::Scopus, records, &tag, &mut report)
                .await?;
        }

        info!(?report, "Scopus reconciliation finished");
        self.outcome(Provider::Scopus, request, &tag, page.total, report)
            .await
    }

    /// Fetch a Scopus abstract and store it on the matching record, if any
    #[instrument(skip(self, cancel))]
    pub async fn get_abstract(&self, scopus_id: &str, cancel: &CancellationToken) -> Result<String> {
        let record = self.scopus.fetch_abstract(scopus_id, cancel).await?;
        let updated = self
            .store
            .update_abstract(Provider::Scopus, &record.provider_id, &record.abstract_text)
            .await?;
        if !updated {
            debug!(scopus_id, "Abstract fetched for a record that is not stored");
        }
        Ok(record.abstract_text)
    }

    /// Yearly counts over the trend window
    #[instrument(skip(self, cancel))]
    pub async fn counts_over_time(
        &self,
        provider: Provider,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>> {
        let window = self.trend_window();
        match provider {
            Provider::PubMed => {
                self.pubmed
                    .counts_over_time(term, window.start_year(), window.end_year(), cancel)
                    .await
            }
            Provider::Scopus => {
                self.scopus
                    .counts_over_time(term, window.start_year(), window.end_year(), cancel)
                    .await
            }
        }
    }

    /// Counts per publication or source type over the trend window
    #[instrument(skip(self, cancel))]
    pub async fn type_distribution(
        &self,
        provider: Provider,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>> {
        let years = self.config.trend_years;
        match provider {
            Provider::PubMed => self.pubmed.type_distribution(term, years, cancel).await,
            Provider::Scopus => self.scopus.type_distribution(term, years, cancel).await,
        }
    }

    fn provider_request(&self, request: &SearchRequest, term: &str, page_size: usize) -> SearchRequest {
        let mut provider_request = SearchRequest::new(term)
            .with_offset(request.offset)
            .with_limit(page_size)
            .with_date_range(request.date_range.unwrap_or_else(|| self.trend_window()));
        if let Some(sort) = request.sort {
            provider_request = provider_request.with_sort(sort);
        }
        provider_request
    }

    /// Tag the already-stored subset of `ids` and return the rest, in order
    async fn tag_existing(
        &self,
        provider: Provider,
        ids: &[String],
        term: &str,
        report: &mut ReconcileReport,
    ) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.store.find_existing(provider, ids).await?;
        let known: HashSet<&str> = existing
            .iter()
            .map(|row| row.record.provider_id.as_str())
            .collect();

        let row_ids: Vec<i64> = existing.iter().map(|row| row.id).collect();
        report.tagged = self.store.append_search_term(row_ids, term).await?;

        let new_ids: Vec<String> = ids
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();
        debug!(known = known.len(), new = new_ids.len(), "Partitioned provider ids");
        Ok(new_ids)
    }

    /// Re-check the store right before inserting so rows written since the
    /// first lookup are not inserted twice. Those rows are tagged instead.
    async fn insert_fresh(
        &self,
        provider: Provider,
        records: Vec<PublicationRecord>,
        term: &str,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = records.iter().map(|r| r.provider_id.clone()).collect();
        let raced = self.store.find_existing(provider, &ids).await?;
        report.tagged += self
            .store
            .append_search_term(raced.iter().map(|row| row.id).collect(), term)
            .await?;
        let present: HashSet<String> = raced
            .into_iter()
            .map(|row| row.record.provider_id)
            .collect();

        let fresh: Vec<PublicationRecord> = records
            .into_iter()
            .filter(|r| !present.contains(&r.provider_id))
            .collect();
        let attempted = fresh.len();

        report.inserted = self.store.insert_new(fresh, term).await?;
        report.skipped_duplicates = present.len() + (attempted - report.inserted);
        if report.skipped_duplicates > 0 {
            debug!(
                skipped = report.skipped_duplicates,
                "Records appeared in the store before insert"
            );
        }
        Ok(())
    }

    async fn backfill_abstracts(
        &self,
        mut records: Vec<PublicationRecord>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicationRecord>> {
        let missing: Vec<String> = records
            .iter()
            .filter(|r| r.has_placeholder_abstract())
            .map(|r| r.provider_id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(records);
        }

        let details: HashMap<String, PublicationRecord> = self
            .scopus
            .fetch_full(&missing, cancel)
            .await?
            .into_iter()
            .map(|r| (r.provider_id.clone(), r))
            .collect();

        for record in records.iter_mut() {
            match details.get(&record.provider_id) {
                Some(detail) => {
                    record.abstract_text = detail.abstract_text.clone();
                    if record.url.is_none() {
                        record.url = detail.url.clone();
                    }
                }
                None if record.has_placeholder_abstract() => {
                    warn!(scopus_id = %record.provider_id, "Keeping placeholder abstract");
                }
                None => {}
            }
        }
        Ok(records)
    }

    async fn outcome(
        &self,
        provider: Provider,
        request: &SearchRequest,
        term: &str,
        provider_total: u64,
        report: ReconcileReport,
    ) -> Result<SearchOutcome> {
        let listing = self
            .store
            .list(&ListQuery {
                provider,
                term: term.to_string(),
                filter: request.filter.clone(),
                offset: request.offset,
                limit: request.limit,
            })
            .await?;

        // Without a filter the provider's own total drives paging
        let (total_records, filtered_records) = match request.filter {
            Some(_) => (listing.total as u64, listing.filtered as u64),
            None => (provider_total, provider_total),
        };

        Ok(SearchOutcome {
            total_records,
            filtered_records,
            rows: listing.rows,
            report,
        })
    }
}

fn dedup_ids<I: IntoIterator<Item = String>>(ids: I) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Keep one record per requested id, dropping anything the provider sent
/// that was not asked for
fn keep_requested(records: Vec<PublicationRecord>, ids: &[String]) -> Vec<PublicationRecord> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut taken = HashSet::new();
    records
        .into_iter()
        .filter(|r| wanted.contains(r.provider_id.as_str()) && taken.insert(r.provider_id.clone()))
        .collect()
}
