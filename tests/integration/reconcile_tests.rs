//! End-to-end reconciliation against mocked providers and an in-memory store

mod common;

use chrono::NaiveDate;
use publication_tracker::store::{MemoryStore, PublicationStore};
use publication_tracker::{
    NO_ABSTRACT, Provider, PublicationRecord, Reconciler, SearchRequest, TrackerConfig,
    TrackerError,
};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::{
    esearch_json, pubmed_article, pubmed_article_set, pubmed_client, scopus_abstract_json,
    scopus_client, scopus_entry, scopus_search_json,
};

fn tracker(server: &MockServer) -> Reconciler {
    tracker_with_store(server, PublicationStore::Memory(MemoryStore::new()))
}

fn tracker_with_store(server: &MockServer, store: PublicationStore) -> Reconciler {
    Reconciler::new(
        store,
        pubmed_client(server),
        scopus_client(server),
        TrackerConfig::default(),
    )
}

fn expression(term: &str) -> String {
    format!("(\"{}\"[Title/Abstract]) AND Journal Article[pt]", term)
}

async fn mount_esearch(server: &MockServer, term: &str, total: u64, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", expression(term)))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_json(total, ids)))
        .mount(server)
        .await;
}

/// Stores `record` through a separate store handle before answering, the
/// way an overlapping search would between lookup and insert
struct InsertThenRespond {
    store: PublicationStore,
    record: PublicationRecord,
    search_terms: &'static str,
    body: String,
}

impl Respond for InsertThenRespond {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let store = self.store.clone();
        let record = self.record.clone();
        let search_terms = self.search_terms;
        std::thread::spawn(move || {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(store.insert_new(vec![record], search_terms))
                .unwrap()
        })
        .join()
        .unwrap();
        ResponseTemplate::new(200).set_body_string(self.body.clone())
    }
}

async fn mount_efetch(server: &MockServer, ids: &str, articles: Vec<String>, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", ids))
        .respond_with(ResponseTemplate::new(200).set_body_string(pubmed_article_set(&articles)))
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
#[traced_test]
async fn test_repeated_search_inserts_nothing_new() {
    let server = MockServer::start().await;
    mount_esearch(&server, "sepsis", 1234, &["1", "2"]).await;
    mount_efetch(
        &server,
        "1,2",
        vec![
            pubmed_article(Some("1"), "Older sepsis paper", "A.", (2021, 3, 15)),
            pubmed_article(Some("2"), "Newer sepsis paper", "B.", (2023, 1, 10)),
        ],
        1,
    )
    .await;

    let tracker = tracker(&server);
    let cancel = CancellationToken::new();
    let request = SearchRequest::new("sepsis").with_limit(10);

    let first = tracker.search_pubmed(&request, &cancel).await.unwrap();
    assert_eq!(first.report.inserted, 2);
    assert_eq!(first.report.tagged, 0);
    assert_eq!(first.total_records, 1234);
    assert_eq!(first.filtered_records, 1234);
    let ids: Vec<&str> = first
        .rows
        .iter()
        .map(|r| r.record.provider_id.as_str())
        .collect();
    assert_eq!(ids, vec!["2", "1"]);

    let second = tracker.search_pubmed(&request, &cancel).await.unwrap();
    assert_eq!(second.report.inserted, 0);
    assert_eq!(second.report.tagged, 0);
    assert_eq!(second.rows.len(), 2);
    assert!(second.rows.iter().all(|r| r.search_terms == "sepsis"));

    assert_eq!(tracker.store().count(Provider::PubMed).await.unwrap(), 2);
}

#[tokio::test]
async fn test_new_term_tags_existing_records() {
    let server = MockServer::start().await;
    mount_esearch(&server, "sepsis", 2, &["1", "2"]).await;
    mount_esearch(&server, "septic shock", 2, &["2", "3"]).await;
    mount_esearch(&server, "SEPSIS", 2, &["1", "2"]).await;
    mount_efetch(
        &server,
        "1,2",
        vec![
            pubmed_article(Some("1"), "One", "A.", (2021, 1, 1)),
            pubmed_article(Some("2"), "Two", "B.", (2022, 1, 1)),
        ],
        1,
    )
    .await;
    mount_efetch(
        &server,
        "3",
        vec![pubmed_article(Some("3"), "Three", "C.", (2023, 1, 1))],
        1,
    )
    .await;

    let tracker = tracker(&server);
    let cancel = CancellationToken::new();

    tracker
        .search_pubmed(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap();
    let outcome = tracker
        .search_pubmed(&SearchRequest::new(" septic shock "), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.report.tagged, 1);
    assert_eq!(outcome.report.inserted, 1);

    let two = tracker
        .store()
        .get(Provider::PubMed, "2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(two.search_terms, "sepsis, septic shock");
    let three = tracker
        .store()
        .get(Provider::PubMed, "3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(three.search_terms, "septic shock");

    let listed: Vec<&str> = outcome
        .rows
        .iter()
        .map(|r| r.record.provider_id.as_str())
        .collect();
    assert_eq!(listed, vec!["3", "2"]);

    // Tags compare case-insensitively
    let again = tracker
        .search_pubmed(&SearchRequest::new("SEPSIS"), &cancel)
        .await
        .unwrap();
    assert_eq!(again.report.tagged, 0);
    let one = tracker
        .store()
        .get(Provider::PubMed, "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.search_terms, "sepsis");
}

#[tokio::test]
async fn test_term_with_commas_is_tagged_once() {
    let server = MockServer::start().await;
    mount_esearch(&server, "sepsis", 1, &["1"]).await;
    mount_esearch(&server, "sepsis, shock", 2, &["1", "2"]).await;
    mount_efetch(
        &server,
        "1",
        vec![pubmed_article(Some("1"), "One", "A.", (2021, 1, 1))],
        1,
    )
    .await;
    mount_efetch(
        &server,
        "2",
        vec![pubmed_article(Some("2"), "Two", "B.", (2022, 1, 1))],
        1,
    )
    .await;

    let tracker = tracker(&server);
    let cancel = CancellationToken::new();
    let request = SearchRequest::new("sepsis, shock");

    tracker
        .search_pubmed(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap();
    let first = tracker.search_pubmed(&request, &cancel).await.unwrap();
    assert_eq!(first.report.tagged, 1);
    assert_eq!(first.report.inserted, 1);

    let second = tracker.search_pubmed(&request, &cancel).await.unwrap();
    assert_eq!(second.report.tagged, 0);
    assert_eq!(second.report.inserted, 0);
    assert_eq!(second.rows.len(), 2);
    assert!(second.rows.iter().all(|r| r.search_terms == "sepsis, shock"));
}

#[tokio::test]
async fn test_record_stored_mid_search_is_tagged_not_duplicated() {
    let server = MockServer::start().await;
    mount_esearch(&server, "sepsis", 2, &["1", "2"]).await;

    let store = PublicationStore::Memory(MemoryStore::new());
    let stored_elsewhere = PublicationRecord {
        provider: Provider::PubMed,
        provider_id: "1".to_string(),
        title: "Stored by another search".to_string(),
        abstract_text: "A.".to_string(),
        authors: vec!["Singer M".to_string()],
        publication_date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
        record_url: "https://pubmed.ncbi.nlm.nih.gov/1/".to_string(),
        url: None,
    };
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", "1,2"))
        .respond_with(InsertThenRespond {
            store: store.clone(),
            record: stored_elsewhere,
            search_terms: "septic shock",
            body: pubmed_article_set(&[
                pubmed_article(Some("1"), "One", "A.", (2021, 1, 1)),
                pubmed_article(Some("2"), "Two", "B.", (2022, 1, 1)),
            ]),
        })
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker_with_store(&server, store.clone());
    let outcome = tracker
        .search_pubmed(&SearchRequest::new("sepsis"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.report.seen, 2);
    assert_eq!(outcome.report.inserted, 1);
    assert_eq!(outcome.report.skipped_duplicates, 1);
    assert_eq!(outcome.report.tagged, 1);
    assert_eq!(store.count(Provider::PubMed).await.unwrap(), 2);

    let one = store.get(Provider::PubMed, "1").await.unwrap().unwrap();
    assert_eq!(one.record.title, "Stored by another search");
    assert_eq!(one.search_terms, "septic shock, sepsis");

    let listed: Vec<&str> = outcome
        .rows
        .iter()
        .map(|r| r.record.provider_id.as_str())
        .collect();
    assert_eq!(listed, vec!["2", "1"]);
}

#[tokio::test]
async fn test_filter_switches_totals_to_local_counts() {
    let server = MockServer::start().await;
    mount_esearch(&server, "sepsis", 500, &["1", "2", "3"]).await;
    mount_efetch(
        &server,
        "1,2,3",
        vec![
            pubmed_article(Some("1"), "Sepsis in children", "A.", (2021, 1, 1)),
            pubmed_article(Some("2"), "Septic shock in adults", "B.", (2022, 1, 1)),
            pubmed_article(Some("3"), "Fluid therapy", "Shock resuscitation.", (2023, 1, 1)),
        ],
        1,
    )
    .await;

    let tracker = tracker(&server);
    let outcome = tracker
        .search_pubmed(
            &SearchRequest::new("sepsis").with_filter("SHOCK"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.total_records, 3);
    assert_eq!(outcome.filtered_records, 2);
    let ids: Vec<&str> = outcome
        .rows
        .iter()
        .map(|r| r.record.provider_id.as_str())
        .collect();
    assert_eq!(ids, vec!["3", "2"]);
}

#[tokio::test]
async fn test_guard_rails_skip_provider_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let cancel = CancellationToken::new();

    let beyond = tracker
        .search_pubmed(&SearchRequest::new("sepsis").with_offset(10_000), &cancel)
        .await
        .unwrap();
    assert_eq!(beyond.total_records, 0);
    assert!(beyond.rows.is_empty());

    let beyond = tracker
        .search_scopus(&SearchRequest::new("sepsis").with_offset(10_000), &cancel)
        .await
        .unwrap();
    assert!(beyond.rows.is_empty());

    let err = tracker
        .search_pubmed(&SearchRequest::new("   "), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::InvalidQuery(_)));
}

#[tokio::test]
#[traced_test]
async fn test_scopus_backfill_and_abstract_persistence() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/scopus"))
        .respond_with(ResponseTemplate::new(200).set_body_string(scopus_search_json(
            2,
            vec![
                scopus_entry("100", "Backfilled", "2022-05-01", "Smith J."),
                scopus_entry("200", "Left as placeholder", "2023-02-01", "Doe A."),
            ],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abstract/scopus_id/100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(scopus_abstract_json(
            "100",
            "Backfilled",
            Some("Detailed abstract."),
            "10.1/a",
        )))
        .expect(1)
        .mount(&server)
        .await;
    // The first detail call for 200 fails; later ones succeed
    Mock::given(method("GET"))
        .and(path("/abstract/scopus_id/200"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abstract/scopus_id/200"))
        .respond_with(ResponseTemplate::new(200).set_body_string(scopus_abstract_json(
            "200",
            "Left as placeholder",
            Some("Fetched on demand."),
            "10.1/b",
        )))
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let cancel = CancellationToken::new();

    let outcome = tracker
        .search_scopus(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.report.inserted, 2);
    assert_eq!(outcome.total_records, 2);

    let backfilled = tracker
        .store()
        .get(Provider::Scopus, "100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backfilled.record.abstract_text, "Detailed abstract.");
    assert_eq!(backfilled.record.authors, vec!["Smith J."]);

    let placeholder = tracker
        .store()
        .get(Provider::Scopus, "200")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placeholder.record.abstract_text, NO_ABSTRACT);

    let text = tracker.get_abstract("200", &cancel).await.unwrap();
    assert_eq!(text, "Fetched on demand.");
    let updated = tracker
        .store()
        .get(Provider::Scopus, "200")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.record.abstract_text, "Fetched on demand.");

    // A repeated search reuses the stored rows
    let again = tracker
        .search_scopus(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap();
    assert_eq!(again.report.inserted, 0);
    assert_eq!(again.rows.len(), 2);
}

#[tokio::test]
async fn test_counts_cover_trend_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_json(5, &[])))
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let window = tracker.trend_window();
    let counts = tracker
        .counts_over_time(Provider::PubMed, "sepsis", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(counts.len(), 5);
    assert_eq!(
        counts.keys().next().map(String::as_str),
        Some(window.start_year().to_string().as_str())
    );
    assert!(counts.values().all(|c| *c == 5));
}

#[tokio::test]
async fn test_cancelled_search_leaves_store_untouched() {
    let server = MockServer::start().await;
    mount_esearch(&server, "sepsis", 1, &["1"]).await;

    let tracker = tracker(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = tracker
        .search_pubmed(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(tracker.store().count(Provider::PubMed).await.unwrap(), 0);
}
