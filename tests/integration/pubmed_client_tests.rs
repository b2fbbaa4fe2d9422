//! PubMed client behaviour against a mocked E-utilities server

mod common;

use chrono::NaiveDate;
use publication_tracker::{DateRange, SearchRequest, SortKey, TrackerError};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{esearch_json, pubmed_article, pubmed_article_set, pubmed_client};

const SEPSIS_EXPRESSION: &str = "(\"sepsis\"[Title/Abstract]) AND Journal Article[pt]";

#[tokio::test]
#[traced_test]
async fn test_search_sends_fixed_query_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("term", SEPSIS_EXPRESSION))
        .and(query_param("retmode", "json"))
        .and(query_param("usehistory", "y"))
        .and(query_param("retstart", "20"))
        .and(query_param("retmax", "100"))
        .and(query_param("sort", "pub_date"))
        .and(query_param("datetype", "crdt"))
        .and(query_param("mindate", "2020/01/01"))
        .and(query_param("maxdate", "2022/12/31"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(esearch_json(1234, &["3", "2", "1"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = pubmed_client(&server);
    let request = SearchRequest::new("  sepsis ")
        .with_offset(20)
        .with_limit(100)
        .with_sort(SortKey::PublicationDate)
        .with_date_range(DateRange::years(2020, 2022).unwrap());

    let page = client
        .search(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(page.total, 1234);
    assert_eq!(page.ids, vec!["3", "2", "1"]);
    assert!(page.has_history());
}

#[tokio::test]
async fn test_search_without_range_uses_relative_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("reldate", "365"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_json(0, &[])))
        .expect(1)
        .mount(&server)
        .await;

    let page = pubmed_client(&server)
        .search(&SearchRequest::new("sepsis"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_null_payload_is_an_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let page = pubmed_client(&server)
        .search(&SearchRequest::new("sepsis"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(page.ids.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_esearch_error_field_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"esearchresult":{"ERROR":"Invalid query syntax"}}"#),
        )
        .mount(&server)
        .await;

    let err = pubmed_client(&server)
        .search(&SearchRequest::new("sepsis"), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        TrackerError::ApiError { message, .. } => assert!(message.contains("Invalid query syntax")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_failure_maps_to_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = pubmed_client(&server)
        .search(&SearchRequest::new("sepsis"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::ApiError { status: 503, .. }));
    assert!(err.is_provider_error());
}

#[tokio::test]
#[traced_test]
async fn test_fetch_full_drops_articles_without_pmid() {
    let server = MockServer::start().await;

    let xml = pubmed_article_set(&[
        pubmed_article(
            Some("31978945"),
            "Sepsis-3 definitions",
            "Sepsis is life-threatening organ dysfunction.",
            (2021, 3, 15),
        ),
        pubmed_article(None, "Orphan article", "No identifier.", (2021, 4, 1)),
    ]);

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", "31978945,99999999"))
        .and(query_param("retmode", "xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .expect(1)
        .mount(&server)
        .await;

    let records = pubmed_client(&server)
        .fetch_full(
            &["31978945".to_string(), "99999999".to_string()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.provider_id, "31978945");
    assert_eq!(record.title, "Sepsis-3 definitions");
    assert_eq!(record.authors, vec!["Singer M", "Deutschman CS"]);
    assert_eq!(
        record.publication_date,
        NaiveDate::from_ymd_opt(2021, 3, 15).unwrap()
    );
    assert_eq!(record.record_url, "https://pubmed.ncbi.nlm.nih.gov/31978945/");
}

#[tokio::test]
#[traced_test]
async fn test_counts_over_time_reports_failed_year_as_zero() {
    let server = MockServer::start().await;

    for (year, response) in [
        (2020, ResponseTemplate::new(200).set_body_string(esearch_json(10, &[]))),
        (2021, ResponseTemplate::new(500)),
        (2022, ResponseTemplate::new(200).set_body_string(esearch_json(30, &[]))),
    ] {
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("retmax", "0"))
            .and(query_param("mindate", format!("{}/01/01", year)))
            .and(query_param("maxdate", format!("{}/12/31", year)))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;
    }

    let counts = pubmed_client(&server)
        .counts_over_time("sepsis", 2020, 2022, &CancellationToken::new())
        .await
        .unwrap();

    let years: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(years, vec![("2020", 10), ("2021", 0), ("2022", 30)]);
}

#[tokio::test]
async fn test_type_distribution_covers_every_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param(
            "term",
            "(\"sepsis\"[Title/Abstract]) AND Review[pt]",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_json(42, &[])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_json(1, &[])))
        .mount(&server)
        .await;

    let distribution = pubmed_client(&server)
        .type_distribution("sepsis", 4, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(distribution.len(), 6);
    assert_eq!(distribution["Review"], 42);
    assert_eq!(distribution["Meta-Analysis"], 1);
}

#[tokio::test]
async fn test_fetch_summaries_replays_history() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_json(2, &["11", "12"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("query_key", "1"))
        .and(query_param("WebEnv", "MCID_test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"result":{"uids":["11","12"],
                "11":{"uid":"11","title":"First","pubdate":"2022 Jan","source":"Crit Care","authors":[{"name":"Doe J"}]},
                "12":{"uid":"12","title":"Second","pubdate":"2021","source":"","fulljournalname":"Lancet","authors":[]}}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = pubmed_client(&server);
    let cancel = CancellationToken::new();
    let page = client
        .search(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap();
    let summaries = client.fetch_summaries(&page, &cancel).await.unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].title, "First");
    assert_eq!(summaries[0].authors, vec!["Doe J"]);
    assert_eq!(summaries[1].source, "Lancet");
}

#[tokio::test]
async fn test_cancelled_search_returns_cancelled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(esearch_json(1, &["1"]))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = pubmed_client(&server)
        .search(&SearchRequest::new("sepsis"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
