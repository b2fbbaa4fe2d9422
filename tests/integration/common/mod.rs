//! Shared fixtures and mock-server helpers for the integration tests

#![allow(dead_code)]

use std::time::Duration;

use publication_tracker::{ClientConfig, PubMedClient, ScopusClient, ScopusConfig};
use serde_json::json;
use wiremock::MockServer;

pub const SCOPUS_API_KEY: &str = "test-scopus-key";

/// PubMed client pointed at `server` with a rate limit that never throttles tests
pub fn pubmed_client(server: &MockServer) -> PubMedClient {
    PubMedClient::with_config(
        ClientConfig::new()
            .with_base_url(server.uri())
            .with_rate_limit(100.0)
            .with_timeout(Duration::from_secs(5)),
    )
}

/// Scopus client pointed at `server` with no delay between detail calls
pub fn scopus_client(server: &MockServer) -> ScopusClient {
    ScopusClient::with_config(
        ScopusConfig::new()
            .with_base_url(server.uri())
            .with_api_key(SCOPUS_API_KEY)
            .with_detail_delay(Duration::from_millis(0))
            .with_timeout(Duration::from_secs(5)),
    )
}

pub fn esearch_json(count: u64, ids: &[&str]) -> String {
    json!({
        "header": { "type": "esearch", "version": "0.3" },
        "esearchresult": {
            "count": count.to_string(),
            "retmax": ids.len().to_string(),
            "retstart": "0",
            "querykey": "1",
            "webenv": "MCID_test",
            "idlist": ids,
        }
    })
    .to_string()
}

/// One `<PubmedArticle>` with a `PubStatus="pubmed"` history date
pub fn pubmed_article(pmid: Option<&str>, title: &str, abstract_text: &str, date: (i32, u32, u32)) -> String {
    let pmid = pmid
        .map(|id| format!("<PMID Version=\"1\">{}</PMID>", id))
        .unwrap_or_default();
    format!(
        r#"<PubmedArticle>
  <MedlineCitation Status="MEDLINE">
    {pmid}
    <Article>
      <Journal><Title>Critical Care</Title></Journal>
      <ArticleTitle>{title}</ArticleTitle>
      <Abstract><AbstractText>{abstract_text}</AbstractText></Abstract>
      <AuthorList>
        <Author><LastName>Singer</LastName><ForeName>Mervyn</ForeName><Initials>M</Initials></Author>
        <Author><LastName>Deutschman</LastName><ForeName>Clifford S</ForeName><Initials>CS</Initials></Author>
      </AuthorList>
      <PublicationTypeList><PublicationType>Journal Article</PublicationType></PublicationTypeList>
    </Article>
  </MedlineCitation>
  <PubmedData>
    <History>
      <PubMedPubDate PubStatus="pubmed"><Year>{y}</Year><Month>{m}</Month><Day>{d}</Day></PubMedPubDate>
    </History>
  </PubmedData>
</PubmedArticle>"#,
        pmid = pmid,
        title = title,
        abstract_text = abstract_text,
        y = date.0,
        m = date.1,
        d = date.2,
    )
}

pub fn pubmed_article_set(articles: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" ?>\n<PubmedArticleSet>\n{}\n</PubmedArticleSet>",
        articles.join("\n")
    )
}

/// A Scopus search entry. `description` is usually absent in the STANDARD view.
pub fn scopus_entry(id: &str, title: &str, cover_date: &str, creator: &str) -> serde_json::Value {
    json!({
        "dc:identifier": format!("SCOPUS_ID:{}", id),
        "dc:title": title,
        "dc:creator": creator,
        "prism:publicationName": "Intensive Care Medicine",
        "prism:coverDate": cover_date,
        "prism:url": format!("https://api.elsevier.com/content/abstract/scopus_id/{}", id),
    })
}

pub fn scopus_search_json(total: u64, entries: Vec<serde_json::Value>) -> String {
    json!({
        "search-results": {
            "opensearch:totalResults": total.to_string(),
            "opensearch:startIndex": "0",
            "entry": entries,
        }
    })
    .to_string()
}

pub fn scopus_abstract_json(id: &str, title: &str, abstract_text: Option<&str>, doi: &str) -> String {
    json!({
        "abstracts-retrieval-response": {
            "coredata": {
                "dc:identifier": format!("SCOPUS_ID:{}", id),
                "dc:title": title,
                "prism:doi": doi,
                "prism:coverDate": "2022-04-01",
                "subtypeDescription": "Article",
            },
            "item": {
                "bibrecord": {
                    "head": { "abstracts": abstract_text }
                }
            },
            "authors": {
                "author": [
                    { "ce:indexed-name": "Smith J." },
                    { "ce:indexed-name": "Doe A." }
                ]
            }
        }
    })
    .to_string()
}
