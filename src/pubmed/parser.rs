//! EFetch XML (`<PubmedArticleSet>`) to [`PublicationRecord`]

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::models::{NO_ABSTRACT, NO_TITLE, Provider, PublicationRecord};

pub struct PubMedXmlParser;

impl PubMedXmlParser {
    /// Parse every `<PubmedArticle>` in an EFetch response.
    ///
    /// Articles without a PMID, or whose `PubStatus="pubmed"` history date
    /// does not parse, are skipped with a warning. Only malformed XML is an
    /// error.
    #[instrument(skip(xml), fields(xml_size = xml.len()))]
    pub fn parse_articles(xml: &str) -> Result<Vec<PublicationRecord>> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        let mut buf = Vec::new();

        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut current: Option<ArticleState> = None;
        let mut records = Vec::new();
        let mut dropped = 0usize;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let name = e.name().as_ref().to_vec();
                    if let Some(article) = current.as_mut() {
                        article.open(&name, e, &path);
                    } else if name == b"PubmedArticle" {
                        current = Some(ArticleState::default());
                    }
                    path.push(name);
                }
                Event::End(ref e) => {
                    path.pop();
                    let name = e.name();
                    if name.as_ref() == b"PubmedArticle" {
                        if let Some(article) = current.take() {
                            match article.finish() {
                                Ok(record) => records.push(record),
                                Err(reason) => {
                                    dropped += 1;
                                    warn!(reason, "Dropping unparsable PubMed article");
                                }
                            }
                        }
                    } else if let Some(article) = current.as_mut() {
                        article.close(name.as_ref());
                    }
                }
                Event::Text(e) => {
                    if let Some(article) = current.as_mut() {
                        let text = match e.unescape() {
                            Ok(text) => text.into_owned(),
                            Err(_) => String::from_utf8_lossy(&e).into_owned(),
                        };
                        article.text(&text, &path);
                    }
                }
                Event::CData(e) => {
                    if let Some(article) = current.as_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        article.text(&text, &path);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        debug!(parsed = records.len(), dropped, "Parsed PubMed article set");
        Ok(records)
    }
}

#[derive(Default)]
struct ArticleState {
    pmid: Option<String>,
    title: String,
    abstract_parts: Vec<String>,
    authors: Vec<String>,
    author: Option<AuthorState>,
    in_pubmed_history_date: bool,
    /// Only the first `PubStatus="pubmed"` entry is read
    pubmed_history_date_read: bool,
    year: String,
    month: String,
    day: String,
}

#[derive(Default)]
struct AuthorState {
    last_name: String,
    initials: String,
}

impl ArticleState {
    fn open(&mut self, name: &[u8], e: &BytesStart<'_>, path: &[Vec<u8>]) {
        match name {
            b"AbstractText" if in_element(path, b"Abstract") => {
                self.abstract_parts.push(String::new());
            }
            b"Author" => self.author = Some(AuthorState::default()),
            b"PubMedPubDate" if !self.pubmed_history_date_read => {
                self.in_pubmed_history_date = e
                    .attributes()
                    .flatten()
                    .any(|attr| attr.key.as_ref() == b"PubStatus" && attr.value.as_ref() == b"pubmed");
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"Author" => {
                if let Some(author) = self.author.take() {
                    let name = format!(
                        "{} {}",
                        collapse_whitespace(&author.last_name),
                        collapse_whitespace(&author.initials)
                    );
                    let name = name.trim();
                    if !name.is_empty() {
                        self.authors.push(name.to_string());
                    }
                }
            }
            b"PubMedPubDate" if self.in_pubmed_history_date => {
                self.in_pubmed_history_date = false;
                self.pubmed_history_date_read = true;
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str, path: &[Vec<u8>]) {
        let Some(leaf) = path.last().map(Vec::as_slice) else {
            return;
        };

        if leaf == b"PMID" && parent_is(path, b"MedlineCitation") {
            if self.pmid.is_none() && !text.trim().is_empty() {
                self.pmid = Some(text.trim().to_string());
            }
            return;
        }

        // Title and abstract may contain inline markup (<i>, <sup>)
        if in_element(path, b"ArticleTitle") {
            self.title.push_str(text);
            return;
        }
        // <OtherAbstract> (translations, publisher abstracts) is skipped
        if in_element(path, b"AbstractText") {
            if in_element(path, b"Abstract") {
                if let Some(part) = self.abstract_parts.last_mut() {
                    part.push_str(text);
                }
            }
            return;
        }

        if let Some(author) = self.author.as_mut() {
            match leaf {
                b"LastName" => author.last_name.push_str(text),
                b"Initials" => author.initials.push_str(text),
                _ => {}
            }
            return;
        }

        if self.in_pubmed_history_date {
            match leaf {
                b"Year" => self.year.push_str(text),
                b"Month" => self.month.push_str(text),
                b"Day" => self.day.push_str(text),
                _ => {}
            }
        }
    }

    fn finish(self) -> std::result::Result<PublicationRecord, &'static str> {
        let pmid = self.pmid.ok_or("missing PMID")?;
        let publication_date = parse_history_date(&self.year, &self.month, &self.day)
            .ok_or("unparsable pubmed history date")?;

        let title = collapse_whitespace(&self.title);
        let abstract_text = self
            .abstract_parts
            .iter()
            .map(|part| collapse_whitespace(part))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(PublicationRecord {
            provider: Provider::PubMed,
            record_url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
            provider_id: pmid,
            title: if title.is_empty() {
                NO_TITLE.to_string()
            } else {
                title
            },
            abstract_text: if abstract_text.is_empty() {
                NO_ABSTRACT.to_string()
            } else {
                abstract_text
            },
            authors: self.authors,
            publication_date,
            url: None,
        })
    }
}

fn in_element(path: &[Vec<u8>], name: &[u8]) -> bool {
    path.iter().any(|p| p.as_slice() == name)
}

fn parent_is(path: &[Vec<u8>], name: &[u8]) -> bool {
    path.len() >= 2 && path[path.len() - 2].as_slice() == name
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Year, month and day must all be present. Months may be numeric or
/// English names/abbreviations.
fn parse_history_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.trim().parse().ok()?;
    let month = parse_month(month.trim())?;
    let day: u32 = day.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_month(month: &str) -> Option<u32> {
    if let Ok(n) = month.parse::<u32>() {
        return Some(n);
    }
    let lower = month.to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    let index = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == prefix)?;
    Some(index as u32 + 1)
}
