use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::{
    Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};
use tracing::{debug, info, instrument};

use crate::error::{Result, TrackerError};
use crate::models::{Provider, PublicationRecord};
use crate::store::{ListPage, ListQuery, StoredPublication};
use crate::tags::merge_search_term;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS publications (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    provider         TEXT    NOT NULL,
    provider_id      TEXT    NOT NULL,
    title            TEXT    NOT NULL,
    abstract         TEXT    NOT NULL,
    record_url       TEXT    NOT NULL,
    url              TEXT,
    search_terms     TEXT    NOT NULL DEFAULT '',
    publication_date TEXT    NOT NULL,
    UNIQUE (provider, provider_id)
);
CREATE TABLE IF NOT EXISTS publication_authors (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    publication_id INTEGER NOT NULL REFERENCES publications (id) ON DELETE CASCADE,
    name           TEXT    NOT NULL,
    author_order   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_publication_authors_publication
    ON publication_authors (publication_id);
CREATE INDEX IF NOT EXISTS idx_publications_date
    ON publications (provider, publication_date);";

const SELECT_COLUMNS: &str = "p.id, p.provider, p.provider_id, p.title, p.abstract, \
     p.record_url, p.url, p.search_terms, p.publication_date";

/// Rows per `IN (...)` lookup, well under SQLite's bound-parameter limit
const LOOKUP_CHUNK: usize = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed store. Blocking calls run on the tokio blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

struct RawRow {
    id: i64,
    provider: String,
    provider_id: String,
    title: String,
    abstract_text: String,
    record_url: String,
    url: Option<String>,
    search_terms: String,
    publication_date: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            provider: row.get(1)?,
            provider_id: row.get(2)?,
            title: row.get(3)?,
            abstract_text: row.get(4)?,
            record_url: row.get(5)?,
            url: row.get(6)?,
            search_terms: row.get(7)?,
            publication_date: row.get(8)?,
        })
    }

    fn into_stored(self, conn: &Connection) -> Result<StoredPublication> {
        let provider: Provider = self.provider.parse().map_err(|_| {
            TrackerError::StorageError(format!("Unknown provider in row {}: {}", self.id, self.provider))
        })?;
        let publication_date = NaiveDate::parse_from_str(&self.publication_date, DATE_FORMAT)
            .map_err(|e| {
                TrackerError::StorageError(format!(
                    "Invalid publication date in row {}: {}",
                    self.id, e
                ))
            })?;
        let authors = load_authors(conn, self.id)?;

        Ok(StoredPublication {
            id: self.id,
            record: PublicationRecord {
                provider,
                provider_id: self.provider_id,
                title: self.title,
                abstract_text: self.abstract_text,
                authors,
                publication_date,
                record_url: self.record_url,
                url: self.url,
            },
            search_terms: self.search_terms,
        })
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened publication database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TrackerError::StorageError("Connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| TrackerError::StorageError(format!("Storage task failed: {}", e)))?
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn find_existing(
        &self,
        provider: Provider,
        ids: &[String],
    ) -> Result<Vec<StoredPublication>> {
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let mut found = Vec::new();
            for chunk in ids.chunks(LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT {} FROM publications p WHERE p.provider = ? AND p.provider_id IN ({})",
                    SELECT_COLUMNS, placeholders
                );
                let raw = {
                    let mut stmt = conn.prepare(&sql)?;
                    let params = std::iter::once(provider.as_str().to_string()).chain(chunk.iter().cloned());
                    stmt.query_map(params_from_iter(params), RawRow::from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                };
                for row in raw {
                    found.push(row.into_stored(conn)?);
                }
            }
            debug!(found = found.len(), "Looked up existing records");
            Ok(found)
        })
        .await
    }

    /// Tags are read and rewritten inside one IMMEDIATE transaction, which
    /// holds the database write lock from the first read.
    #[instrument(skip(self, row_ids), fields(count = row_ids.len()))]
    pub async fn append_search_term(&self, row_ids: Vec<i64>, term: &str) -> Result<usize> {
        let term = term.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut changed = 0;
            {
                let mut select =
                    tx.prepare("SELECT search_terms FROM publications WHERE id = ?1")?;
                let mut update =
                    tx.prepare("UPDATE publications SET search_terms = ?1 WHERE id = ?2")?;
                for id in &row_ids {
                    let current: Option<String> = select
                        .query_row(params![id], |row| row.get(0))
                        .optional()?;
                    let Some(current) = current else {
                        continue;
                    };
                    if let Some(merged) = merge_search_term(Some(current.as_str()), &term) {
                        changed += update.execute(params![merged, id])?;
                    }
                }
            }
            tx.commit()?;
            info!(changed, "Updated search tags");
            Ok(changed)
        })
        .await
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn insert_new(
        &self,
        records: Vec<PublicationRecord>,
        search_terms: &str,
    ) -> Result<usize> {
        let search_terms = search_terms.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut insert_publication = tx.prepare(
                    "INSERT OR IGNORE INTO publications
                        (provider, provider_id, title, abstract, record_url, url, search_terms, publication_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                let mut insert_author = tx.prepare(
                    "INSERT INTO publication_authors (publication_id, name, author_order)
                     VALUES (?1, ?2, ?3)",
                )?;

                for record in &records {
                    let changed = insert_publication.execute(params![
                        record.provider.as_str(),
                        record.provider_id,
                        record.title,
                        record.abstract_text,
                        record.record_url,
                        record.url,
                        search_terms,
                        record.publication_date.format(DATE_FORMAT).to_string(),
                    ])?;
                    if changed == 0 {
                        debug!(provider_id = %record.provider_id, "Skipping duplicate record");
                        continue;
                    }

                    let publication_id = tx.last_insert_rowid();
                    for (index, name) in record.authors.iter().enumerate() {
                        insert_author.execute(params![publication_id, name, index as i64 + 1])?;
                    }
                    inserted += 1;
                }
            }
            tx.commit()?;
            info!(inserted, "Inserted records");
            Ok(inserted)
        })
        .await
    }

    pub async fn update_abstract(
        &self,
        provider: Provider,
        provider_id: &str,
        abstract_text: &str,
    ) -> Result<bool> {
        let provider_id = provider_id.to_string();
        let abstract_text = abstract_text.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE publications SET abstract = ?1 WHERE provider = ?2 AND provider_id = ?3",
                params![abstract_text, provider.as_str(), provider_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn get(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<StoredPublication>> {
        let provider_id = provider_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM publications p WHERE p.provider = ?1 AND p.provider_id = ?2",
                SELECT_COLUMNS
            );
            let raw = conn
                .query_row(&sql, params![provider.as_str(), provider_id], RawRow::from_row)
                .optional()?;
            raw.map(|row| row.into_stored(conn)).transpose()
        })
        .await
    }

    #[instrument(skip(self, query), fields(provider = %query.provider, term = %query.term))]
    pub async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let term_clause = "p.provider = ?1 AND instr(lower(p.search_terms), lower(?2)) > 0";
            let filter_clause = "(instr(lower(p.title), lower(?3)) > 0
                 OR instr(lower(p.abstract), lower(?3)) > 0
                 OR EXISTS (SELECT 1 FROM publication_authors a
                            WHERE a.publication_id = p.id AND instr(lower(a.name), lower(?3)) > 0))";

            let term = query.term.trim().to_string();
            let filter = query.filter.as_deref().map(str::trim).unwrap_or_default().to_string();
            let provider = query.provider.as_str();

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM publications p WHERE {}", term_clause),
                params![provider, term],
                |row| row.get(0),
            )?;

            let (where_clause, filtered) = if filter.is_empty() {
                (format!("{} AND ?3 = ''", term_clause), total)
            } else {
                let clause = format!("{} AND {}", term_clause, filter_clause);
                let filtered: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM publications p WHERE {}", clause),
                    params![provider, term, filter],
                    |row| row.get(0),
                )?;
                (clause, filtered)
            };

            let sql = format!(
                "SELECT {} FROM publications p WHERE {}
                 ORDER BY p.publication_date DESC, p.id ASC
                 LIMIT ?4 OFFSET ?5",
                SELECT_COLUMNS, where_clause
            );
            let raw = {
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(
                    params![provider, term, filter, query.limit as i64, query.offset as i64],
                    RawRow::from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?
            };

            let mut rows = Vec::with_capacity(raw.len());
            for row in raw {
                rows.push(row.into_stored(conn)?);
            }

            Ok(ListPage {
                total: total as usize,
                filtered: filtered as usize,
                rows,
            })
        })
        .await
    }

    pub async fn count(&self, provider: Provider) -> Result<usize> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM publications WHERE provider = ?1",
                params![provider.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

fn load_authors(conn: &Connection, publication_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT name FROM publication_authors WHERE publication_id = ?1 ORDER BY author_order",
    )?;
    let names = stmt
        .query_map(params![publication_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}
