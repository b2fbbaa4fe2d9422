//! # Publication Tracker
//!
//! Searches PubMed and Scopus, keeps the results in a local store tagged
//! with the search terms that surfaced them, and reports publication
//! trends over time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use publication_tracker::{
//!     PubMedClient, Reconciler, ScopusClient, SearchRequest, TrackerConfig,
//!     store::{StoreBackendConfig, create_store},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = create_store(&StoreBackendConfig::Memory)?;
//!     let tracker = Reconciler::new(
//!         store,
//!         PubMedClient::new(),
//!         ScopusClient::new(),
//!         TrackerConfig::default(),
//!     );
//!
//!     let outcome = tracker
//!         .search_pubmed(&SearchRequest::new("sepsis").with_limit(10), &CancellationToken::new())
//!         .await?;
//!
//!     println!("{} records at PubMed", outcome.total_records);
//!     for row in outcome.rows {
//!         println!("{} ({})", row.record.title, row.search_terms);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Rate limiting
//!
//! PubMed requests share a token bucket: 3 requests/second without an API
//! key, 10 with one.
//!
//! ```
//! use publication_tracker::ClientConfig;
//!
//! let config = ClientConfig::new().with_api_key("your_key");
//! assert_eq!(config.effective_rate_limit(), 10.0);
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod models;
pub mod pubmed;
pub mod query;
pub mod rate_limit;
pub mod reconcile;
pub mod scopus;
pub mod store;
pub mod tags;

pub use config::{ClientConfig, ScopusConfig, TrackerConfig};
pub use error::{Result, TrackerError};
pub use models::{
    DateRange, NO_ABSTRACT, NO_TITLE, Provider, PublicationRecord, SearchRequest, SortKey,
};
pub use pubmed::{ArticleSummary, PubMedClient, PubMedSearchPage};
pub use query::{PubMedQuery, ScopusQuery, SourceType};
pub use reconcile::{ReconcileReport, Reconciler, SearchOutcome};
pub use scopus::{ScopusClient, ScopusSearchPage};
pub use store::{PublicationStore, StoredPublication};
pub use tags::{SearchTags, merge_search_term, normalize_search_term};
