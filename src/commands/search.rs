use anyhow::Result;
use clap::Args;
use publication_tracker::{DateRange, Provider, Reconciler, SearchRequest, SortKey};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ProviderArg, print_json};

#[derive(Args, Debug)]
pub struct Search {
    /// Provider to search
    #[arg(value_enum)]
    provider: ProviderArg,

    /// Search term
    #[arg(value_name = "TERM")]
    term: String,

    /// Offset into the provider's results and the stored listing
    #[arg(long, default_value = "0")]
    offset: usize,

    /// Maximum number of stored rows to print
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Only list stored rows whose title, abstract or authors contain this text
    #[arg(short, long)]
    filter: Option<String>,

    /// First publication year (defaults to the trend window)
    #[arg(long, requires = "to_year")]
    from_year: Option<i32>,

    /// Last publication year
    #[arg(long, requires = "from_year")]
    to_year: Option<i32>,

    /// Provider-side ordering: relevance or date
    #[arg(long)]
    sort: Option<String>,

    /// Print only the reconciliation report
    #[arg(long)]
    report_only: bool,
}

impl Search {
    pub async fn execute(&self, tracker: &Reconciler, cancel: &CancellationToken) -> Result<()> {
        let mut request = SearchRequest::new(self.term.as_str())
            .with_offset(self.offset)
            .with_limit(self.limit);

        if let Some(filter) = &self.filter {
            request = request.with_filter(filter.as_str());
        }
        if let (Some(from), Some(to)) = (self.from_year, self.to_year) {
            request = request.with_date_range(DateRange::years(from, to)?);
        }
        if let Some(sort) = &self.sort {
            request = request.with_sort(sort.parse::<SortKey>()?);
        }

        let outcome = match Provider::from(self.provider) {
            Provider::PubMed => tracker.search_pubmed(&request, cancel).await?,
            Provider::Scopus => tracker.search_scopus(&request, cancel).await?,
        };

        info!(
            total = outcome.total_records,
            listed = outcome.rows.len(),
            inserted = outcome.report.inserted,
            tagged = outcome.report.tagged,
            "Search finished"
        );

        if self.report_only {
            print_json(&outcome.report)
        } else {
            print_json(&outcome)
        }
    }
}
