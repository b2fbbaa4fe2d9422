use anyhow::Result;
use clap::Args;
use publication_tracker::Reconciler;
use tokio_util::sync::CancellationToken;

use super::{ProviderArg, print_json};

#[derive(Args, Debug)]
pub struct Counts {
    #[arg(value_enum)]
    provider: ProviderArg,

    #[arg(value_name = "TERM")]
    term: String,
}

impl Counts {
    pub async fn execute(&self, tracker: &Reconciler, cancel: &CancellationToken) -> Result<()> {
        let counts = tracker
            .counts_over_time(self.provider.into(), &self.term, cancel)
            .await?;
        print_json(&counts)
    }
}

#[derive(Args, Debug)]
pub struct Types {
    #[arg(value_enum)]
    provider: ProviderArg,

    #[arg(value_name = "TERM")]
    term: String,
}

impl Types {
    pub async fn execute(&self, tracker: &Reconciler, cancel: &CancellationToken) -> Result<()> {
        let distribution = tracker
            .type_distribution(self.provider.into(), &self.term, cancel)
            .await?;
        print_json(&distribution)
    }
}
