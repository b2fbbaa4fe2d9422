use anyhow::Result;
use clap::Args;
use publication_tracker::Reconciler;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct Abstract {
    /// Scopus document id (with or without the SCOPUS_ID: prefix)
    #[arg(value_name = "SCOPUS_ID")]
    scopus_id: String,
}

impl Abstract {
    pub async fn execute(&self, tracker: &Reconciler, cancel: &CancellationToken) -> Result<()> {
        let text = tracker.get_abstract(&self.scopus_id, cancel).await?;
        println!("{}", text);
        Ok(())
    }
}
