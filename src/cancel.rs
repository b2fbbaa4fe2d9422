//! Cooperative cancellation for provider calls

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, TrackerError};

/// Run `fut` unless `cancel` fires first
///
/// A token that is already cancelled wins over a ready future.
pub async fn with_cancel<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TrackerError::Cancelled),
        res = fut => res,
    }
}

/// Fail fast when the token has already fired
pub fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(TrackerError::Cancelled)
    } else {
        Ok(())
    }
}
