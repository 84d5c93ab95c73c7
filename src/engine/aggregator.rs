use crate::error::{EngineError, SourceError};
use crate::models::Listing;
use crate::sources::traits::SourceAdapter;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// What one fan-out over all adapters produced: the merged batch from
/// every source that answered, plus the failures that were tolerated.
#[derive(Debug)]
pub struct FetchOutcome {
    pub listings: Vec<Listing>,
    pub failures: Vec<SourceError>,
}

/// Fetch from every adapter concurrently and merge the results.
///
/// All fetches run to completion; a failing or timed-out adapter never
/// cancels its siblings. The batch is the flattened union of the
/// successes, in adapter order, deduplicated by identity link across
/// providers. Only when every configured adapter fails does the cycle as
/// a whole fail.
pub async fn fetch_all(
    adapters: &[Arc<dyn SourceAdapter>],
    per_fetch_timeout: Duration,
) -> Result<FetchOutcome, EngineError> {
    let fetches = adapters.iter().map(|adapter| async move {
        match timeout(per_fetch_timeout, adapter.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                provider: adapter.provider(),
                timeout: per_fetch_timeout,
            }),
        }
    });

    let mut listings = Vec::new();
    let mut failures = Vec::new();
    let mut seen = HashSet::new();
    let mut succeeded = 0usize;

    for settled in join_all(fetches).await {
        match settled {
            Ok(batch) => {
                succeeded += 1;
                for listing in batch {
                    if seen.insert(listing.link.clone()) {
                        listings.push(listing);
                    } else {
                        debug!(link = %listing.link, "Duplicate listing across sources, keeping first");
                    }
                }
            }
            Err(error) => {
                warn!(provider = error.provider(), error = %error, "Source failed this cycle");
                failures.push(error);
            }
        }
    }

    if succeeded == 0 && !adapters.is_empty() {
        return Err(EngineError::AllSourcesFailed { errors: failures });
    }

    Ok(FetchOutcome { listings, failures })
}
