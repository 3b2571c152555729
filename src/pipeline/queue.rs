use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::session::InFlightGuard;
use super::sort::Sequenced;
use super::FeedError;
use crate::feed::{parse_feed, FeedFetcher, FetchError};

/// A submitted source waiting for a free slot.
#[derive(Debug)]
pub(crate) struct QueuedSource {
    pub index: usize,
    pub url: String,
    pub guard: InFlightGuard,
}

/// Everything a feed task needs, shared by all of them.
pub(crate) struct TaskContext<F> {
    pub fetcher: Arc<F>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub unsorted: mpsc::Sender<Sequenced>,
    pub errors: mpsc::UnboundedSender<FeedError>,
}

/// Runs feed tasks as sources arrive, at most `concurrency` at a time.
///
/// Returns once the input channel is closed and every task has settled.
/// The unsorted sender is dropped on return, which is what tells the sort
/// stage that collection is over.
pub(crate) async fn run<F: FeedFetcher>(
    mut sources: mpsc::UnboundedReceiver<QueuedSource>,
    ctx: TaskContext<F>,
) {
    let TaskContext {
        fetcher,
        timeout,
        concurrency,
        unsorted,
        errors,
    } = ctx;

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut items = 0usize;

    stream::poll_fn(|cx| sources.poll_recv(cx))
        .map(|queued| {
            let fetcher = Arc::clone(&fetcher);
            let unsorted = unsorted.clone();

            async move {
                let QueuedSource { index, url, guard } = queued;
                let result = run_task(&*fetcher, index, &url, timeout, &unsorted).await;
                // Settle before the outcome is reported
                drop(guard);
                (url, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .for_each(|(url, result)| {
            match result {
                Ok(count) => {
                    succeeded += 1;
                    items += count;
                    tracing::debug!(source = %url, items = count, "Feed collected");
                }
                Err(cause) => {
                    failed += 1;
                    tracing::warn!(source = %url, error = %cause, "Feed failed, skipping");
                    let _ = errors.send(FeedError { feed: url, cause });
                }
            }
            futures::future::ready(())
        })
        .await;

    tracing::info!(
        succeeded = succeeded,
        failed = failed,
        items = items,
        "All feeds settled"
    );
}

/// Fetches one feed and forwards its items, in document order, as they are
/// produced.
///
/// The timeout covers the request and body download. Parsing happens before
/// the first item is forwarded, so a failed feed contributes nothing.
async fn run_task<F: FeedFetcher>(
    fetcher: &F,
    index: usize,
    url: &str,
    timeout: Duration,
    unsorted: &mpsc::Sender<Sequenced>,
) -> Result<usize, FetchError> {
    tracing::debug!(source = %url, "Fetching feed");

    let body = tokio::time::timeout(timeout, fetcher.fetch(url))
        .await
        .map_err(|_| FetchError::Timeout)??;

    let entries = parse_feed(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut count = 0;
    for (position, item) in entries.enumerate() {
        let sequenced = Sequenced {
            source: index,
            position,
            item,
        };
        if unsorted.send(sequenced).await.is_err() {
            // Sort stage is gone; nobody is left to read the rest
            break;
        }
        count += 1;
    }

    Ok(count)
}
