//! The aggregation pipeline.
//!
//! ```text
//! submit() -> task queue -> unsorted channel -> sort stage -> sorted channel -> ItemStream
//!              (bounded)                        (barrier)
//! ```
//!
//! - [`queue`] runs fetch+parse tasks with bounded concurrency and forwards
//!   every parsed item as soon as it is produced.
//! - [`sort`] holds everything until the last task settles, then emits the
//!   items newest first. With [`AggregatorOptions::sorted`] off it is
//!   replaced by a pass-through that forwards items in arrival order.
//! - [`ItemStream`] is the consumer end. Both channels are bounded, so a slow
//!   reader holds back the sort stage, and a slow sort stage holds back the
//!   tasks.
//!
//! Completion is channel closure: the queue drops the unsorted sender once
//! input is closed and every task has settled, and the sort stage drops the
//! sorted sender once it has emitted everything.
//!
//! # Example
//!
//! ```ignore
//! use feedagg::pipeline::{Aggregator, AggregatorOptions};
//!
//! let mut aggregator = Aggregator::with_http(AggregatorOptions::default())?;
//! let mut errors = aggregator.take_errors().unwrap();
//! aggregator.submit("https://example.com/feed.xml");
//! let items = aggregator.finish().collect_all().await;
//! ```

mod queue;
mod session;
mod sort;

pub use session::Session;
pub use sort::compare_published;

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::feed::{FeedFetcher, FeedItem, FetchError, HttpFetcher, MAX_FEED_SIZE};
use queue::{QueuedSource, TaskContext};

/// A feed that could not be fetched or parsed.
///
/// Reported on the error channel; the rest of the run is unaffected.
#[derive(Debug, Error)]
#[error("Error parsing feed: {feed}: {cause}")]
pub struct FeedError {
    /// The identifier the feed was submitted with
    pub feed: String,
    #[source]
    pub cause: FetchError,
}

/// Tuning knobs for one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Maximum number of feeds fetched at the same time (0 is treated as 1)
    pub concurrency: usize,
    /// Upper bound on one feed's request and body download
    pub timeout: Duration,
    /// Capacity of the internal channels
    pub buffer: usize,
    /// Upper bound on one feed's body, in bytes
    pub max_feed_bytes: usize,
    /// Emit newest first once every feed has settled. When `false`, items
    /// are delivered in arrival order as soon as a feed produces them.
    pub sorted: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            timeout: Duration::from_secs(30),
            buffer: 64,
            max_feed_bytes: MAX_FEED_SIZE,
            sorted: true,
        }
    }
}

/// The input side of the pipeline.
///
/// Stages are spawned on the first [`submit`](Self::submit), so that call
/// (and [`finish`](Self::finish)) must happen inside a Tokio runtime.
pub struct Aggregator<F: FeedFetcher> {
    fetcher: Arc<F>,
    options: AggregatorOptions,
    session: Arc<Session>,
    submitted: usize,
    input: Option<mpsc::UnboundedSender<QueuedSource>>,
    output: Option<mpsc::Receiver<FeedItem>>,
    errors_tx: mpsc::UnboundedSender<FeedError>,
    errors_rx: Option<mpsc::UnboundedReceiver<FeedError>>,
}

impl Aggregator<HttpFetcher> {
    /// Builds an aggregator that fetches over HTTP with a fresh client.
    pub fn with_http(options: AggregatorOptions) -> Result<Self, reqwest::Error> {
        let client = HttpFetcher::build_client(options.timeout)?;
        let fetcher = HttpFetcher::new(client, options.max_feed_bytes);
        Ok(Self::new(fetcher, options))
    }
}

impl<F: FeedFetcher> Aggregator<F> {
    /// Creates an idle aggregator; nothing is spawned until the first submit.
    pub fn new(fetcher: F, options: AggregatorOptions) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        Self {
            fetcher: Arc::new(fetcher),
            options,
            session: Arc::new(Session::default()),
            submitted: 0,
            input: None,
            output: None,
            errors_tx,
            errors_rx: Some(errors_rx),
        }
    }

    /// Takes the receiving end of the error channel. Only the first call
    /// returns `Some`; failures are logged whether or not anyone listens.
    pub fn take_errors(&mut self) -> Option<mpsc::UnboundedReceiver<FeedError>> {
        self.errors_rx.take()
    }

    /// Shared run state: in-flight count and stage flags.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Queues a feed for fetching.
    pub fn submit(&mut self, source: impl Into<String>) {
        let url = source.into();
        let index = self.submitted;
        self.submitted += 1;

        let guard = self.session.begin();
        let input = self.input.get_or_insert_with(|| {
            let (input, output) = wire(
                Arc::clone(&self.fetcher),
                &self.options,
                Arc::clone(&self.session),
                self.errors_tx.clone(),
            );
            self.output = Some(output);
            input
        });

        if let Err(mpsc::error::SendError(queued)) = input.send(QueuedSource { index, url, guard }) {
            // Only possible if the queue task died; the guard settles on drop
            tracing::error!(source = %queued.url, "Task queue is gone, feed dropped");
        }
    }

    /// Closes input and returns the ordered output.
    pub fn finish(mut self) -> ItemStream {
        drop(self.input.take());

        let rx = match self.output.take() {
            Some(rx) => rx,
            None => {
                // Nothing was submitted: the stream is born finished
                let (_, rx) = mpsc::channel(1);
                self.session.mark_sort_completed();
                rx
            }
        };

        ItemStream {
            rx,
            session: Arc::clone(&self.session),
        }
    }
}

/// Spawns the queue and sort stages and connects them.
fn wire<F: FeedFetcher>(
    fetcher: Arc<F>,
    options: &AggregatorOptions,
    session: Arc<Session>,
    errors: mpsc::UnboundedSender<FeedError>,
) -> (mpsc::UnboundedSender<QueuedSource>, mpsc::Receiver<FeedItem>) {
    let buffer = options.buffer.max(1);
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (unsorted_tx, unsorted_rx) = mpsc::channel(buffer);
    let (sorted_tx, sorted_rx) = mpsc::channel(buffer);

    session.mark_started();
    tracing::debug!(
        concurrency = options.concurrency,
        buffer = buffer,
        sorted = options.sorted,
        "Starting aggregation pipeline"
    );

    let queue = tokio::spawn(queue::run(
        input_rx,
        TaskContext {
            fetcher,
            timeout: options.timeout,
            concurrency: options.concurrency,
            unsorted: unsorted_tx,
            errors,
        },
    ));
    let sort = if options.sorted {
        tokio::spawn(sort::run(unsorted_rx, sorted_tx, session))
    } else {
        tokio::spawn(sort::pass_through(unsorted_rx, sorted_tx, session))
    };

    tokio::spawn(async move {
        for (stage, handle) in [("queue", queue), ("sort", sort)] {
            if let Err(e) = handle.await {
                tracing::error!(stage = stage, error = %e, "Pipeline stage failed");
            }
        }
    });

    (input_tx, sorted_rx)
}

/// The output of an aggregation run.
///
/// Yields items newest first (or in arrival order when sorting is off) and
/// ends once every feed has settled and the last stage has emitted
/// everything.
#[derive(Debug)]
pub struct ItemStream {
    rx: mpsc::Receiver<FeedItem>,
    session: Arc<Session>,
}

impl ItemStream {
    /// Waits for the next item; `None` once the run is complete.
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }

    /// Drains the stream to completion.
    pub async fn collect_all(mut self) -> Vec<FeedItem> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            items.push(item);
        }
        items
    }

    pub fn in_flight(&self) -> usize {
        self.session.in_flight()
    }

    pub fn is_sort_completed(&self) -> bool {
        self.session.is_sort_completed()
    }
}

impl Stream for ItemStream {
    type Item = FeedItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FeedItem>> {
        self.rx.poll_recv(cx)
    }
}
