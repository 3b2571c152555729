use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::session::Session;
use crate::feed::FeedItem;

/// An item tagged with where it came from, used to break ties.
#[derive(Debug)]
pub(crate) struct Sequenced {
    /// Submission index of the source feed
    pub source: usize,
    /// Position of the item within its feed
    pub position: usize,
    pub item: FeedItem,
}

/// Orders items newest first.
///
/// Undated items sort after every dated item and compare equal to each other.
pub fn compare_published(a: &FeedItem, b: &FeedItem) -> Ordering {
    match (a.published, b.published) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_sequenced(a: &Sequenced, b: &Sequenced) -> Ordering {
    compare_published(&a.item, &b.item)
        .then_with(|| (a.source, a.position).cmp(&(b.source, b.position)))
}

pub(crate) fn sort_items(mut items: Vec<Sequenced>) -> Vec<FeedItem> {
    items.sort_by(compare_sequenced);
    items.into_iter().map(|s| s.item).collect()
}

/// Drains the unsorted channel, sorts once it closes, then feeds the output
/// channel at the consumer's pace.
///
/// The unsorted channel only closes after every task has dropped its
/// sender, so nothing is emitted before all feeds have settled.
pub(crate) async fn run(
    mut unsorted: mpsc::Receiver<Sequenced>,
    sorted: mpsc::Sender<FeedItem>,
    session: Arc<Session>,
) {
    let mut buffer = Vec::new();
    while let Some(item) = unsorted.recv().await {
        buffer.push(item);
    }

    let total = buffer.len();
    tracing::debug!(items = total, "All feeds settled, sorting");

    let mut delivered = 0usize;
    for item in sort_items(buffer) {
        if sorted.send(item).await.is_err() {
            tracing::debug!(
                delivered = delivered,
                total = total,
                "Output dropped before all items were read"
            );
            break;
        }
        delivered += 1;
    }

    session.mark_sort_completed();
}

/// Forwards items in arrival order without waiting for the other feeds.
///
/// Used when ordering is switched off. Completion is reported the same way
/// as for the sorting stage, once the unsorted channel has closed.
pub(crate) async fn pass_through(
    mut unsorted: mpsc::Receiver<Sequenced>,
    output: mpsc::Sender<FeedItem>,
    session: Arc<Session>,
) {
    let mut delivered = 0usize;
    while let Some(sequenced) = unsorted.recv().await {
        if output.send(sequenced.item).await.is_err() {
            tracing::debug!(delivered = delivered, "Output dropped before all items were read");
            break;
        }
        delivered += 1;
    }

    session.mark_sort_completed();
}
