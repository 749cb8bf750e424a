//! Glue between a document's mutation feed and the registry.

use dom::MutationBatch;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::registry::PreloaderHandle;

/// Forward every batch from `feed` to the registry until the feed ends or
/// the registry stops.
///
/// Removals are applied before additions so a batch that removes and
/// re-inserts an element leaves it tracked.
pub fn spawn_discovery<S>(feed: S, handle: PreloaderHandle) -> JoinHandle<()>
where
    S: Stream<Item = MutationBatch> + Send + 'static,
{
    tokio::spawn(async move {
        let mut feed = Box::pin(feed);

        while let Some(batch) = feed.next().await {
            if !batch.removed.is_empty() && handle.detach(batch.removed).await.is_err() {
                break;
            }
            if !batch.added.is_empty() && handle.register(batch.added).await.is_err() {
                break;
            }
        }

        tracing::debug!("Discovery feed closed");
    })
}
