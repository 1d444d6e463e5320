use thiserror::Error;
use tracing::info;

use super::fetcher::{FeedFetcher, FetchError};
use super::ingest::{ingest_item, IngestOutcome};
use crate::db::{Feed, FeedStore, StoreError};

/// Per-feed tally of one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub items: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

impl ScrapeSummary {
    fn record(&mut self, outcome: IngestOutcome) {
        self.items += 1;
        match outcome {
            IngestOutcome::Inserted => self.inserted += 1,
            IngestOutcome::DuplicateSkipped => self.duplicates += 1,
            IngestOutcome::Rejected => self.rejected += 1,
        }
    }
}

/// Why a feed refresh stopped early. Nothing is ingested in either case.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to mark feed as fetched: {0}")]
    MarkFetched(#[source] StoreError),
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
}

/// Refresh a single feed.
///
/// The feed is stamped as fetched before the download starts, so a source
/// that keeps failing drifts to the back of the queue instead of being
/// picked first on every tick.
///
/// # Errors
///
/// Returns an error if the feed could not be marked or its document could
/// not be fetched. Per-item failures are counted, not returned.
pub async fn scrape_feed(
    store: &dyn FeedStore,
    fetcher: &FeedFetcher,
    feed: &Feed,
) -> Result<ScrapeSummary, ScrapeError> {
    store
        .mark_feed_fetched(feed.id)
        .await
        .map_err(ScrapeError::MarkFetched)?;

    let items = fetcher.fetch(&feed.url).await?;

    let mut summary = ScrapeSummary::default();
    for item in items {
        summary.record(ingest_item(store, feed.id, item).await);
    }

    info!(
        feed_id = feed.id,
        feed = %feed.name,
        items = summary.items,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        "Feed collected"
    );

    Ok(summary)
}
