use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fetcher::FeedFetcher;
use super::worker::scrape_feed;
use crate::db::FeedStore;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("interval must be greater than zero")]
    ZeroInterval,
}

/// Periodically refreshes the most overdue feeds in fixed-size batches.
///
/// Each tick selects up to `concurrency` feeds, runs one worker per feed in
/// parallel, and waits for the whole batch before the next tick. A slow batch
/// delays the next tick rather than overlapping with it.
pub struct Scheduler {
    store: Arc<dyn FeedStore>,
    fetcher: FeedFetcher,
    concurrency: usize,
    interval: Duration,
}

impl Scheduler {
    /// # Errors
    ///
    /// Returns an error if `concurrency` or `interval` is zero.
    pub fn new(
        store: Arc<dyn FeedStore>,
        fetcher: FeedFetcher,
        concurrency: usize,
        interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if concurrency == 0 {
            return Err(SchedulerError::ZeroConcurrency);
        }
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        Ok(Self {
            store,
            fetcher,
            concurrency,
            interval,
        })
    }

    /// Run until `shutdown` is cancelled. The first tick fires immediately.
    ///
    /// Cancellation is observed between ticks; an in-flight batch always
    /// finishes.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            concurrency = self.concurrency,
            interval_secs = self.interval.as_secs(),
            "Starting feed scraper"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Feed scraper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Run one scrape cycle and return how many feeds were dispatched.
    ///
    /// A failure to load the batch is logged and the cycle is skipped.
    pub async fn tick(&self) -> usize {
        let feeds = match self.store.next_feeds_to_fetch(self.concurrency).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Failed to load feeds to scrape: {e}");
                return 0;
            }
        };

        if feeds.is_empty() {
            debug!("No feeds to scrape");
            return 0;
        }

        let mut handles = Vec::with_capacity(feeds.len());

        for feed in feeds {
            let store = Arc::clone(&self.store);
            let fetcher = self.fetcher.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = scrape_feed(store.as_ref(), &fetcher, &feed).await {
                    warn!(feed_id = feed.id, url = %feed.url, "Feed scrape aborted: {e}");
                }
            });

            handles.push(handle);
        }

        let count = handles.len();

        // Barrier: the next tick starts only after every worker has finished
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Feed worker panicked: {e}");
            }
        }

        debug!(feeds = count, "Scrape batch complete");
        count
    }
}
