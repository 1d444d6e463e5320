//! Scheduled feed scraping: pick overdue feeds, fetch them in parallel,
//! store new items.

mod fetcher;
mod ingest;
mod scheduler;
mod worker;

pub use fetcher::{parse_feed, FeedFetcher, FetchError, RawItem};
pub use ingest::{ingest_item, normalize_item, parse_pub_date, IngestOutcome, PubDateError};
pub use scheduler::{Scheduler, SchedulerError};
pub use worker::{scrape_feed, ScrapeError, ScrapeSummary};
