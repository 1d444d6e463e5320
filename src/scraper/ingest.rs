use chrono::{DateTime, Utc, Weekday};
use thiserror::Error;
use tracing::{debug, warn};

use super::fetcher::RawItem;
use crate::db::{FeedStore, NewPost, StoreError};

/// Layout of `<pubDate>` after the weekday, e.g. `02 Jan 2006 15:04:05 -0700`.
const PUB_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// What happened to a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    DuplicateSkipped,
    Rejected,
}

#[derive(Debug, Error)]
pub enum PubDateError {
    #[error("missing weekday prefix in {0:?}")]
    MissingWeekday(String),
    #[error("unknown weekday in {0:?}")]
    UnknownWeekday(String),
    #[error("unexpected date layout in {0:?}")]
    Layout(String),
    #[error("invalid date {value:?}: {source}")]
    Invalid {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse an RFC 1123 date with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
///
/// The weekday must be a valid name but is not checked against the date.
///
/// # Errors
///
/// Returns an error for any other layout, including named zones like `GMT`.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>, PubDateError> {
    let raw = raw.trim();
    let (weekday, rest) = raw
        .split_once(", ")
        .ok_or_else(|| PubDateError::MissingWeekday(raw.to_string()))?;

    if weekday.len() != 3 || weekday.parse::<Weekday>().is_err() {
        return Err(PubDateError::UnknownWeekday(raw.to_string()));
    }
    if !has_fixed_layout(rest) {
        return Err(PubDateError::Layout(raw.to_string()));
    }

    DateTime::parse_from_str(rest, PUB_DATE_FORMAT)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|source| PubDateError::Invalid {
            value: raw.to_string(),
            source,
        })
}

/// chrono accepts single-digit days and `-07:00` zones; the layout does not.
fn has_fixed_layout(rest: &str) -> bool {
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());

    let parts: Vec<&str> = rest.split(' ').collect();
    let [day, month, year, time, zone] = parts.as_slice() else {
        return false;
    };

    let time_ok = {
        let fields: Vec<&str> = time.split(':').collect();
        fields.len() == 3 && fields.iter().all(|f| digits(f, 2))
    };
    let zone_ok = zone.len() == 5
        && matches!(zone.as_bytes()[0], b'+' | b'-')
        && digits(&zone[1..], 4);

    digits(day, 2) && month.len() == 3 && digits(year, 4) && time_ok && zone_ok
}

/// Normalize an item into a new post for `feed_id`.
///
/// # Errors
///
/// Returns an error if the publish date does not parse.
pub fn normalize_item(feed_id: i64, item: RawItem) -> Result<NewPost, PubDateError> {
    let published_at = parse_pub_date(&item.pub_date)?;
    let description = Some(item.description).filter(|d| !d.trim().is_empty());

    Ok(NewPost {
        feed_id,
        title: item.title,
        url: item.link,
        description,
        published_at,
    })
}

/// Normalize and store one item. Never fails; the outcome says what happened.
pub async fn ingest_item(store: &dyn FeedStore, feed_id: i64, item: RawItem) -> IngestOutcome {
    if item.link.trim().is_empty() {
        warn!(feed_id, title = %item.title, "Rejecting item without a link");
        return IngestOutcome::Rejected;
    }

    let post = match normalize_item(feed_id, item) {
        Ok(post) => post,
        Err(e) => {
            warn!(feed_id, "Rejecting item: {e}");
            return IngestOutcome::Rejected;
        }
    };

    match store.insert_post(&post).await {
        Ok(created) => {
            debug!(feed_id, post_id = created.id, url = %created.url, "Inserted post");
            IngestOutcome::Inserted
        }
        Err(StoreError::UniqueViolation { .. }) => {
            debug!(feed_id, url = %post.url, "Post already stored, skipping");
            IngestOutcome::DuplicateSkipped
        }
        Err(e) => {
            warn!(feed_id, url = %post.url, "Failed to store post: {e}");
            IngestOutcome::Rejected
        }
    }
}
