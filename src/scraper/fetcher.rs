use reqwest::StatusCode;
use rss::Channel;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("feed-aggregator/", env!("CARGO_PKG_VERSION"));

/// One `<item>` as it appeared in the feed document, before normalization.
///
/// Missing elements are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed responded with status {0}")]
    Status(StatusCode),
    #[error("failed to parse feed document: {0}")]
    Parse(#[from] rss::Error),
}

/// Retrieves and parses feed documents over HTTP.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    /// Build a fetcher with the default transport settings.
    ///
    /// No request timeout is set, so an unresponsive source stalls the
    /// worker that is fetching it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` once and return its items in document order.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// document that does not parse. No partial item list is ever returned.
    pub async fn fetch(&self, url: &str) -> Result<Vec<RawItem>, FetchError> {
        debug!(url = %url, "Fetching feed");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        parse_feed(&body)
    }
}

/// Parse an RSS document into raw items, preserving source order.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the document is not a valid RSS channel.
pub fn parse_feed(body: &[u8]) -> Result<Vec<RawItem>, FetchError> {
    let channel = Channel::read_from(body)?;

    Ok(channel
        .items()
        .iter()
        .map(|item| RawItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
            description: item.description().unwrap_or_default().to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.com</link>
    <description>Posts</description>
    <item>
      <title>Second post</title>
      <link>https://blog.example.com/2</link>
      <pubDate>Tue, 03 Jan 2006 15:04:05 -0700</pubDate>
      <description><![CDATA[<p>More</p>]]></description>
    </item>
    <item>
      <title>First post</title>
      <link>https://blog.example.com/1</link>
      <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_keeps_document_order() {
        let items = parse_feed(TWO_ITEMS.as_bytes()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Second post");
        assert_eq!(items[0].link, "https://blog.example.com/2");
        assert_eq!(items[0].description, "<p>More</p>");
        assert_eq!(items[1].title, "First post");
        assert_eq!(items[1].pub_date, "Mon, 02 Jan 2006 15:04:05 -0700");
    }

    #[test]
    fn test_missing_elements_become_empty() {
        let items = parse_feed(TWO_ITEMS.as_bytes()).unwrap();
        assert_eq!(items[1].description, "");
    }

    #[test]
    fn test_empty_channel() {
        let xml = r#"<rss version="2.0"><channel><title>t</title><link>l</link><description>d</description></channel></rss>"#;
        let items = parse_feed(xml.as_bytes()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_non_rss_document_is_an_error() {
        assert!(matches!(
            parse_feed(b"<html><body>not a feed</body></html>"),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(parse_feed(b"plain text"), Err(FetchError::Parse(_))));
        assert!(matches!(parse_feed(b""), Err(FetchError::Parse(_))));
    }
}
