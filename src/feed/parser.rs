use feed_rs::parser;

use super::FeedItem;

/// Parses feed markup and returns its entries as a lazy iterator.
///
/// The document itself is validated up front, so a malformed feed fails here
/// and never yields a partial item set. Items come out in document order.
///
/// Entries without an id get their first link as the id (or nothing), not
/// the content hash feed-rs would otherwise make up.
pub fn parse_feed(bytes: &[u8]) -> Result<impl Iterator<Item = FeedItem>, parser::ParseFeedError> {
    let feed = parser::Builder::new()
        .id_generator(|links, _title, _uri| {
            links.first().map(|l| l.href.clone()).unwrap_or_default()
        })
        .build()
        .parse(bytes)?;
    Ok(feed.entries.into_iter().map(FeedItem::from_entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <item>
        <guid>item-1</guid>
        <title>First</title>
        <link>https://example.com/1</link>
        <description>One</description>
        <pubDate>Wed, 03 Jan 2024 10:00:00 GMT</pubDate>
        <category>rust</category>
        <category>async</category>
        <author>alice@example.com (Alice)</author>
    </item>
    <item>
        <title>Second</title>
        <link>https://example.com/2</link>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_items_in_document_order() {
        let items: Vec<FeedItem> = parse_feed(RSS.as_bytes()).unwrap().collect();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "First");
        assert_eq!(items[0].guid, "item-1");
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/1"));
        assert_eq!(items[0].description.as_deref(), Some("One"));
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap())
        );
        assert_eq!(items[0].categories, vec!["rust", "async"]);

        assert_eq!(items[1].title, "Second");
        assert_eq!(items[1].published, None);
        assert!(items[1].categories.is_empty());
        assert_eq!(items[1].author, "");
    }

    #[test]
    fn test_parse_atom_uses_updated_when_published_missing() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <id>urn:entry:1</id>
    <title>Atom entry</title>
    <link href="https://example.com/atom/1"/>
    <updated>2024-01-02T00:00:00Z</updated>
    <author><name>Bob</name></author>
    <summary>Summary text</summary>
  </entry>
</feed>"#;

        let items: Vec<FeedItem> = parse_feed(atom.as_bytes()).unwrap().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].guid, "urn:entry:1");
        assert_eq!(items[0].author, "Bob");
        assert_eq!(items[0].description.as_deref(), Some("Summary text"));
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_falls_back_to_link_when_no_guid() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <item><title>No guid</title><link>https://example.com/post</link></item>
    <item><title>Nothing at all</title></item>
</channel></rss>"#;

        let items: Vec<FeedItem> = parse_feed(rss.as_bytes()).unwrap().collect();
        assert_eq!(items[0].guid, "https://example.com/post");
        assert_eq!(items[1].guid, "");
    }

    #[test]
    fn test_empty_channel_yields_nothing() {
        let empty = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        assert_eq!(parse_feed(empty.as_bytes()).unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }
}
