use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use serde::Serialize;

/// A single entry extracted from a feed, normalized across RSS, Atom and
/// JSON Feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    /// Entry id, or the link when the feed supplied none.
    pub guid: String,
    /// `published`, falling back to `updated`.
    pub published: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    /// First author name, empty when the entry has none.
    pub author: String,
}

impl FeedItem {
    pub(crate) fn from_entry(entry: Entry) -> Self {
        let link = entry.links.first().map(|l| l.href.clone());
        let published = entry.published.or(entry.updated);
        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));
        let title = entry.title.map(|t| t.content).unwrap_or_default();

        let id = entry.id.trim();
        let guid = if id.is_empty() {
            link.clone().unwrap_or_default()
        } else {
            id.to_string()
        };

        let categories = entry
            .categories
            .into_iter()
            .map(|c| c.label.unwrap_or(c.term))
            .filter(|c| !c.trim().is_empty())
            .collect();

        let author = entry
            .authors
            .into_iter()
            .map(|p| p.name)
            .find(|n| !n.trim().is_empty())
            .unwrap_or_default();

        Self {
            title,
            description,
            link,
            guid,
            published,
            categories,
            author,
        }
    }
}
