//! Feed retrieval and parsing.
//!
//! These are the collaborators the aggregation pipeline drives:
//!
//! - [`fetcher`] - HTTP retrieval behind the [`FeedFetcher`] trait, with a size limit
//! - [`parser`] - Feed parsing using the `feed-rs` crate
//! - [`item`] - The normalized [`FeedItem`] record shared by every stage
//!
//! # Example
//!
//! ```ignore
//! use feedagg::feed::{parse_feed, FeedFetcher, HttpFetcher};
//!
//! let body = fetcher.fetch("https://example.com/feed.xml").await?;
//! for item in parse_feed(&body)? {
//!     println!("{}", item.title);
//! }
//! ```

mod fetcher;
mod item;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, HttpFetcher, MAX_FEED_SIZE};
pub use item::FeedItem;
pub use parser::parse_feed;
