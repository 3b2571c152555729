//! Concurrent feed aggregation.
//!
//! Fetches a list of RSS/Atom feeds with bounded concurrency, collects every
//! entry, and hands them back newest first through a backpressured stream.
//!
//! - [`feed`] - Fetching and parsing collaborators
//! - [`pipeline`] - The aggregation pipeline itself
//! - [`config`] - TOML configuration
//! - [`render`] - RSS 2.0 and JSON lines output

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod render;

pub use feed::{FeedFetcher, FeedItem, FetchError, HttpFetcher};
pub use pipeline::{Aggregator, AggregatorOptions, FeedError, ItemStream};
