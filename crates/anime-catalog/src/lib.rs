//! Anime catalog data layer.
//!
//! Fetches paginated anime listings from a GraphQL upstream (AniList) and a
//! REST upstream (Jikan), normalizes both into one canonical record shape,
//! deduplicates by id, and accumulates pages into an infinite-scroll feed.

pub mod accumulator;
pub mod api;
pub mod cache;
pub mod dedupe;
pub mod feed;
pub mod normalize;
pub mod source;

pub use accumulator::{ApplyOutcome, FeedPhase, FeedView, PaginationAccumulator};
pub use api::{AniListClient, CatalogError, JikanClient, RequestQueue};
pub use cache::ResponseCache;
pub use feed::InfiniteFeed;
pub use normalize::{ContentFilter, NormalizedPage, UpstreamPayload};
pub use source::{CatalogSource, FeedQuery, SearchFilters, SearchQuery, TopFilter};
