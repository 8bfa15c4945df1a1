//! Feed retrieval and normalization.
//!
//! - **Types**: the canonical [`FeedItem`] / [`FeedPage`] records
//! - **Raw shapes**: serde models of the four upstream item layouts
//! - **Normalization**: raw item -> `FeedItem`, dropping unusable items
//! - **Formatting**: duration codes, relative age and view counts for display
//! - **Pagination**: cursor state machine and the async [`FeedController`]
//! - **Visibility**: sentinel-driven automatic loading of the next page
//!
//! # Example
//!
//! ```ignore
//! use tubefeed::feed::{FeedController, TrendingFeed};
//!
//! let feed = FeedController::new(TrendingFeed::new(source, "US", 12));
//! feed.load_initial().await?;
//! feed.load_next().await?;
//! let snapshot = feed.snapshot();
//! ```

pub mod format;
mod normalize;
mod pagination;
mod raw;
mod types;
mod visibility;

pub use normalize::{normalize, normalize_value, parse_page, NormalizedPage};
pub use pagination::{
    FeedController, FeedState, LoadOutcome, LoadPhase, LoadTicket, PageDirection,
    PageFetcher, SearchFeed, ShortsFeed, TrendingFeed, SHORTS_MAX_SECONDS,
};
pub use raw::{RawItem, RawResourceId, RawSearchResult, RawSnippet, RawVideo};
pub use types::{FeedItem, FeedPage, SourceKind};
pub use visibility::{
    is_near_visible, spawn_visibility_loader, LoaderHandle, SentinelBounds, Viewport,
    VisibilityLoader, DEFAULT_PREFETCH_MARGIN_PX,
};
