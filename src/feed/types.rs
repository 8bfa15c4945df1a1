use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format;

// ============================================================================
// Source Kinds
// ============================================================================

/// Which upstream query produced a raw item.
///
/// Trending and lookup results carry the item id at the top level; search and
/// related results nest it under a resource-id object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Trending,
    Search,
    Lookup,
    Related,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Trending => "trending",
            SourceKind::Search => "search",
            SourceKind::Lookup => "lookup",
            SourceKind::Related => "related",
        }
    }
}

// ============================================================================
// Canonical Records
// ============================================================================

/// Canonical video record produced by the normalizer.
///
/// `id` and `title` are always non-empty. Optional fields are `None` when the
/// originating query does not supply them (search results carry no duration
/// or statistics, for example). Display strings are derived on demand and
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub channel_name: String,
    /// Best available thumbnail (`high`, then `medium`, then `default`).
    pub thumbnail_url: String,
    pub duration_seconds: Option<u64>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl FeedItem {
    /// Duration badge, e.g. `4:07` or `1:02:03`.
    pub fn duration_label(&self) -> Option<String> {
        self.duration_seconds.map(format::format_duration)
    }

    /// Relative age against `now`, e.g. `3 weeks ago`.
    pub fn age_label(&self, now: DateTime<Utc>) -> Option<String> {
        self.published_at
            .map(|published| format::format_relative_age(published, now))
    }

    /// Abbreviated view count, e.g. `2.5M`.
    pub fn views_label(&self) -> Option<String> {
        self.view_count.map(format::format_view_count)
    }

    pub fn likes_label(&self) -> Option<String> {
        self.like_count.map(format::format_view_count)
    }

    /// Page URL handed to the external player.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// One page of normalized items plus the opaque cursors around it.
///
/// `next_cursor == None` means the feed has no further pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

impl FeedPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
