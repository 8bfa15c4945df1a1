//! Serde models of the upstream item layouts.
//!
//! Every field is optional: the service omits whole sections (statistics,
//! content details) depending on the requested parts, and the normalizer
//! decides what is mandatory.

use serde::{Deserialize, Deserializer};

use super::types::SourceKind;

/// Item from a chart or id lookup (`videos` endpoint): id at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVideo {
    pub id: Option<String>,
    pub snippet: Option<RawSnippet>,
    pub statistics: Option<RawStatistics>,
    pub content_details: Option<RawContentDetails>,
}

/// Item from a search or related query (`search` endpoint): id nested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSearchResult {
    pub id: Option<RawResourceId>,
    pub snippet: Option<RawSnippet>,
}

/// Nested identifier of a search hit. Only `video_id` makes a hit usable;
/// channel and playlist matches carry one of the other two instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResourceId {
    pub kind: Option<String>,
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
    pub playlist_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnippet {
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub description: Option<String>,
    pub thumbnails: Option<RawThumbnails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawThumbnails {
    pub default: Option<RawThumbnail>,
    pub medium: Option<RawThumbnail>,
    pub high: Option<RawThumbnail>,
}

impl RawThumbnails {
    /// First non-empty URL in `high -> medium -> default` order.
    pub fn best_url(&self) -> Option<&str> {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .filter_map(|thumb| thumb.as_ref()?.url.as_deref())
            .find(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawThumbnail {
    pub url: Option<String>,
}

/// Statistics arrive as decimal strings (`"12345"`); plain numbers are
/// accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatistics {
    #[serde(default, deserialize_with = "de_count")]
    pub view_count: Option<u64>,
    #[serde(default, deserialize_with = "de_count")]
    pub like_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContentDetails {
    pub duration: Option<String>,
}

fn de_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        Some(Count::Number(n)) => Some(n),
        Some(Count::Text(s)) => s.trim().parse().ok(),
        Some(Count::Other(_)) | None => None,
    })
}

/// A raw upstream item tagged with the query shape that produced it.
#[derive(Debug, Clone)]
pub enum RawItem {
    Trending(RawVideo),
    Search(RawSearchResult),
    Lookup(RawVideo),
    Related(RawSearchResult),
}

impl RawItem {
    /// Decode a JSON item using the extraction rule for `kind`.
    pub fn decode(kind: SourceKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            SourceKind::Trending => RawItem::Trending(serde_json::from_value(value)?),
            SourceKind::Lookup => RawItem::Lookup(serde_json::from_value(value)?),
            SourceKind::Search => RawItem::Search(serde_json::from_value(value)?),
            SourceKind::Related => RawItem::Related(serde_json::from_value(value)?),
        })
    }
}

/// Envelope shared by every list endpoint. A missing `items` array is an
/// empty page, not an error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawListResponse {
    #[serde(default)]
    pub items: Option<Vec<serde_json::Value>>,
    pub next_page_token: Option<String>,
    pub prev_page_token: Option<String>,
}
