use chrono::{DateTime, Utc};

use super::format::parse_duration;
use super::raw::{RawItem, RawListResponse, RawSearchResult, RawSnippet, RawVideo};
use super::types::{FeedItem, FeedPage, SourceKind};
use crate::util::strip_control_chars;

/// A decoded page plus the number of items dropped as unusable.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPage {
    pub page: FeedPage,
    pub skipped: usize,
}

/// Map a raw upstream item onto the canonical record.
///
/// Returns `None` when the item has no usable id or no title; callers drop
/// such items and never render a partial record. Search and related hits
/// that match a channel or playlist (no video id) are unusable.
pub fn normalize(raw: RawItem) -> Option<FeedItem> {
    match raw {
        RawItem::Trending(video) | RawItem::Lookup(video) => normalize_video(video),
        RawItem::Search(hit) | RawItem::Related(hit) => normalize_hit(hit),
    }
}

/// Decode and normalize a single JSON item; decode failures count as unusable.
pub fn normalize_value(kind: SourceKind, value: serde_json::Value) -> Option<FeedItem> {
    match RawItem::decode(kind, value) {
        Ok(raw) => normalize(raw),
        Err(e) => {
            tracing::debug!(kind = kind.as_str(), error = %e, "Dropping undecodable item");
            None
        }
    }
}

/// Parse a list-endpoint response body into a normalized page.
///
/// The body must be a JSON object; anything else is an error. Items are
/// normalized one by one, and unusable ones are counted in `skipped` instead
/// of failing the page.
pub fn parse_page(bytes: &[u8], kind: SourceKind) -> Result<NormalizedPage, serde_json::Error> {
    let response: RawListResponse = serde_json::from_slice(bytes)?;

    let raw_items = response.items.unwrap_or_default();
    let total = raw_items.len();
    let items: Vec<FeedItem> = raw_items
        .into_iter()
        .filter_map(|value| normalize_value(kind, value))
        .collect();

    Ok(NormalizedPage {
        skipped: total - items.len(),
        page: FeedPage {
            items,
            next_cursor: non_empty(response.next_page_token),
            prev_cursor: non_empty(response.prev_page_token),
        },
    })
}

fn normalize_video(video: RawVideo) -> Option<FeedItem> {
    let id = non_empty(video.id)?;
    let mut item = from_snippet(id, video.snippet?)?;

    item.duration_seconds = video
        .content_details
        .and_then(|details| parse_duration(details.duration.as_deref()));
    if let Some(stats) = video.statistics {
        item.view_count = stats.view_count;
        item.like_count = stats.like_count;
    }
    Some(item)
}

fn normalize_hit(hit: RawSearchResult) -> Option<FeedItem> {
    let id = non_empty(hit.id?.video_id)?;
    from_snippet(id, hit.snippet?)
}

fn from_snippet(id: String, snippet: RawSnippet) -> Option<FeedItem> {
    let title = clean(snippet.title.as_deref()?);
    if title.is_empty() {
        return None;
    }

    let thumbnail_url = snippet
        .thumbnails
        .as_ref()
        .and_then(|thumbs| thumbs.best_url())
        .unwrap_or_default()
        .to_string();

    Some(FeedItem {
        id,
        title,
        channel_name: snippet
            .channel_title
            .as_deref()
            .map(clean)
            .unwrap_or_default(),
        thumbnail_url,
        duration_seconds: None,
        view_count: None,
        like_count: None,
        published_at: snippet.published_at.as_deref().and_then(parse_timestamp),
        description: snippet
            .description
            .filter(|d| !d.trim().is_empty())
            .map(|d| strip_control_chars(&d).into_owned()),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn clean(text: &str) -> String {
    strip_control_chars(text).trim().to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn chart_item() -> serde_json::Value {
        json!({
            "kind": "youtube#video",
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "title": "Never Gonna Give You Up",
                "channelTitle": "Rick Astley",
                "publishedAt": "2009-10-25T06:57:33Z",
                "description": "The official video",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/vi/x/default.jpg"},
                    "medium": {"url": "https://i.ytimg.com/vi/x/mqdefault.jpg"},
                    "high": {"url": "https://i.ytimg.com/vi/x/hqdefault.jpg"}
                }
            },
            "statistics": {"viewCount": "1500000000", "likeCount": "17000000"},
            "contentDetails": {"duration": "PT3M33S"}
        })
    }

    fn search_hit(id: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "snippet": {
                "title": "A search hit",
                "channelTitle": "Some Channel",
                "thumbnails": {"medium": {"url": "https://i.ytimg.com/m.jpg"}}
            }
        })
    }

    #[test]
    fn test_chart_item_normalizes_fully() {
        let item = normalize_value(SourceKind::Trending, chart_item()).unwrap();
        assert_eq!(item.id, "dQw4w9WgXcQ");
        assert_eq!(item.title, "Never Gonna Give You Up");
        assert_eq!(item.channel_name, "Rick Astley");
        assert_eq!(item.thumbnail_url, "https://i.ytimg.com/vi/x/hqdefault.jpg");
        assert_eq!(item.duration_seconds, Some(213));
        assert_eq!(item.view_count, Some(1_500_000_000));
        assert_eq!(item.like_count, Some(17_000_000));
        assert!(item.published_at.is_some());
        assert_eq!(item.description.as_deref(), Some("The official video"));
    }

    #[test]
    fn test_lookup_uses_top_level_id() {
        let item = normalize_value(SourceKind::Lookup, chart_item()).unwrap();
        assert_eq!(item.id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_search_hit_uses_nested_id() {
        let value = search_hit(json!({"kind": "youtube#video", "videoId": "abc123"}));
        let item = normalize_value(SourceKind::Search, value).unwrap();
        assert_eq!(item.id, "abc123");
        assert_eq!(item.thumbnail_url, "https://i.ytimg.com/m.jpg");
        assert_eq!(item.duration_seconds, None);
        assert_eq!(item.view_count, None);
    }

    #[test]
    fn test_channel_and_playlist_hits_are_unusable() {
        let channel = search_hit(json!({"kind": "youtube#channel", "channelId": "UC123"}));
        let playlist = search_hit(json!({"kind": "youtube#playlist", "playlistId": "PL123"}));
        assert!(normalize_value(SourceKind::Related, channel).is_none());
        assert!(normalize_value(SourceKind::Related, playlist).is_none());
    }

    #[test]
    fn test_missing_title_drops_item() {
        let mut value = chart_item();
        value["snippet"]["title"] = json!("   ");
        assert!(normalize_value(SourceKind::Trending, value).is_none());

        let mut value = chart_item();
        value["snippet"].as_object_mut().unwrap().remove("title");
        assert!(normalize_value(SourceKind::Trending, value).is_none());
    }

    #[test]
    fn test_missing_id_drops_item() {
        let mut value = chart_item();
        value.as_object_mut().unwrap().remove("id");
        assert!(normalize_value(SourceKind::Trending, value).is_none());
    }

    #[test]
    fn test_missing_optional_sections_tolerated() {
        let value = json!({
            "id": "xyz",
            "snippet": {"title": "Bare"}
        });
        let item = normalize_value(SourceKind::Lookup, value).unwrap();
        assert_eq!(item.channel_name, "");
        assert_eq!(item.thumbnail_url, "");
        assert_eq!(item.duration_seconds, None);
        assert_eq!(item.view_count, None);
        assert_eq!(item.published_at, None);
    }

    #[test]
    fn test_control_chars_stripped_from_title() {
        let mut value = chart_item();
        value["snippet"]["title"] = json!("\x1b[31mRed\x1b[0m title");
        let item = normalize_value(SourceKind::Trending, value).unwrap();
        assert_eq!(item.title, "Red title");
    }

    #[test]
    fn test_parse_page_counts_skipped() {
        let body = json!({
            "nextPageToken": "CAoQAA",
            "items": [
                search_hit(json!({"videoId": "a"})),
                search_hit(json!({"channelId": "UCx"})),
                search_hit(json!({"videoId": "b"})),
                42
            ]
        });
        let parsed = parse_page(body.to_string().as_bytes(), SourceKind::Search).unwrap();
        let ids: Vec<_> = parsed.page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.page.next_cursor.as_deref(), Some("CAoQAA"));
        assert_eq!(parsed.page.prev_cursor, None);
    }

    #[test]
    fn test_parse_page_without_items_is_empty() {
        let parsed = parse_page(br#"{"kind":"youtube#videoListResponse"}"#, SourceKind::Trending)
            .unwrap();
        assert!(parsed.page.is_empty());
        assert_eq!(parsed.page.next_cursor, None);
    }

    #[test]
    fn test_parse_page_rejects_non_object() {
        assert!(parse_page(b"[1,2,3]", SourceKind::Trending).is_err());
        assert!(parse_page(b"<html>", SourceKind::Trending).is_err());
    }

    #[test]
    fn test_empty_cursor_treated_as_absent() {
        let parsed = parse_page(br#"{"items":[],"nextPageToken":""}"#, SourceKind::Search).unwrap();
        assert_eq!(parsed.page.next_cursor, None);
    }

    fn arb_text() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            Just(Some("   ".to_string())),
            "[ -~]{0,12}".prop_map(Some),
        ]
    }

    fn arb_kind() -> impl Strategy<Value = SourceKind> {
        prop_oneof![
            Just(SourceKind::Trending),
            Just(SourceKind::Search),
            Just(SourceKind::Lookup),
            Just(SourceKind::Related),
        ]
    }

    proptest! {
        #[test]
        fn prop_normalize_never_yields_partial_record(
            kind in arb_kind(),
            id in arb_text(),
            title in arb_text(),
            nested in any::<bool>(),
        ) {
            let id_value = match (&id, nested) {
                (Some(id), true) => json!({"videoId": id}),
                (Some(id), false) => json!(id),
                (None, _) => serde_json::Value::Null,
            };
            let value = json!({
                "id": id_value,
                "snippet": {"title": title, "channelTitle": "c"}
            });
            if let Some(item) = normalize_value(kind, value) {
                prop_assert!(!item.id.is_empty());
                prop_assert!(!item.title.is_empty());
                prop_assert!(!item.id.trim().is_empty());
                prop_assert!(!item.title.trim().is_empty());
            }
        }
    }
}
