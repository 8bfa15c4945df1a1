//! Watch history: bounded, deduplicated, most recent first.
//!
//! The whole list lives as one JSON array under [`HISTORY_KEY`] in a
//! [`LocalStore`]. Every mutation is a read-modify-write of that array,
//! serialized by an async mutex. Storage failures never reach the caller:
//! reads fall back to an empty list and failed writes are logged and dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::feed::FeedItem;
use crate::storage::LocalStore;

/// Storage key holding the serialized history array.
pub const HISTORY_KEY: &str = "watchHistory";

/// Maximum number of entries kept.
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "channel", default)]
    pub channel_name: String,
    #[serde(rename = "thumbnail", default)]
    pub thumbnail_url: String,
    #[serde(rename = "watchedAt")]
    pub watched_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_item(item: &FeedItem, watched_at: DateTime<Utc>) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            channel_name: item.channel_name.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            watched_at,
        }
    }
}

/// Insert `entry` at the front, dropping any older entry with the same id and
/// anything beyond [`HISTORY_CAPACITY`].
pub fn push_front(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    entries.retain(|e| e.id != entry.id);
    entries.insert(0, entry);
    entries.truncate(HISTORY_CAPACITY);
}

/// Decode a persisted payload.
///
/// Anything that is not a JSON array decodes as empty. Array elements that
/// are not valid entries are skipped; the rest keep their order. A repeated
/// id keeps its first (most recent) occurrence, and at most
/// [`HISTORY_CAPACITY`] entries are returned.
pub fn decode_entries(raw: &str) -> Vec<HistoryEntry> {
    let values = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(values)) => values,
        Ok(_) => {
            tracing::warn!("Stored history is not an array; treating as empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stored history is not valid JSON; treating as empty");
            return Vec::new();
        }
    };

    let total = values.len();
    let mut seen = HashSet::new();
    let mut entries: Vec<HistoryEntry> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<HistoryEntry>(v).ok())
        .filter(|entry| seen.insert(entry.id.clone()))
        .collect();
    entries.truncate(HISTORY_CAPACITY);

    if entries.len() < total {
        tracing::debug!(
            dropped = total - entries.len(),
            "Dropped unreadable, repeated or excess history entries"
        );
    }
    entries
}

pub struct HistoryStore {
    store: Arc<dyn LocalStore>,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Entries, most recent first.
    pub async fn list(&self) -> Vec<HistoryEntry> {
        self.load().await
    }

    /// Record a watch. Re-watching an id moves it to the front with the new timestamp.
    pub async fn record(&self, entry: HistoryEntry) {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await;
        push_front(&mut entries, entry);
        self.save(&entries).await;
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.store.remove(HISTORY_KEY).await {
            tracing::warn!(error = %e, "Failed to clear watch history");
        }
    }

    async fn load(&self) -> Vec<HistoryEntry> {
        match self.store.get(HISTORY_KEY).await {
            Ok(Some(raw)) => decode_entries(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read watch history");
                Vec::new()
            }
        }
    }

    async fn save(&self, entries: &[HistoryEntry]) {
        let payload = match serde_json::to_string(entries) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize watch history");
                return;
            }
        };
        if let Err(e) = self.store.set(HISTORY_KEY, &payload).await {
            tracing::warn!(error = %e, entries = entries.len(), "Failed to persist watch history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, MemoryStore};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn entry(id: &str, minute: i64) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            title: format!("Video {}", id),
            channel_name: "Channel".to_string(),
            thumbnail_url: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id),
            watched_at: at(minute),
        }
    }

    fn memory_history() -> HistoryStore {
        HistoryStore::new(Arc::new(MemoryStore::new()))
    }

    fn ids(entries: &[HistoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl LocalStore for BrokenStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("storage unavailable")
        }
        async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("quota exceeded")
        }
        async fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("storage unavailable")
        }
    }

    #[tokio::test]
    async fn test_empty_by_default() {
        assert!(memory_history().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_most_recent_first() {
        let history = memory_history();
        history.record(entry("a", 0)).await;
        history.record(entry("b", 1)).await;
        history.record(entry("c", 2)).await;
        assert_eq!(ids(&history.list().await), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_rewatch_moves_to_front() {
        let history = memory_history();
        history.record(entry("a", 0)).await;
        history.record(entry("b", 1)).await;
        history.record(entry("a", 5)).await;

        let entries = history.list().await;
        assert_eq!(ids(&entries), vec!["a", "b"]);
        assert_eq!(entries[0].watched_at, at(5));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let history = memory_history();
        for i in 0..=HISTORY_CAPACITY {
            history.record(entry(&format!("v{}", i), i as i64)).await;
        }

        let entries = history.list().await;
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert!(entries.iter().all(|e| e.id != "v0"));
        assert_eq!(entries[0].id, format!("v{}", HISTORY_CAPACITY));
    }

    #[tokio::test]
    async fn test_clear() {
        let history = memory_history();
        history.record(entry("a", 0)).await;
        history.clear().await;
        assert!(history.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_empty() {
        for raw in ["not json", "{\"id\":\"x\"}", "42", "null"] {
            let history = HistoryStore::new(Arc::new(MemoryStore::with_value(HISTORY_KEY, raw)));
            assert!(history.list().await.is_empty(), "payload {:?}", raw);
        }
    }

    #[tokio::test]
    async fn test_garbage_payload_overwritten_on_record() {
        let store = Arc::new(MemoryStore::with_value(HISTORY_KEY, "{broken"));
        let history = HistoryStore::new(store.clone());
        history.record(entry("a", 0)).await;
        assert_eq!(ids(&history.list().await), vec!["a"]);
    }

    #[test]
    fn test_partial_array_keeps_valid_entries() {
        let raw = r#"[
            {"id":"a","title":"A","channel":"C","thumbnail":"t","watchedAt":"2024-03-01T12:00:00Z"},
            {"title":"no id"},
            "string",
            {"id":"b","title":"B","watchedAt":"2024-03-01T11:00:00.000Z"}
        ]"#;
        let entries = decode_entries(raw);
        assert_eq!(ids(&entries), vec!["a", "b"]);
        assert_eq!(entries[1].channel_name, "");
    }

    #[test]
    fn test_repeated_ids_keep_first_occurrence() {
        let stored = vec![entry("a", 5), entry("b", 4), entry("a", 1)];
        let raw = serde_json::to_string(&stored).unwrap();
        let entries = decode_entries(&raw);
        assert_eq!(ids(&entries), vec!["a", "b"]);
        assert_eq!(entries[0].watched_at, at(5));
    }

    #[tokio::test]
    async fn test_oversized_payload_truncated_on_read() {
        let stored: Vec<_> = (0..60)
            .map(|i| entry(&format!("v{}", i), 100 - i as i64))
            .collect();
        let raw = serde_json::to_string(&stored).unwrap();
        let history = HistoryStore::new(Arc::new(MemoryStore::with_value(HISTORY_KEY, &raw)));

        let entries = history.list().await;
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0].id, "v0");
        assert_eq!(entries[HISTORY_CAPACITY - 1].id, "v49");
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(entry("a", 0)).unwrap();
        assert_eq!(json["channel"], "Channel");
        assert_eq!(json["watchedAt"], "2024-03-01T12:00:00Z");
        assert!(json.get("thumbnail").is_some());
    }

    #[tokio::test]
    async fn test_storage_failures_absorbed() {
        let history = HistoryStore::new(Arc::new(BrokenStore));
        history.record(entry("a", 0)).await;
        history.clear().await;
        assert!(history.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_through_database() {
        let db = Database::open(":memory:").await.unwrap();
        let store: Arc<dyn LocalStore> = Arc::new(db);
        let history = HistoryStore::new(store.clone());
        for (i, id) in ["a", "b", "c", "b"].iter().enumerate() {
            history.record(entry(id, i as i64)).await;
        }
        let before = history.list().await;

        let reopened = HistoryStore::new(store);
        assert_eq!(reopened.list().await, before);
        assert_eq!(ids(&before), vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_serialized() {
        let history = Arc::new(memory_history());
        let mut tasks = Vec::new();
        for i in 0..20 {
            let history = history.clone();
            tasks.push(tokio::spawn(async move {
                history.record(entry(&format!("v{}", i), i)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(history.list().await.len(), 20);
    }

    #[test]
    fn test_from_item() {
        let item = FeedItem {
            id: "abc".to_string(),
            title: "Title".to_string(),
            channel_name: "Chan".to_string(),
            thumbnail_url: "https://img".to_string(),
            duration_seconds: Some(61),
            view_count: Some(10),
            like_count: None,
            published_at: None,
            description: None,
        };
        let e = HistoryEntry::from_item(&item, at(0));
        assert_eq!(e.id, "abc");
        assert_eq!(e.channel_name, "Chan");
        assert_eq!(e.thumbnail_url, "https://img");
    }
}
