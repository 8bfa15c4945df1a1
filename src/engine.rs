//! The surface the presentation layer talks to.
//!
//! Feeds are created per view and own their own pagination state; the
//! engine hands out [`FeedController`]s and keeps the shared pieces (the
//! upstream source, watch history, suggestion tiers).

use chrono::Utc;
use std::sync::Arc;

use crate::api::{FetchError, VideoSource, YoutubeClient};
use crate::config::Config;
use crate::feed::{
    is_near_visible, FeedController, FeedItem, SearchFeed, SentinelBounds, ShortsFeed,
    TrendingFeed, Viewport,
};
use crate::history::{HistoryEntry, HistoryStore};
use crate::storage::LocalStore;
use crate::suggest::SuggestionResolver;

/// Feed parameters taken from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub region_code: String,
    pub page_size: u32,
    pub trending_page_size: u32,
    pub shorts_page_size: u32,
    pub prefetch_margin_px: f64,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            region_code: config.region_code.clone(),
            page_size: config.page_size,
            trending_page_size: config.trending_page_size,
            shorts_page_size: config.shorts_page_size,
            prefetch_margin_px: config.prefetch_margin_px,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Everything the watch view needs for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchView {
    pub item: FeedItem,
    pub suggestions: Vec<FeedItem>,
}

pub struct Engine {
    source: Arc<dyn VideoSource>,
    history: HistoryStore,
    suggestions: SuggestionResolver,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        source: Arc<dyn VideoSource>,
        store: Arc<dyn LocalStore>,
        settings: EngineSettings,
    ) -> Self {
        let suggestions = SuggestionResolver::standard(source.clone(), settings.region_code.clone());
        Self {
            source,
            history: HistoryStore::new(store),
            suggestions,
            settings,
        }
    }

    /// Build an engine backed by the HTTP client described by `config`.
    pub fn from_config(config: &Config, store: Arc<dyn LocalStore>) -> anyhow::Result<Self> {
        let client = YoutubeClient::new(
            &config.base_url,
            config.api_key(),
            Some(config.request_timeout()),
        )?;
        Ok(Self::new(Arc::new(client), store, EngineSettings::from(config)))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ========================================================================
    // Feeds
    // ========================================================================

    /// A new trending feed for `region` (the configured region when `None`).
    pub fn trending_feed(&self, region: Option<&str>) -> Arc<FeedController<TrendingFeed>> {
        let region = region.unwrap_or(&self.settings.region_code);
        Arc::new(FeedController::new(TrendingFeed::new(
            self.source.clone(),
            region,
            self.settings.trending_page_size,
        )))
    }

    pub fn search_feed(&self, term: &str) -> Arc<FeedController<SearchFeed>> {
        Arc::new(FeedController::new(SearchFeed::new(
            self.source.clone(),
            term.trim(),
            self.settings.page_size,
        )))
    }

    pub fn shorts_feed(&self) -> Arc<FeedController<ShortsFeed>> {
        Arc::new(FeedController::new(ShortsFeed::new(
            self.source.clone(),
            self.settings.region_code.as_str(),
            self.settings.shorts_page_size,
        )))
    }

    /// Whether the end-of-list sentinel is within the configured pre-fetch
    /// margin of the viewport. Feed the result to the loader's signal.
    pub fn sentinel_near(&self, viewport: Viewport, sentinel: SentinelBounds) -> bool {
        is_near_visible(viewport, sentinel, self.settings.prefetch_margin_px)
    }

    // ========================================================================
    // History
    // ========================================================================

    pub async fn get_history(&self) -> Vec<HistoryEntry> {
        self.history.list().await
    }

    /// Record `item` as watched now.
    pub async fn record_history(&self, item: &FeedItem) {
        self.history
            .record(HistoryEntry::from_item(item, Utc::now()))
            .await;
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
    }

    // ========================================================================
    // Watch
    // ========================================================================

    pub async fn get_suggestions(&self, focal_id: &str) -> Vec<FeedItem> {
        self.suggestions.resolve(focal_id).await
    }

    /// Open the watch view for `id`: look the item up, record it in history
    /// and resolve suggestions alongside.
    ///
    /// Returns `Ok(None)` when the service knows no such item; nothing is
    /// recorded in that case. Suggestions never fail.
    pub async fn watch(&self, id: &str) -> Result<Option<WatchView>, FetchError> {
        let ids = [id.to_string()];
        let (lookup, suggestions) =
            tokio::join!(self.source.lookup(&ids), self.suggestions.resolve(id));

        let Some(item) = lookup?.items.into_iter().find(|item| item.id == id) else {
            tracing::info!(id = id, "Lookup returned no item");
            return Ok(None);
        };

        self.record_history(&item).await;
        Ok(Some(WatchView { item, suggestions }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedPage;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn item(id: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            title: format!("Title {}", id),
            channel_name: "Chan".to_string(),
            thumbnail_url: String::new(),
            duration_seconds: Some(30),
            view_count: None,
            like_count: None,
            published_at: None,
            description: None,
        }
    }

    /// Records the region each trending call used.
    #[derive(Default)]
    struct Recorder {
        regions: Mutex<Vec<String>>,
        lookup_fails: bool,
    }

    #[async_trait]
    impl VideoSource for Recorder {
        async fn trending(
            &self,
            region: &str,
            _page_size: u32,
            _cursor: Option<&str>,
        ) -> Result<FeedPage, FetchError> {
            self.regions.lock().unwrap().push(region.to_string());
            Ok(FeedPage {
                items: vec![item("t1"), item("t2")],
                next_cursor: None,
                prev_cursor: None,
            })
        }

        async fn search(
            &self,
            term: &str,
            _page_size: u32,
            _cursor: Option<&str>,
        ) -> Result<FeedPage, FetchError> {
            Ok(FeedPage {
                items: vec![item(term)],
                next_cursor: None,
                prev_cursor: None,
            })
        }

        async fn lookup(&self, ids: &[String]) -> Result<FeedPage, FetchError> {
            if self.lookup_fails {
                return Err(FetchError::Timeout);
            }
            Ok(FeedPage {
                items: ids
                    .iter()
                    .filter(|id| id.as_str() != "missing")
                    .map(|id| item(id))
                    .collect(),
                next_cursor: None,
                prev_cursor: None,
            })
        }

        async fn related(&self, _focal_id: &str, _page_size: u32) -> Result<FeedPage, FetchError> {
            Ok(FeedPage::default())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn engine_with(source: Recorder) -> (Engine, Arc<Recorder>) {
        let source = Arc::new(source);
        let engine = Engine::new(
            source.clone(),
            Arc::new(MemoryStore::new()),
            EngineSettings::default(),
        );
        (engine, source)
    }

    #[tokio::test]
    async fn test_watch_records_and_suggests() {
        let (engine, _) = engine_with(Recorder::default());
        let view = engine.watch("abc").await.unwrap().unwrap();

        assert_eq!(view.item.id, "abc");
        // Related is empty, so suggestions fall back to the chart
        let ids: Vec<_> = view.suggestions.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        let history = engine.get_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "abc");
    }

    #[tokio::test]
    async fn test_watch_unknown_id_records_nothing() {
        let (engine, _) = engine_with(Recorder::default());
        assert!(engine.watch("missing").await.unwrap().is_none());
        assert!(engine.get_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_watch_lookup_failure_is_reported() {
        let (engine, _) = engine_with(Recorder {
            lookup_fails: true,
            ..Recorder::default()
        });
        assert!(engine.watch("abc").await.is_err());
        assert!(engine.get_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_trending_feed_region_override() {
        let (engine, source) = engine_with(Recorder::default());
        engine.trending_feed(None).load_initial().await.unwrap();
        engine.trending_feed(Some("FR")).load_initial().await.unwrap();
        assert_eq!(*source.regions.lock().unwrap(), vec!["US", "FR"]);
    }

    #[tokio::test]
    async fn test_feeds_are_independent() {
        let (engine, _) = engine_with(Recorder::default());
        let a = engine.search_feed("a");
        let b = engine.search_feed("b");
        a.load_initial().await.unwrap();

        assert_eq!(a.snapshot().items().len(), 1);
        assert!(!b.snapshot().is_loaded());
    }

    #[tokio::test]
    async fn test_history_operations() {
        let (engine, _) = engine_with(Recorder::default());
        engine.record_history(&item("x")).await;
        engine.record_history(&item("y")).await;
        assert_eq!(engine.get_history().await[0].id, "y");
        engine.clear_history().await;
        assert!(engine.get_history().await.is_empty());
    }

    #[test]
    fn test_sentinel_near_uses_configured_margin() {
        let engine_with_margin = |margin: f64| {
            Engine::new(
                Arc::new(Recorder::default()),
                Arc::new(MemoryStore::new()),
                EngineSettings {
                    prefetch_margin_px: margin,
                    ..EngineSettings::default()
                },
            )
        };
        let viewport = Viewport {
            offset: 0.0,
            height: 600.0,
        };
        // 100px below the fold
        let sentinel = SentinelBounds {
            top: 700.0,
            height: 1.0,
        };

        assert!(!engine_with_margin(50.0).sentinel_near(viewport, sentinel));
        assert!(engine_with_margin(300.0).sentinel_near(viewport, sentinel));
        assert!(engine_with_margin(200.0).sentinel_near(viewport, sentinel));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            region_code: "BR".to_string(),
            page_size: 5,
            ..Config::default()
        };
        let settings = EngineSettings::from(&config);
        assert_eq!(settings.region_code, "BR");
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.trending_page_size, 12);
        assert_eq!(settings.prefetch_margin_px, 200.0);
    }
}
