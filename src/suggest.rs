//! "Up next" suggestions for a focal item.
//!
//! [`SuggestionResolver`] walks an ordered list of [`SuggestionStrategy`]
//! tiers and returns the first non-empty success. A tier that fails is
//! treated like a tier that found nothing. When every tier comes up empty the
//! result is an empty list; the resolver never returns an error.

use async_trait::async_trait;
use std::sync::Arc;

use crate::api::{FetchError, VideoSource};
use crate::feed::FeedItem;

/// Most suggestions returned for one focal item.
pub const SUGGESTION_LIMIT: usize = 8;

/// One tier of the suggestion fallback chain.
#[async_trait]
pub trait SuggestionStrategy: Send + Sync {
    async fn suggest(&self, focal_id: &str) -> Result<Vec<FeedItem>, FetchError>;

    /// Tier name for logging
    fn name(&self) -> &'static str;
}

/// Items the service considers related to the focal item.
///
/// Search hits that are channels or playlists never get this far: the
/// normalizer drops any related hit without a video id.
pub struct RelatedStrategy {
    source: Arc<dyn VideoSource>,
}

impl RelatedStrategy {
    pub fn new(source: Arc<dyn VideoSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SuggestionStrategy for RelatedStrategy {
    async fn suggest(&self, focal_id: &str) -> Result<Vec<FeedItem>, FetchError> {
        let page = self
            .source
            .related(focal_id, SUGGESTION_LIMIT as u32)
            .await?;
        Ok(page.items)
    }

    fn name(&self) -> &'static str {
        "related"
    }
}

/// The regional chart, minus the focal item.
pub struct TrendingFallback {
    source: Arc<dyn VideoSource>,
    region: String,
}

impl TrendingFallback {
    pub fn new(source: Arc<dyn VideoSource>, region: impl Into<String>) -> Self {
        Self {
            source,
            region: region.into(),
        }
    }
}

#[async_trait]
impl SuggestionStrategy for TrendingFallback {
    async fn suggest(&self, focal_id: &str) -> Result<Vec<FeedItem>, FetchError> {
        let page = self
            .source
            .trending(&self.region, SUGGESTION_LIMIT as u32, None)
            .await?;
        Ok(page
            .items
            .into_iter()
            .filter(|item| item.id != focal_id)
            .collect())
    }

    fn name(&self) -> &'static str {
        "trending"
    }
}

pub struct SuggestionResolver {
    tiers: Vec<Box<dyn SuggestionStrategy>>,
}

impl SuggestionResolver {
    pub fn new(tiers: Vec<Box<dyn SuggestionStrategy>>) -> Self {
        Self { tiers }
    }

    /// Related items first, then the chart for `region`.
    pub fn standard(source: Arc<dyn VideoSource>, region: impl Into<String>) -> Self {
        Self::new(vec![
            Box::new(RelatedStrategy::new(source.clone())),
            Box::new(TrendingFallback::new(source, region)),
        ])
    }

    /// Suggestions for `focal_id`, at most [`SUGGESTION_LIMIT`], possibly empty.
    pub async fn resolve(&self, focal_id: &str) -> Vec<FeedItem> {
        for tier in &self.tiers {
            match tier.suggest(focal_id).await {
                Ok(mut items) if !items.is_empty() => {
                    items.truncate(SUGGESTION_LIMIT);
                    tracing::debug!(
                        focal_id = focal_id,
                        tier = tier.name(),
                        count = items.len(),
                        "Resolved suggestions"
                    );
                    return items;
                }
                Ok(_) => {
                    tracing::info!(focal_id = focal_id, tier = tier.name(), "No suggestions from tier; falling back");
                }
                Err(e) => {
                    tracing::warn!(focal_id = focal_id, tier = tier.name(), error = %e, "Suggestion tier failed; falling back");
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedPage;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(id: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            title: id.to_uppercase(),
            channel_name: String::new(),
            thumbnail_url: String::new(),
            duration_seconds: None,
            view_count: None,
            like_count: None,
            published_at: None,
            description: None,
        }
    }

    fn items(ids: &[&str]) -> Vec<FeedItem> {
        ids.iter().map(|id| item(id)).collect()
    }

    #[derive(Clone)]
    enum Reply {
        Items(Vec<FeedItem>),
        Fail,
    }

    impl Reply {
        fn page(&self) -> Result<FeedPage, FetchError> {
            match self {
                Reply::Items(items) => Ok(FeedPage {
                    items: items.clone(),
                    next_cursor: None,
                    prev_cursor: None,
                }),
                Reply::Fail => Err(FetchError::HttpStatus(500)),
            }
        }
    }

    struct FakeSource {
        related: Reply,
        trending: Reply,
        trending_calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(related: Reply, trending: Reply) -> Arc<Self> {
            Arc::new(Self {
                related,
                trending,
                trending_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn trending(
            &self,
            _region: &str,
            _page_size: u32,
            _cursor: Option<&str>,
        ) -> Result<FeedPage, FetchError> {
            self.trending_calls.fetch_add(1, Ordering::SeqCst);
            self.trending.page()
        }

        async fn search(
            &self,
            _term: &str,
            _page_size: u32,
            _cursor: Option<&str>,
        ) -> Result<FeedPage, FetchError> {
            Ok(FeedPage::default())
        }

        async fn lookup(&self, _ids: &[String]) -> Result<FeedPage, FetchError> {
            Ok(FeedPage::default())
        }

        async fn related(&self, _focal_id: &str, _page_size: u32) -> Result<FeedPage, FetchError> {
            self.related.page()
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn ids(items: &[FeedItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_related_wins_when_non_empty() {
        let source = FakeSource::new(
            Reply::Items(items(&["r1", "r2"])),
            Reply::Items(items(&["t1"])),
        );
        let resolver = SuggestionResolver::standard(source.clone(), "US");

        assert_eq!(ids(&resolver.resolve("focal").await), vec!["r1", "r2"]);
        assert_eq!(source.trending_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_related_falls_back_excluding_focal() {
        let source = FakeSource::new(
            Reply::Items(vec![]),
            Reply::Items(items(&["t1", "focal", "t2"])),
        );
        let resolver = SuggestionResolver::standard(source, "US");
        assert_eq!(ids(&resolver.resolve("focal").await), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_related_failure_same_as_empty() {
        let trending = Reply::Items(items(&["t1", "focal", "t2"]));
        let on_empty = SuggestionResolver::standard(
            FakeSource::new(Reply::Items(vec![]), trending.clone()),
            "US",
        )
        .resolve("focal")
        .await;
        let on_failure =
            SuggestionResolver::standard(FakeSource::new(Reply::Fail, trending), "US")
                .resolve("focal")
                .await;
        assert_eq!(on_empty, on_failure);
    }

    #[tokio::test]
    async fn test_all_tiers_failing_yields_empty() {
        let resolver =
            SuggestionResolver::standard(FakeSource::new(Reply::Fail, Reply::Fail), "US");
        assert!(resolver.resolve("focal").await.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_only_focal_yields_empty() {
        let resolver = SuggestionResolver::standard(
            FakeSource::new(Reply::Items(vec![]), Reply::Items(items(&["focal"]))),
            "US",
        );
        assert!(resolver.resolve("focal").await.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_to_limit() {
        let many: Vec<String> = (0..12).map(|i| format!("r{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let resolver = SuggestionResolver::standard(
            FakeSource::new(Reply::Items(items(&refs)), Reply::Fail),
            "US",
        );
        assert_eq!(resolver.resolve("focal").await.len(), SUGGESTION_LIMIT);
    }

    #[tokio::test]
    async fn test_no_tiers_is_empty() {
        assert!(SuggestionResolver::new(Vec::new())
            .resolve("focal")
            .await
            .is_empty());
    }
}
