//! Cursor pagination for one feed instance.
//!
//! [`FeedState`] is the synchronous state machine:
//!
//! ```text
//!            begin_initial            commit(Ok, next=Some)
//!   Idle ------------------> LoadingInitial ------------------> Idle
//!    ^  \                                  \ commit(Ok, next=None)
//!    |   \ begin_next (cursor)              `-----------------> Exhausted
//!    |    `-----------------> LoadingMore
//!    `--- commit(Ok, next=Some) / commit(Err) -'
//! ```
//!
//! A load is only started from `Idle` (or `Exhausted` for paging backwards),
//! so at most one request is ever in flight per feed. [`FeedController`]
//! wraps the state with an injected [`PageFetcher`] and a liveness flag so
//! results that arrive after teardown are dropped instead of applied. Every
//! state transition bumps a version on a `watch` channel, which is how the
//! visibility loader learns that a cursor appeared or a load finished.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::types::{FeedItem, FeedPage};
use crate::api::{FetchError, VideoSource};

/// Longest duration, in seconds, that still counts as a short.
pub const SHORTS_MAX_SECONDS: u64 = 60;

// ============================================================================
// State Machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    /// No request in flight; more pages may exist.
    #[default]
    Idle,
    /// First page (or a replacing page) is being fetched.
    LoadingInitial,
    /// An appended page is being fetched.
    LoadingMore,
    /// The last page returned no next cursor.
    Exhausted,
}

/// Step direction for feeds paged one screen at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Initial,
    Append,
    Replace(PageDirection),
}

/// Proof that a load was started; handed back to [`FeedState::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    mode: LoadMode,
    cursor: Option<String>,
}

impl LoadTicket {
    /// Cursor to fetch with (`None` for the first page).
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }
}

/// What a load call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was committed; `added` items became visible.
    Applied { added: usize },
    /// Nothing was started: a load is in flight or no cursor is available.
    Skipped,
    /// The result arrived for a torn-down or reset feed and was dropped.
    Discarded,
}

/// Pagination state of one feed instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    items: Vec<FeedItem>,
    cursor: Option<String>,
    prev_cursor: Option<String>,
    phase: LoadPhase,
    generation: u64,
    page_index: usize,
    loaded: bool,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    /// Cursor of the next page, `None` before the first load and once exhausted.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn prev_cursor(&self) -> Option<&str> {
        self.prev_cursor.as_deref()
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading_initial(&self) -> bool {
        self.phase == LoadPhase::LoadingInitial
    }

    pub fn is_loading_more(&self) -> bool {
        self.phase == LoadPhase::LoadingMore
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading_initial() || self.is_loading_more()
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == LoadPhase::Exhausted
    }

    /// Whether at least one page has been committed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// A well-formed response came back with nothing to show.
    pub fn is_empty_result(&self) -> bool {
        self.loaded && self.items.is_empty() && !self.is_loading()
    }

    /// 1-based index of the page on screen for replace-style paging (0 before any load).
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Start loading the first page. The committed page replaces all items.
    pub fn begin_initial(&mut self) -> Option<LoadTicket> {
        if self.is_loading() {
            return None;
        }
        self.phase = LoadPhase::LoadingInitial;
        Some(self.ticket(LoadMode::Initial, None))
    }

    /// Start loading the page after the current cursor. The committed page is
    /// appended. Returns `None` (a no-op) while any load is in flight, before
    /// the first page, and once the feed is exhausted.
    pub fn begin_next(&mut self) -> Option<LoadTicket> {
        if self.phase != LoadPhase::Idle {
            return None;
        }
        let cursor = self.cursor.clone()?;
        self.phase = LoadPhase::LoadingMore;
        Some(self.ticket(LoadMode::Append, Some(cursor)))
    }

    /// Start loading the neighbouring page; the committed page replaces the
    /// items on screen.
    pub fn begin_page(&mut self, direction: PageDirection) -> Option<LoadTicket> {
        if self.is_loading() {
            return None;
        }
        let cursor = match direction {
            PageDirection::Next => self.cursor.clone()?,
            PageDirection::Previous => self.prev_cursor.clone()?,
        };
        self.phase = LoadPhase::LoadingInitial;
        Some(self.ticket(LoadMode::Replace(direction), Some(cursor)))
    }

    /// Apply the result of the load started with `ticket`.
    ///
    /// Results from an older generation are discarded untouched. On failure
    /// the items and cursors stay as they were, the loading phase is cleared,
    /// and the error is returned to the caller.
    pub fn commit(
        &mut self,
        ticket: LoadTicket,
        result: Result<FeedPage, FetchError>,
    ) -> Result<LoadOutcome, FetchError> {
        if ticket.generation != self.generation {
            return Ok(LoadOutcome::Discarded);
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                self.phase = LoadPhase::Idle;
                return Err(e);
            }
        };

        let added = match ticket.mode {
            LoadMode::Initial => {
                self.items.clear();
                self.page_index = 1;
                self.append_unique(page.items)
            }
            LoadMode::Append => self.append_unique(page.items),
            LoadMode::Replace(direction) => {
                self.items.clear();
                self.page_index = match direction {
                    PageDirection::Next => self.page_index + 1,
                    PageDirection::Previous => self.page_index.saturating_sub(1).max(1),
                };
                self.append_unique(page.items)
            }
        };

        self.cursor = page.next_cursor;
        self.prev_cursor = page.prev_cursor;
        self.loaded = true;
        self.phase = if self.cursor.is_some() {
            LoadPhase::Idle
        } else {
            LoadPhase::Exhausted
        };

        Ok(LoadOutcome::Applied { added })
    }

    /// Forget everything and invalidate any load in flight.
    pub fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    fn ticket(&self, mode: LoadMode, cursor: Option<String>) -> LoadTicket {
        LoadTicket {
            generation: self.generation,
            mode,
            cursor,
        }
    }

    /// Append items whose id is not already in the feed (or earlier in `incoming`).
    fn append_unique(&mut self, incoming: Vec<FeedItem>) -> usize {
        let mut seen: HashSet<String> = self.items.iter().map(|i| i.id.clone()).collect();
        let before = self.items.len();
        let offered = incoming.len();
        self.items
            .extend(incoming.into_iter().filter(|item| seen.insert(item.id.clone())));
        let added = self.items.len() - before;
        if added < offered {
            tracing::debug!(
                duplicates = offered - added,
                "Skipped items already present in feed"
            );
        }
        added
    }
}

// ============================================================================
// Page Fetchers
// ============================================================================

/// Fetches one page of a feed given the cursor (`None` for the first page).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError>;

    /// Feed name for logging
    fn label(&self) -> String;
}

/// Most-popular chart for one region.
pub struct TrendingFeed {
    source: Arc<dyn VideoSource>,
    region: String,
    page_size: u32,
}

impl TrendingFeed {
    pub fn new(source: Arc<dyn VideoSource>, region: impl Into<String>, page_size: u32) -> Self {
        Self {
            source,
            region: region.into(),
            page_size,
        }
    }
}

#[async_trait]
impl PageFetcher for TrendingFeed {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        self.source
            .trending(&self.region, self.page_size, cursor)
            .await
    }

    fn label(&self) -> String {
        format!("trending:{}", self.region)
    }
}

/// Search results for one term.
pub struct SearchFeed {
    source: Arc<dyn VideoSource>,
    term: String,
    page_size: u32,
}

impl SearchFeed {
    pub fn new(source: Arc<dyn VideoSource>, term: impl Into<String>, page_size: u32) -> Self {
        Self {
            source,
            term: term.into(),
            page_size,
        }
    }
}

#[async_trait]
impl PageFetcher for SearchFeed {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        self.source.search(&self.term, self.page_size, cursor).await
    }

    fn label(&self) -> String {
        format!("search:{}", self.term)
    }
}

/// Chart items short enough to count as shorts. Items with an unknown
/// duration are left out.
pub struct ShortsFeed {
    chart: TrendingFeed,
}

impl ShortsFeed {
    pub fn new(source: Arc<dyn VideoSource>, region: impl Into<String>, page_size: u32) -> Self {
        Self {
            chart: TrendingFeed::new(source, region, page_size),
        }
    }
}

#[async_trait]
impl PageFetcher for ShortsFeed {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        let mut page = self.chart.fetch_page(cursor).await?;
        page.items
            .retain(|item| matches!(item.duration_seconds, Some(d) if d <= SHORTS_MAX_SECONDS));
        Ok(page)
    }

    fn label(&self) -> String {
        format!("shorts:{}", self.chart.region)
    }
}

// ============================================================================
// Controller
// ============================================================================

/// One live feed: state plus the capability that fetches its pages.
///
/// The state lock is never held across the fetch, so a second `load_next`
/// issued while one is pending sees `LoadingMore` and returns
/// [`LoadOutcome::Skipped`] without touching the network.
pub struct FeedController<F> {
    fetcher: F,
    state: Mutex<FeedState>,
    alive: AtomicBool,
    changes: watch::Sender<u64>,
}

impl<F: PageFetcher> FeedController<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            state: Mutex::new(FeedState::new()),
            alive: AtomicBool::new(true),
            changes: watch::channel(0).0,
        }
    }

    /// Receiver that changes whenever a load starts, finishes or fails, and
    /// on teardown. The value is a counter with no meaning of its own.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Copy of the current state for rendering.
    pub fn snapshot(&self) -> FeedState {
        self.lock().clone()
    }

    /// Load the first page, replacing any items.
    pub async fn load_initial(&self) -> Result<LoadOutcome, FetchError> {
        let ticket = self.begin(FeedState::begin_initial);
        self.run(ticket).await
    }

    /// Load and append the next page.
    pub async fn load_next(&self) -> Result<LoadOutcome, FetchError> {
        let ticket = self.begin(FeedState::begin_next);
        self.run(ticket).await
    }

    /// Replace the items with the next or previous page.
    pub async fn load_page(&self, direction: PageDirection) -> Result<LoadOutcome, FetchError> {
        let ticket = self.begin(|state| state.begin_page(direction));
        self.run(ticket).await
    }

    /// Mark the owning view as gone. Loads still in flight are discarded when
    /// they complete, and no new loads start.
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
        self.lock().reset();
        self.notify();
        tracing::debug!(feed = %self.fetcher.label(), "Feed torn down");
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn begin(&self, start: impl FnOnce(&mut FeedState) -> Option<LoadTicket>) -> Option<LoadTicket> {
        if !self.is_alive() {
            return None;
        }
        let ticket = start(&mut self.lock());
        if ticket.is_some() {
            self.notify();
        }
        ticket
    }

    async fn run(&self, ticket: Option<LoadTicket>) -> Result<LoadOutcome, FetchError> {
        let Some(ticket) = ticket else {
            return Ok(LoadOutcome::Skipped);
        };

        let result = self.fetcher.fetch_page(ticket.cursor()).await;

        if !self.is_alive() {
            tracing::debug!(feed = %self.fetcher.label(), "Discarding page for torn-down feed");
            return Ok(LoadOutcome::Discarded);
        }

        let outcome = self.lock().commit(ticket, result);
        self.notify();
        match &outcome {
            Ok(LoadOutcome::Applied { added }) => {
                tracing::debug!(feed = %self.fetcher.label(), added = added, "Page applied");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(feed = %self.fetcher.label(), error = %e, "Page load failed");
            }
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}
