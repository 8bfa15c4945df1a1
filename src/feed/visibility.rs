//! Sentinel-driven automatic loading.
//!
//! The presentation layer owns the viewport and reports whether the sentinel
//! at the end of the list is near-visible. [`VisibilityLoader`] turns that
//! signal into at most one `load_next` per cursor, and
//! [`spawn_visibility_loader`] runs it as a background task bound to a
//! [`FeedController`].

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::pagination::{FeedController, FeedState, LoadOutcome, PageFetcher};

/// Distance in logical pixels around the viewport that still counts as visible.
pub const DEFAULT_PREFETCH_MARGIN_PX: f64 = 200.0;

/// Visible window of the scroll container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Scroll offset of the top edge
    pub offset: f64,
    pub height: f64,
}

/// Position of the end-of-list sentinel in the same coordinates as [`Viewport`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentinelBounds {
    pub top: f64,
    pub height: f64,
}

/// Whether any part of the sentinel lies within `margin` of the viewport.
/// Touching edges count as overlap.
pub fn is_near_visible(viewport: Viewport, sentinel: SentinelBounds, margin: f64) -> bool {
    let window_top = viewport.offset - margin;
    let window_bottom = viewport.offset + viewport.height + margin;
    let sentinel_bottom = sentinel.top + sentinel.height.max(0.0);
    sentinel.top <= window_bottom && sentinel_bottom >= window_top
}

// ============================================================================
// Trigger Logic
// ============================================================================

/// Decides when a visibility change should start a load.
///
/// A load fires when the sentinel is near-visible, the feed has a next cursor
/// and nothing is in flight. The cursor that fired is remembered so the
/// sentinel staying on screen (or flickering) cannot fire twice for it. The
/// memory is dropped when the sentinel leaves view, so a load that failed
/// is retried on the next approach.
#[derive(Debug, Clone, Default)]
pub struct VisibilityLoader {
    last_triggered: Option<String>,
}

impl VisibilityLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current signal and state; returns `true` if `load_next`
    /// should be issued now.
    pub fn observe(&mut self, near_visible: bool, state: &FeedState) -> bool {
        if !near_visible {
            self.last_triggered = None;
            return false;
        }
        if state.is_loading() {
            return false;
        }
        let Some(cursor) = state.cursor() else {
            return false;
        };
        if self.last_triggered.as_deref() == Some(cursor) {
            return false;
        }
        self.last_triggered = Some(cursor.to_string());
        true
    }

    /// Same as [`observe`](Self::observe), computing the signal from geometry.
    pub fn observe_bounds(
        &mut self,
        viewport: Viewport,
        sentinel: SentinelBounds,
        margin: f64,
        state: &FeedState,
    ) -> bool {
        self.observe(is_near_visible(viewport, sentinel, margin), state)
    }

    /// Forget the last fired cursor.
    pub fn forget(&mut self) {
        self.last_triggered = None;
    }
}

// ============================================================================
// Background Task
// ============================================================================

/// Owns the observation task. Dropping or releasing it stops observation.
#[derive(Debug)]
pub struct LoaderHandle {
    task: JoinHandle<()>,
}

impl LoaderHandle {
    /// Stop observing. Equivalent to dropping the handle.
    pub fn release(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch `visible` and load the next page of `feed` whenever the sentinel
/// comes near the viewport.
///
/// The trigger is re-evaluated when the signal changes and whenever the feed
/// state changes, so a cursor that appears while the sentinel is already on
/// screen (first page landing, another caller's load finishing, a short page)
/// still pulls the next page. The task ends when the sender is dropped or the
/// feed is torn down.
pub fn spawn_visibility_loader<F>(
    feed: Arc<FeedController<F>>,
    mut visible: watch::Receiver<bool>,
) -> LoaderHandle
where
    F: PageFetcher + 'static,
{
    let mut changes = feed.subscribe();
    let task = tokio::spawn(async move {
        let mut loader = VisibilityLoader::new();
        loop {
            if !feed.is_alive() {
                break;
            }
            // Mark seen before reading state so a later transition wakes us
            changes.borrow_and_update();
            let near_visible = *visible.borrow_and_update();

            if loader.observe(near_visible, &feed.snapshot()) {
                match feed.load_next().await {
                    Ok(LoadOutcome::Skipped) => loader.forget(),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "Automatic load failed; waiting for the sentinel to re-enter");
                    }
                }
                continue;
            }

            tokio::select! {
                signal = visible.changed() => {
                    if signal.is_err() {
                        break;
                    }
                }
                state = changes.changed() => {
                    if state.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Visibility loader stopped");
    });

    LoaderHandle { task }
}
