//! Async driver wiring a [`CatalogSource`] to a [`PaginationAccumulator`].
//!
//! The accumulator lock is only held to hand out a request and to apply its
//! result, never across the upstream call. A reset that happens while a
//! fetch is in flight therefore turns that fetch's result stale.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::accumulator::{ApplyOutcome, FeedView, FetchRequest, PaginationAccumulator};
use crate::source::{CatalogSource, FeedQuery};

/// One list view fed page by page from an upstream
pub struct InfiniteFeed<S> {
    source: Arc<S>,
    state: Mutex<PaginationAccumulator>,
}

impl<S: CatalogSource> InfiniteFeed<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            state: Mutex::new(PaginationAccumulator::new()),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Switch the filter context; returns whether the feed was reset
    pub async fn set_query(&self, query: FeedQuery) -> bool {
        self.state.lock().await.set_query(query)
    }

    /// Visibility trigger. `None` when the gate refused to start a fetch.
    pub async fn load_next(&self, network_online: bool) -> Option<ApplyOutcome> {
        let request = self.state.lock().await.request_next(network_online)?;
        Some(self.run(request).await)
    }

    /// Re-fetch the page that failed. `None` outside the error state.
    pub async fn retry(&self) -> Option<ApplyOutcome> {
        let request = self.state.lock().await.retry()?;
        info!(page = request.page, query = %request.query, "Retrying failed page");
        Some(self.run(request).await)
    }

    /// Keep loading until `max_pages` pages were fetched, the feed is
    /// exhausted, or a fetch fails
    pub async fn load_pages(&self, max_pages: u32) -> FeedView {
        for _ in 0..max_pages {
            match self.load_next(true).await {
                Some(ApplyOutcome::Merged { .. }) => continue,
                _ => break,
            }
        }
        self.view().await
    }

    pub async fn view(&self) -> FeedView {
        self.state.lock().await.view()
    }

    async fn run(&self, request: FetchRequest) -> ApplyOutcome {
        debug!(
            upstream = %self.source.upstream(),
            page = request.page,
            query = %request.query,
            "Fetching page"
        );
        let result = self.source.fetch_page(&request.query, request.page).await;
        self.state.lock().await.apply(&request, result)
    }
}
