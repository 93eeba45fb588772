//! Infinite-scroll pagination state for one list view.
//!
//! The accumulator never performs I/O. It hands out [`FetchRequest`]s when a
//! fetch may begin and takes the settled result back through
//! [`PaginationAccumulator::apply`]. Every request carries the
//! [`ContextToken`] of the filter context it was issued for; a result whose
//! context has since been reset is dropped.

use std::sync::Arc;

use shared::{CanonicalAnime, PaginationDescriptor};
use tracing::{debug, warn};

use crate::api::CatalogError;
use crate::dedupe::merge_unique;
use crate::normalize::NormalizedPage;
use crate::source::FeedQuery;

/// Identity of one filter context; changes on every reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(u64);

/// A page fetch the caller should perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: ContextToken,
    pub query: FeedQuery,
    pub page: u32,
}

/// What applying a settled fetch did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Page merged; `duplicates` records were already present
    Merged { added: usize, duplicates: usize },
    /// Upstream returned no usable page; the feed ends without error
    Exhausted,
    /// Fetch failed; previous records kept
    Failed,
    /// Result belongs to a superseded context or request and was ignored
    Stale,
}

/// Observable state of the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading { page: u32 },
    Accumulating { page: u32 },
    Exhausted { page: u32 },
    Error { page: u32 },
}

/// Snapshot a list view renders from
#[derive(Debug, Clone)]
pub struct FeedView {
    pub records: Vec<CanonicalAnime>,
    pub pagination: Option<PaginationDescriptor>,
    pub phase: FeedPhase,
    pub has_more: bool,
    /// A fetch is in flight and nothing has been shown yet
    pub is_loading: bool,
    /// A fetch is in flight
    pub is_fetching: bool,
    pub error: Option<Arc<CatalogError>>,
}

#[derive(Debug, Default)]
pub struct PaginationAccumulator {
    query: Option<FeedQuery>,
    generation: u64,
    records: Vec<CanonicalAnime>,
    /// Last page merged; 0 before the first one
    page: u32,
    pagination: Option<PaginationDescriptor>,
    in_flight: Option<FetchRequest>,
    error: Option<Arc<CatalogError>>,
    exhausted: bool,
}

impl PaginationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> Option<&FeedQuery> {
        self.query.as_ref()
    }

    pub fn token(&self) -> ContextToken {
        ContextToken(self.generation)
    }

    /// Switch to `query`. Resets and returns `true` when it differs from the
    /// current one; an identical query keeps the accumulated state.
    pub fn set_query(&mut self, query: FeedQuery) -> bool {
        if self.query.as_ref() == Some(&query) {
            return false;
        }
        debug!(query = %query, "Filter context changed, resetting feed");
        self.query = Some(query);
        self.reset();
        true
    }

    /// Back to `Idle` with an empty collection under a new context token.
    /// A fetch still in flight becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.records.clear();
        self.page = 0;
        self.pagination = None;
        self.in_flight = None;
        self.error = None;
        self.exhausted = false;
    }

    /// Visibility trigger: the next page to fetch, if a fetch may start now
    pub fn request_next(&mut self, network_online: bool) -> Option<FetchRequest> {
        if !network_online || self.error.is_some() || !self.has_more() {
            return None;
        }
        self.issue()
    }

    /// Re-issue the failed page. Only valid from the error state.
    pub fn retry(&mut self) -> Option<FetchRequest> {
        self.error.as_ref()?;
        self.error = None;
        self.issue()
    }

    fn issue(&mut self) -> Option<FetchRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let query = self.query.clone()?;
        let request = FetchRequest {
            token: self.token(),
            query,
            page: self.page + 1,
        };
        self.in_flight = Some(request.clone());
        Some(request)
    }

    /// Settle `request` with the fetch result
    pub fn apply(
        &mut self,
        request: &FetchRequest,
        result: Result<Option<NormalizedPage>, CatalogError>,
    ) -> ApplyOutcome {
        if request.token != self.token() || self.in_flight.as_ref() != Some(request) {
            debug!(
                page = request.page,
                query = %request.query,
                "Dropping result from a superseded request"
            );
            return ApplyOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Err(e) => {
                warn!(page = request.page, query = %request.query, "Page fetch failed: {}", e);
                self.error = Some(Arc::new(e));
                ApplyOutcome::Failed
            }
            Ok(None) => {
                debug!(page = request.page, "Upstream returned no page, feed exhausted");
                self.exhausted = true;
                ApplyOutcome::Exhausted
            }
            Ok(Some(page)) => {
                let merged = merge_unique(&self.records, &page.records);
                let added = merged.len() - self.records.len();
                let duplicates = page.records.len() - added;
                self.records = merged;
                self.page = request.page;
                self.exhausted = !page.pagination.has_more();
                self.pagination = Some(page.pagination);

                debug!(
                    page = request.page,
                    added,
                    duplicates,
                    total = self.records.len(),
                    "Merged page"
                );
                ApplyOutcome::Merged { added, duplicates }
            }
        }
    }

    pub fn phase(&self) -> FeedPhase {
        if let Some(request) = &self.in_flight {
            return FeedPhase::Loading { page: request.page };
        }
        if self.error.is_some() {
            return FeedPhase::Error { page: self.page + 1 };
        }
        if self.exhausted {
            return FeedPhase::Exhausted { page: self.page };
        }
        if self.page == 0 {
            return FeedPhase::Idle;
        }
        FeedPhase::Accumulating { page: self.page }
    }

    pub fn records(&self) -> &[CanonicalAnime] {
        &self.records
    }

    /// Whether another page may exist. True before the first page.
    pub fn has_more(&self) -> bool {
        !self.exhausted
            && self
                .pagination
                .as_ref()
                .map_or(true, PaginationDescriptor::has_more)
    }

    /// Last merged page
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn error(&self) -> Option<&Arc<CatalogError>> {
        self.error.as_ref()
    }

    pub fn view(&self) -> FeedView {
        let is_fetching = self.in_flight.is_some();
        FeedView {
            records: self.records.clone(),
            pagination: self.pagination.clone(),
            phase: self.phase(),
            has_more: self.has_more(),
            is_loading: is_fetching && self.records.is_empty(),
            is_fetching,
            error: self.error.clone(),
        }
    }
}
