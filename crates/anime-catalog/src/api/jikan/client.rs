//! REST catalog client (Jikan v4).
//!
//! Every call goes through the client's own [`RequestQueue`], so requests
//! run one at a time with a cooldown between them and 429s are waited out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use shared::{CanonicalAnime, FeedConfig, RestConfig, Season, Upstream};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::types::{AnimeDetailsResponse, AnimePage, CategoryItem, DataResponse};
use crate::api::error::CatalogError;
use crate::api::http::{build_client, read_json};
use crate::api::request_queue::{QueueConfig, RequestQueue};
use crate::api::retry::RetryPolicy;
use crate::cache::ResponseCache;
use crate::dedupe::dedupe;
use crate::normalize::{normalize, normalize_rest_detail, ContentFilter, NormalizedPage, UpstreamPayload};
use crate::source::{CatalogSource, FeedQuery, SearchFilters};

/// Largest `limit` the list endpoints accept
pub const MAX_PAGE_SIZE: u32 = 25;

/// Path and query string of one REST call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub path: String,
    pub params: Vec<(&'static str, String)>,
}

pub struct JikanClient {
    http: reqwest::Client,
    base_url: String,
    queue: RequestQueue,
    cache: Arc<ResponseCache>,
    filter: ContentFilter,
    per_page: u32,
    /// Lowercased genre name to id, fetched on first use
    genre_ids: OnceCell<HashMap<String, u32>>,
}

impl JikanClient {
    pub fn new(rest: &RestConfig, feed: &FeedConfig, cache: Arc<ResponseCache>) -> anyhow::Result<Self> {
        let queue = RequestQueue::new(QueueConfig {
            cooldown: Duration::from_millis(rest.cooldown_ms),
            retry: RetryPolicy::new(rest.max_retries, Duration::from_millis(rest.retry_delay_ms)),
        });

        info!(
            base_url = %rest.base_url,
            cooldown_ms = rest.cooldown_ms,
            max_retries = rest.max_retries,
            "REST client initialized"
        );

        Ok(Self {
            http: build_client(Duration::from_secs(rest.timeout_secs))?,
            base_url: rest.base_url.trim_end_matches('/').to_string(),
            queue,
            cache,
            filter: ContentFilter::new(feed.excluded_genres.iter().cloned()),
            per_page: feed.per_page.clamp(1, MAX_PAGE_SIZE),
            genre_ids: OnceCell::new(),
        })
    }

    /// Requests waiting in the queue
    pub fn pending_requests(&self) -> usize {
        self.queue.pending()
    }

    async fn get<T>(&self, label: &str, request: RestRequest) -> Result<T, CatalogError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let http = self.http.clone();
        let url = format!("{}{}", self.base_url, request.path);
        let params = request.params;

        self.queue
            .enqueue(label, move || {
                debug!(url = %url, "Making API request");
                let builder = http.get(&url).query(&params);
                async move {
                    let response = builder.send().await?;
                    read_json::<T>(response).await
                }
            })
            .await
    }

    /// All anime genres
    pub async fn genres(&self) -> Result<Vec<CategoryItem>, CatalogError> {
        info!("Fetching anime genres");
        let request = RestRequest {
            path: "/genres/anime".to_string(),
            params: Vec::new(),
        };
        let response: DataResponse<CategoryItem> = self.get("genres", request).await?;
        Ok(response.data)
    }

    async fn genre_lookup(&self) -> Result<&HashMap<String, u32>, CatalogError> {
        self.genre_ids
            .get_or_try_init(|| async {
                let genres = self.genres().await?;
                Ok::<_, CatalogError>(
                    genres
                        .into_iter()
                        .map(|genre| (genre.name.to_lowercase(), genre.mal_id))
                        .collect(),
                )
            })
            .await
    }

    async fn resolve_genres(&self, names: &[String]) -> Result<Vec<u32>, CatalogError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let lookup = self.genre_lookup().await?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match lookup.get(&name.to_lowercase()) {
                Some(id) => ids.push(*id),
                None => warn!(genre = %name, "Unknown genre, ignoring filter"),
            }
        }
        Ok(ids)
    }

    /// One raw list page
    pub async fn fetch_raw_page(&self, query: &FeedQuery, page: u32) -> Result<AnimePage, CatalogError> {
        let key = format!("{}_{}_p{}", Upstream::Jikan, query.cache_key(), page);
        if let Some(cached) = self.cache.lookup::<AnimePage>(&key) {
            return Ok(cached);
        }

        let genre_ids = match query {
            FeedQuery::Search(search) => self.resolve_genres(&search.filters().genres).await?,
            _ => Vec::new(),
        };
        let request = page_request(query, page, self.per_page, &genre_ids);
        let payload: AnimePage = self.get(&key, request).await?;

        self.cache.store(&key, &payload);
        Ok(payload)
    }
}

impl CatalogSource for JikanClient {
    fn upstream(&self) -> Upstream {
        Upstream::Jikan
    }

    async fn fetch_page(&self, query: &FeedQuery, page: u32) -> Result<Option<NormalizedPage>, CatalogError> {
        let payload = UpstreamPayload::Rest(self.fetch_raw_page(query, page).await?);

        Ok(normalize(&payload, &self.filter).map(|mut normalized| {
            normalized.records = dedupe(normalized.records);
            normalized
        }))
    }

    async fn fetch_anime(&self, id: u64) -> Result<Option<CanonicalAnime>, CatalogError> {
        let key = format!("{}_anime_{}", Upstream::Jikan, id);
        let response = match self.cache.lookup::<AnimeDetailsResponse>(&key) {
            Some(cached) => cached,
            None => {
                let request = RestRequest {
                    path: format!("/anime/{}/full", id),
                    params: Vec::new(),
                };
                match self.get::<AnimeDetailsResponse>(&key, request).await {
                    Ok(response) => {
                        self.cache.store(&key, &response);
                        response
                    }
                    Err(CatalogError::Api { status: 404, .. }) => {
                        debug!(id, "Anime not found");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        Ok(normalize_rest_detail(&response, &self.filter))
    }
}

/// Endpoint and parameters for one page of `query`. `genre_ids` are the
/// already resolved ids of a search's genre names.
pub fn page_request(query: &FeedQuery, page: u32, per_page: u32, genre_ids: &[u32]) -> RestRequest {
    let mut params = vec![("page", page.to_string()), ("limit", per_page.to_string())];

    let path = match query {
        FeedQuery::Trending => {
            params.push(("filter", "airing".to_string()));
            "/top/anime".to_string()
        }
        FeedQuery::Top { filter } => {
            if let Some(filter) = filter {
                params.push(("filter", filter.jikan_value().to_string()));
            }
            "/top/anime".to_string()
        }
        FeedQuery::Seasonal { year, season } => {
            params.push(("sfw", "true".to_string()));
            format!("/seasons/{}/{}", year, season.jikan_value())
        }
        FeedQuery::Search(search) => {
            push_search_params(&mut params, search.filters(), genre_ids);
            "/anime".to_string()
        }
    };

    RestRequest { path, params }
}

fn push_search_params(params: &mut Vec<(&'static str, String)>, filters: &SearchFilters, genre_ids: &[u32]) {
    if let Some(text) = &filters.query {
        params.push(("q", text.clone()));
    }
    if !genre_ids.is_empty() {
        let joined = genre_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        params.push(("genres", joined));
    }
    if let Some(format) = filters.format.and_then(|f| f.jikan_value()) {
        params.push(("type", format.to_string()));
    }
    if let Some(status) = filters.status.and_then(|s| s.jikan_value()) {
        params.push(("status", status.to_string()));
    }

    match (filters.year, filters.season) {
        (Some(year), season) => {
            let (start, end) = date_range(year, season);
            params.push(("start_date", start));
            params.push(("end_date", end));
        }
        (None, Some(season)) => {
            debug!(season = %season, "Season filter without a year is not supported by the REST search");
        }
        (None, None) => {}
    }

    params.push(("sfw", "true".to_string()));
    if filters.query.is_none() {
        params.push(("order_by", "members".to_string()));
        params.push(("sort", "desc".to_string()));
    }
}

/// First and last day of `year`, or of the season's months within it
fn date_range(year: i32, season: Option<Season>) -> (String, String) {
    let (first_month, last_month) = season.map_or((1, 12), |s| s.months());
    let last_day = match last_month {
        6 | 9 => 30,
        _ => 31,
    };
    (
        format!("{:04}-{:02}-01", year, first_month),
        format!("{:04}-{:02}-{:02}", year, last_month, last_day),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TopFilter;
    use shared::{AiringStatus, AnimeFormat, Config};

    fn param<'a>(request: &'a RestRequest, name: &str) -> Option<&'a str> {
        request
            .params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_trending_uses_airing_top_list() {
        let request = page_request(&FeedQuery::Trending, 2, 20, &[]);
        assert_eq!(request.path, "/top/anime");
        assert_eq!(param(&request, "filter"), Some("airing"));
        assert_eq!(param(&request, "page"), Some("2"));
        assert_eq!(param(&request, "limit"), Some("20"));
    }

    #[test]
    fn test_top_filter() {
        let request = page_request(&FeedQuery::Top { filter: None }, 1, 25, &[]);
        assert_eq!(param(&request, "filter"), None);

        let query = FeedQuery::Top {
            filter: Some(TopFilter::Favorite),
        };
        let request = page_request(&query, 1, 25, &[]);
        assert_eq!(param(&request, "filter"), Some("favorite"));
    }

    #[test]
    fn test_seasonal_path() {
        let query = FeedQuery::Seasonal {
            year: 2024,
            season: Season::Spring,
        };
        let request = page_request(&query, 3, 25, &[]);
        assert_eq!(request.path, "/seasons/2024/spring");
        assert_eq!(param(&request, "page"), Some("3"));
    }

    #[test]
    fn test_search_params() {
        let query = FeedQuery::search(SearchFilters {
            query: Some("monster".to_string()),
            genres: vec!["Drama".to_string(), "Mystery".to_string()],
            year: Some(2004),
            season: Some(Season::Spring),
            format: Some(AnimeFormat::Tv),
            status: Some(AiringStatus::Finished),
        });
        let request = page_request(&query, 1, 25, &[8, 7]);

        assert_eq!(request.path, "/anime");
        assert_eq!(param(&request, "q"), Some("monster"));
        assert_eq!(param(&request, "genres"), Some("8,7"));
        assert_eq!(param(&request, "type"), Some("tv"));
        assert_eq!(param(&request, "status"), Some("complete"));
        assert_eq!(param(&request, "start_date"), Some("2004-04-01"));
        assert_eq!(param(&request, "end_date"), Some("2004-06-30"));
        assert_eq!(param(&request, "sfw"), Some("true"));
        assert_eq!(param(&request, "order_by"), None);
    }

    #[test]
    fn test_filter_only_search_orders_by_members() {
        let query = FeedQuery::search(SearchFilters {
            year: Some(1998),
            ..Default::default()
        });
        let request = page_request(&query, 1, 25, &[]);

        assert_eq!(param(&request, "q"), None);
        assert_eq!(param(&request, "start_date"), Some("1998-01-01"));
        assert_eq!(param(&request, "end_date"), Some("1998-12-31"));
        assert_eq!(param(&request, "order_by"), Some("members"));
        assert_eq!(param(&request, "sort"), Some("desc"));
    }

    #[test]
    fn test_season_without_year_is_dropped() {
        let query = FeedQuery::search(SearchFilters {
            season: Some(Season::Winter),
            ..Default::default()
        });
        let request = page_request(&query, 1, 25, &[]);
        assert_eq!(param(&request, "start_date"), None);
    }

    #[test]
    fn test_date_ranges() {
        assert_eq!(
            date_range(2023, Some(Season::Fall)),
            ("2023-10-01".to_string(), "2023-12-31".to_string())
        );
        assert_eq!(
            date_range(2023, Some(Season::Summer)),
            ("2023-07-01".to_string(), "2023-09-30".to_string())
        );
    }

    #[tokio::test]
    async fn test_client_creation() {
        let config = Config::default();
        let client = JikanClient::new(&config.rest, &config.feed, Arc::new(ResponseCache::disabled()));

        let client = client.unwrap();
        assert_eq!(client.upstream(), Upstream::Jikan);
        assert_eq!(client.pending_requests(), 0);
        assert!(client.per_page <= MAX_PAGE_SIZE);
    }
}
