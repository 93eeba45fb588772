//! Feed queries and the source abstraction both upstream clients implement.
//!
//! A [`FeedQuery`] is the identity of a list view's filter context: two
//! views showing the same query share records, and any change to it resets
//! the accumulator.

use std::future::Future;

use shared::{AiringStatus, AnimeFormat, CanonicalAnime, Season, Upstream};

use crate::api::CatalogError;
use crate::normalize::NormalizedPage;

/// What a list view shows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedQuery {
    /// Currently trending titles
    Trending,
    /// Titles of one broadcast season
    Seasonal { year: i32, season: Season },
    /// Top-ranked titles, optionally narrowed
    Top { filter: Option<TopFilter> },
    /// Free-text search and/or filters
    Search(SearchQuery),
}

impl FeedQuery {
    /// Build a search query with trimmed text and order-independent genres
    pub fn search(filters: SearchFilters) -> Self {
        FeedQuery::Search(SearchQuery(filters.normalized()))
    }

    /// Stable key used to build cache keys
    pub fn cache_key(&self) -> String {
        match self {
            FeedQuery::Trending => "trending".to_string(),
            FeedQuery::Seasonal { year, season } => format!("seasonal_{}_{}", year, season),
            FeedQuery::Top { filter } => match filter {
                Some(filter) => format!("top_{}", filter.jikan_value()),
                None => "top_all".to_string(),
            },
            FeedQuery::Search(search) => {
                let filters = search.filters();
                let mut parts = vec!["search".to_string()];
                if let Some(query) = &filters.query {
                    parts.push(format!("q={}", urlencoding::encode(&query.to_lowercase())));
                }
                if !filters.genres.is_empty() {
                    let genres: Vec<String> = filters
                        .genres
                        .iter()
                        .map(|g| urlencoding::encode(&g.to_lowercase()).into_owned())
                        .collect();
                    parts.push(format!("g={}", genres.join("+")));
                }
                if let Some(year) = filters.year {
                    parts.push(format!("y={}", year));
                }
                if let Some(season) = filters.season {
                    parts.push(format!("s={}", season));
                }
                if let Some(format) = filters.format {
                    parts.push(format!("f={}", format));
                }
                if let Some(status) = filters.status {
                    parts.push(format!("st={}", status));
                }
                parts.join("_")
            }
        }
    }
}

impl std::fmt::Display for FeedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// Narrowing of the top-ranked list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopFilter {
    Airing,
    Upcoming,
    ByPopularity,
    Favorite,
}

impl TopFilter {
    /// Value of the REST `filter` query parameter
    pub fn jikan_value(&self) -> &'static str {
        match self {
            TopFilter::Airing => "airing",
            TopFilter::Upcoming => "upcoming",
            TopFilter::ByPopularity => "bypopularity",
            TopFilter::Favorite => "favorite",
        }
    }
}

impl std::str::FromStr for TopFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "airing" => Ok(TopFilter::Airing),
            "upcoming" => Ok(TopFilter::Upcoming),
            "bypopularity" | "popularity" => Ok(TopFilter::ByPopularity),
            "favorite" | "favorites" => Ok(TopFilter::Favorite),
            _ => Err(anyhow::anyhow!("Invalid top filter: {}", s)),
        }
    }
}

/// Search text plus the genre/year/season/format/status selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub season: Option<Season>,
    pub format: Option<AnimeFormat>,
    pub status: Option<AiringStatus>,
}

/// Search filters in canonical form. Only [`FeedQuery::search`] builds one,
/// so equal selections always compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery(SearchFilters);

impl SearchQuery {
    pub fn filters(&self) -> &SearchFilters {
        &self.0
    }
}

impl SearchFilters {
    fn normalized(mut self) -> Self {
        self.query = self
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        self.genres = self
            .genres
            .into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        self.genres.sort_by_key(|g| g.to_lowercase());
        self.genres.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        self
    }
}

/// An upstream able to serve feed pages and single records, already
/// normalized into canonical records.
///
/// `Ok(None)` means the upstream answered without usable data ("no result"),
/// which is distinct from a failed request.
pub trait CatalogSource: Send + Sync {
    fn upstream(&self) -> Upstream;

    fn fetch_page(
        &self,
        query: &FeedQuery,
        page: u32,
    ) -> impl Future<Output = Result<Option<NormalizedPage>, CatalogError>> + Send;

    fn fetch_anime(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<CanonicalAnime>, CatalogError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_identity_ignores_genre_order_and_whitespace() {
        let a = FeedQuery::search(SearchFilters {
            query: Some("  frieren ".to_string()),
            genres: vec!["Drama".to_string(), "Adventure".to_string()],
            ..Default::default()
        });
        let b = FeedQuery::search(SearchFilters {
            query: Some("frieren".to_string()),
            genres: vec!["adventure".to_string(), "Drama".to_string(), "drama".to_string()],
            ..Default::default()
        });

        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "search_q=frieren_g=adventure+drama");
    }

    #[test]
    fn test_blank_search_text_is_dropped() {
        let query = FeedQuery::search(SearchFilters {
            query: Some("   ".to_string()),
            year: Some(2023),
            season: Some(Season::Fall),
            ..Default::default()
        });

        match &query {
            FeedQuery::Search(search) => assert_eq!(search.filters().query, None),
            other => panic!("unexpected query: {other:?}"),
        }
        assert_eq!(query.cache_key(), "search_y=2023_s=fall");
    }

    #[test]
    fn test_search_cache_keys_do_not_collide() {
        let search = |text: &str| {
            FeedQuery::search(SearchFilters {
                query: Some(text.to_string()),
                ..Default::default()
            })
            .cache_key()
        };
        assert_ne!(search("re:zero"), search("re zero"));
        assert_ne!(search("re:zero"), search("re_zero"));
        assert_eq!(search("re zero"), "search_q=re%20zero");

        let text_only = search("a_g=b");
        let with_genre = FeedQuery::search(SearchFilters {
            query: Some("a".to_string()),
            genres: vec!["b".to_string()],
            ..Default::default()
        })
        .cache_key();
        assert_ne!(text_only, with_genre);

        let one_genre = FeedQuery::search(SearchFilters {
            genres: vec!["sci+fi".to_string()],
            ..Default::default()
        })
        .cache_key();
        let two_genres = FeedQuery::search(SearchFilters {
            genres: vec!["sci".to_string(), "fi".to_string()],
            ..Default::default()
        })
        .cache_key();
        assert_ne!(one_genre, two_genres);
    }

    #[test]
    fn test_search_variant_is_always_normalized() {
        let query = FeedQuery::search(SearchFilters {
            query: Some(" frieren ".to_string()),
            genres: vec!["Drama".to_string(), "Adventure".to_string()],
            ..Default::default()
        });
        let FeedQuery::Search(search) = &query else {
            panic!("unexpected query: {query:?}");
        };
        assert_eq!(search.filters().query.as_deref(), Some("frieren"));
        assert_eq!(search.filters().genres, vec!["Adventure", "Drama"]);
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(FeedQuery::Trending.cache_key(), "trending");
        assert_eq!(
            FeedQuery::Seasonal {
                year: 2024,
                season: Season::Spring
            }
            .cache_key(),
            "seasonal_2024_spring"
        );
        assert_eq!(FeedQuery::Top { filter: None }.cache_key(), "top_all");
        assert_eq!(
            FeedQuery::Top {
                filter: Some(TopFilter::ByPopularity)
            }
            .cache_key(),
            "top_bypopularity"
        );
    }

    #[test]
    fn test_top_filter_parse() {
        assert_eq!("Airing".parse::<TopFilter>().unwrap(), TopFilter::Airing);
        assert_eq!("popularity".parse::<TopFilter>().unwrap(), TopFilter::ByPopularity);
        assert!("newest".parse::<TopFilter>().is_err());
    }
}
