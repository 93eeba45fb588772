//! GraphQL documents and variable builders for the AniList catalog.
//!
//! Every list view goes through one paged browse document; unset filters are
//! left out of the variables so the upstream ignores them.

use serde_json::{json, Map, Value};

use crate::source::{FeedQuery, TopFilter};

const MEDIA_FIELDS: &str = r#"
fragment mediaFields on Media {
    id
    idMal
    title { romaji english native userPreferred }
    format
    status
    episodes
    duration
    averageScore
    meanScore
    popularity
    favourites
    genres
    isAdult
    studios(isMain: true) { nodes { name } }
    coverImage { medium large extraLarge }
    description(asHtml: false)
    startDate { year month day }
    endDate { year month day }
    season
    seasonYear
}
"#;

const BROWSE_BODY: &str = r#"
query (
    $page: Int,
    $perPage: Int,
    $search: String,
    $genres: [String],
    $season: MediaSeason,
    $seasonYear: Int,
    $format: MediaFormat,
    $status: MediaStatus,
    $sort: [MediaSort]
) {
    Page(page: $page, perPage: $perPage) {
        pageInfo { total perPage currentPage lastPage hasNextPage }
        media(
            type: ANIME,
            isAdult: false,
            search: $search,
            genre_in: $genres,
            season: $season,
            seasonYear: $seasonYear,
            format: $format,
            status: $status,
            sort: $sort
        ) {
            ...mediaFields
        }
    }
}
"#;

const MEDIA_BODY: &str = r#"
query ($id: Int) {
    Media(id: $id, type: ANIME) {
        ...mediaFields
    }
}
"#;

/// Paged browse document
pub fn browse_document() -> String {
    format!("{BROWSE_BODY}{MEDIA_FIELDS}")
}

/// Single media document
pub fn media_document() -> String {
    format!("{MEDIA_BODY}{MEDIA_FIELDS}")
}

/// Variables for the browse document
pub fn browse_variables(query: &FeedQuery, page: u32, per_page: u32) -> Value {
    let mut vars = Map::new();
    vars.insert("page".into(), json!(page));
    vars.insert("perPage".into(), json!(per_page));

    match query {
        FeedQuery::Trending => {
            vars.insert("sort".into(), json!(["TRENDING_DESC", "POPULARITY_DESC"]));
        }
        FeedQuery::Seasonal { year, season } => {
            vars.insert("season".into(), json!(season.anilist_value()));
            vars.insert("seasonYear".into(), json!(year));
            vars.insert("sort".into(), json!(["POPULARITY_DESC"]));
        }
        FeedQuery::Top { filter } => {
            let sort = match filter {
                Some(TopFilter::ByPopularity) => "POPULARITY_DESC",
                Some(TopFilter::Favorite) => "FAVOURITES_DESC",
                Some(TopFilter::Upcoming) => "POPULARITY_DESC",
                Some(TopFilter::Airing) | None => "SCORE_DESC",
            };
            vars.insert("sort".into(), json!([sort]));
            match filter {
                Some(TopFilter::Airing) => {
                    vars.insert("status".into(), json!("RELEASING"));
                }
                Some(TopFilter::Upcoming) => {
                    vars.insert("status".into(), json!("NOT_YET_RELEASED"));
                }
                _ => {}
            }
        }
        FeedQuery::Search(search) => {
            let filters = search.filters();
            if let Some(search) = &filters.query {
                vars.insert("search".into(), json!(search));
            }
            if !filters.genres.is_empty() {
                vars.insert("genres".into(), json!(filters.genres));
            }
            if let Some(year) = filters.year {
                vars.insert("seasonYear".into(), json!(year));
            }
            if let Some(season) = filters.season {
                vars.insert("season".into(), json!(season.anilist_value()));
            }
            if let Some(format) = filters.format.and_then(|f| f.anilist_value()) {
                vars.insert("format".into(), json!(format));
            }
            if let Some(status) = filters.status.and_then(|s| s.anilist_value()) {
                vars.insert("status".into(), json!(status));
            }
            let sort = if filters.query.is_some() {
                "SEARCH_MATCH"
            } else {
                "POPULARITY_DESC"
            };
            vars.insert("sort".into(), json!([sort]));
        }
    }

    Value::Object(vars)
}

/// Variables for the single media document
pub fn media_variables(id: u64) -> Value {
    json!({ "id": id })
}
