//! Jikan API v4 response types.
//!
//! These types represent the JSON responses from the REST catalog. Every
//! field the upstream may omit is optional so that a partial payload still
//! decodes and the normalizer decides what to do with it.

use serde::{Deserialize, Serialize};

/// Generic pagination wrapper (`data[]` + `pagination`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Option<Vec<T>>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// One page of anime list results
pub type AnimePage = PaginatedResponse<JikanAnime>;

/// Simple data wrapper (without pagination)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub last_visible_page: Option<u32>,
    #[serde(default)]
    pub has_next_page: Option<bool>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub items: Option<PaginationItems>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// Genre/Theme/Demographic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryItem {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// Full anime details response (`/anime/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeDetailsResponse {
    #[serde(default)]
    pub data: Option<JikanAnime>,
}

/// Anime entry as returned by list and detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JikanAnime {
    pub mal_id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Option<AnimeImages>,

    // Titles
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,

    // Type and status
    #[serde(rename = "type", default)]
    pub anime_type: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,

    // Dates
    #[serde(default)]
    pub aired: Option<Aired>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,

    // Scores and rankings
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub scored_by: Option<u32>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub members: Option<u32>,
    #[serde(default)]
    pub favorites: Option<u32>,

    #[serde(default)]
    pub synopsis: Option<String>,

    // Season
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub studios: Vec<MalEntity>,

    // Genres, themes, demographics
    #[serde(default)]
    pub genres: Vec<MalEntity>,
    #[serde(default)]
    pub explicit_genres: Vec<MalEntity>,
    #[serde(default)]
    pub themes: Vec<MalEntity>,
    #[serde(default)]
    pub demographics: Vec<MalEntity>,
}

/// Anime images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeImages {
    #[serde(default)]
    pub jpg: Option<ImageSet>,
    #[serde(default)]
    pub webp: Option<ImageSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub small_image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
}

/// Aired dates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aired {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub prop: Option<AiredProp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiredProp {
    #[serde(default)]
    pub from: Option<DateProp>,
    #[serde(default)]
    pub to: Option<DateProp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateProp {
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// MAL entity (genre, studio, producer, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalEntity {
    pub mal_id: u32,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}
