//! Data models for the catalog data layer.
//!
//! This module defines the canonical anime record every view consumes, the
//! pagination descriptor, and the vocabularies (status, format, season) with
//! their per-upstream mapping tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// External catalog a record or payload came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Upstream {
    /// GraphQL catalog (AniList)
    AniList,
    /// REST catalog (Jikan / MyAnimeList)
    Jikan,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::AniList => write!(f, "anilist"),
            Upstream::Jikan => write!(f, "jikan"),
        }
    }
}

impl std::str::FromStr for Upstream {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anilist" | "graphql" => Ok(Upstream::AniList),
            "jikan" | "mal" | "rest" => Ok(Upstream::Jikan),
            _ => Err(anyhow::anyhow!("Invalid upstream: {}", s)),
        }
    }
}

/// Anime record in the shape all views consume, independent of upstream.
///
/// `id` is the upstream-native identifier and is only unique within one
/// upstream's result set; `origin` records which one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAnime {
    pub id: u64,
    pub origin: Upstream,

    // Titles
    pub title: String,
    pub title_english: Option<String>,
    pub title_native: Option<String>,

    // Type and status, raw upstream vocabulary plus canonical mapping
    #[serde(rename = "type")]
    pub kind: String,
    pub format: AnimeFormat,
    pub status: String,
    pub airing_status: AiringStatus,

    pub episodes: Option<u32>,
    pub duration_minutes: Option<u32>,

    // Scores and rankings
    /// Always on the 0-10 scale
    pub score: Option<f64>,
    pub popularity: Option<u32>,
    pub favorites: Option<u32>,

    // Dates
    pub aired_from: Option<NaiveDate>,
    pub aired_to: Option<NaiveDate>,
    pub aired_display: String,
    pub season: Option<Season>,
    pub year: Option<i32>,

    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub images: AnimeImages,
    pub synopsis: Option<String>,
}

/// Cover image URLs by size
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnimeImages {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

/// Page metadata, reduced to what the infinite scroll needs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDescriptor {
    pub current_page: u32,
    pub last_page: Option<u32>,
    pub has_next_page: Option<bool>,
    pub total_items: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationDescriptor {
    /// Whether another page can be requested after this one.
    ///
    /// The upstream's own `hasNextPage` wins when reported; otherwise the
    /// page counters decide.
    pub fn has_more(&self) -> bool {
        match self.has_next_page {
            Some(has_next) => has_next,
            None => self
                .last_page
                .is_some_and(|last| self.current_page < last),
        }
    }
}

/// A date where month and day may be unknown (`{year, month?, day?}`)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    pub fn new(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Self {
        Self { year, month, day }
    }

    /// `YYYY-MM-DD`, missing month/day defaulting to `01`. `None` without a year.
    pub fn display(&self) -> Option<String> {
        let year = self.year?;
        Some(format!(
            "{:04}-{:02}-{:02}",
            year,
            self.month.unwrap_or(1),
            self.day.unwrap_or(1)
        ))
    }

    /// Calendar date with the same defaults; `None` without a year or when
    /// the triple is not a real date.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }
}

/// Canonical airing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AiringStatus {
    Airing,
    Finished,
    NotYetAired,
    Cancelled,
    Hiatus,
    Unknown,
}

impl AiringStatus {
    /// Map the GraphQL `MediaStatus` vocabulary
    pub fn from_anilist(raw: &str) -> Self {
        match raw {
            "RELEASING" => AiringStatus::Airing,
            "FINISHED" => AiringStatus::Finished,
            "NOT_YET_RELEASED" => AiringStatus::NotYetAired,
            "CANCELLED" => AiringStatus::Cancelled,
            "HIATUS" => AiringStatus::Hiatus,
            _ => AiringStatus::Unknown,
        }
    }

    /// Map the REST status strings
    pub fn from_jikan(raw: &str) -> Self {
        match raw {
            "Currently Airing" => AiringStatus::Airing,
            "Finished Airing" => AiringStatus::Finished,
            "Not yet aired" => AiringStatus::NotYetAired,
            _ => AiringStatus::Unknown,
        }
    }

    /// Value for the GraphQL `status` filter
    pub fn anilist_value(&self) -> Option<&'static str> {
        match self {
            AiringStatus::Airing => Some("RELEASING"),
            AiringStatus::Finished => Some("FINISHED"),
            AiringStatus::NotYetAired => Some("NOT_YET_RELEASED"),
            AiringStatus::Cancelled => Some("CANCELLED"),
            AiringStatus::Hiatus => Some("HIATUS"),
            AiringStatus::Unknown => None,
        }
    }

    /// Value for the REST `status` query parameter
    pub fn jikan_value(&self) -> Option<&'static str> {
        match self {
            AiringStatus::Airing => Some("airing"),
            AiringStatus::Finished => Some("complete"),
            AiringStatus::NotYetAired => Some("upcoming"),
            _ => None,
        }
    }
}

impl std::fmt::Display for AiringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiringStatus::Airing => write!(f, "airing"),
            AiringStatus::Finished => write!(f, "finished"),
            AiringStatus::NotYetAired => write!(f, "upcoming"),
            AiringStatus::Cancelled => write!(f, "cancelled"),
            AiringStatus::Hiatus => write!(f, "hiatus"),
            AiringStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for AiringStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "airing" | "releasing" => Ok(AiringStatus::Airing),
            "finished" | "complete" => Ok(AiringStatus::Finished),
            "upcoming" | "not_yet_aired" => Ok(AiringStatus::NotYetAired),
            "cancelled" => Ok(AiringStatus::Cancelled),
            "hiatus" => Ok(AiringStatus::Hiatus),
            _ => Err(anyhow::anyhow!("Invalid airing status: {}", s)),
        }
    }
}

/// Canonical media format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnimeFormat {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
    Unknown,
}

impl AnimeFormat {
    /// Map the GraphQL `MediaFormat` vocabulary
    pub fn from_anilist(raw: &str) -> Self {
        match raw {
            "TV" => AnimeFormat::Tv,
            "TV_SHORT" => AnimeFormat::TvShort,
            "MOVIE" => AnimeFormat::Movie,
            "SPECIAL" => AnimeFormat::Special,
            "OVA" => AnimeFormat::Ova,
            "ONA" => AnimeFormat::Ona,
            "MUSIC" => AnimeFormat::Music,
            _ => AnimeFormat::Unknown,
        }
    }

    /// Map the REST `type` strings
    pub fn from_jikan(raw: &str) -> Self {
        match raw {
            "TV" => AnimeFormat::Tv,
            "Movie" => AnimeFormat::Movie,
            "Special" | "TV Special" => AnimeFormat::Special,
            "OVA" => AnimeFormat::Ova,
            "ONA" => AnimeFormat::Ona,
            "Music" => AnimeFormat::Music,
            _ => AnimeFormat::Unknown,
        }
    }

    /// Value for the GraphQL `format` filter
    pub fn anilist_value(&self) -> Option<&'static str> {
        match self {
            AnimeFormat::Tv => Some("TV"),
            AnimeFormat::TvShort => Some("TV_SHORT"),
            AnimeFormat::Movie => Some("MOVIE"),
            AnimeFormat::Special => Some("SPECIAL"),
            AnimeFormat::Ova => Some("OVA"),
            AnimeFormat::Ona => Some("ONA"),
            AnimeFormat::Music => Some("MUSIC"),
            AnimeFormat::Unknown => None,
        }
    }

    /// Value for the REST `type` query parameter
    pub fn jikan_value(&self) -> Option<&'static str> {
        match self {
            AnimeFormat::Tv => Some("tv"),
            AnimeFormat::Movie => Some("movie"),
            AnimeFormat::Special => Some("special"),
            AnimeFormat::Ova => Some("ova"),
            AnimeFormat::Ona => Some("ona"),
            AnimeFormat::Music => Some("music"),
            AnimeFormat::TvShort | AnimeFormat::Unknown => None,
        }
    }
}

impl std::fmt::Display for AnimeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimeFormat::Tv => write!(f, "tv"),
            AnimeFormat::TvShort => write!(f, "tv_short"),
            AnimeFormat::Movie => write!(f, "movie"),
            AnimeFormat::Special => write!(f, "special"),
            AnimeFormat::Ova => write!(f, "ova"),
            AnimeFormat::Ona => write!(f, "ona"),
            AnimeFormat::Music => write!(f, "music"),
            AnimeFormat::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for AnimeFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "tv" => Ok(AnimeFormat::Tv),
            "tv_short" => Ok(AnimeFormat::TvShort),
            "movie" => Ok(AnimeFormat::Movie),
            "special" => Ok(AnimeFormat::Special),
            "ova" => Ok(AnimeFormat::Ova),
            "ona" => Ok(AnimeFormat::Ona),
            "music" => Ok(AnimeFormat::Music),
            _ => Err(anyhow::anyhow!("Invalid anime format: {}", s)),
        }
    }
}

/// Broadcast season (quarter of the year)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn anilist_value(&self) -> &'static str {
        match self {
            Season::Winter => "WINTER",
            Season::Spring => "SPRING",
            Season::Summer => "SUMMER",
            Season::Fall => "FALL",
        }
    }

    pub fn jikan_value(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }

    /// First and last month covered by the season
    pub fn months(&self) -> (u32, u32) {
        match self {
            Season::Winter => (1, 3),
            Season::Spring => (4, 6),
            Season::Summer => (7, 9),
            Season::Fall => (10, 12),
        }
    }

    /// Season containing calendar month `month` (1-12)
    pub fn for_month(month: u32) -> Self {
        match month {
            1..=3 => Season::Winter,
            4..=6 => Season::Spring,
            7..=9 => Season::Summer,
            _ => Season::Fall,
        }
    }

    /// Parse either upstream's spelling; anything else is `None`
    pub fn parse_upstream(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.jikan_value())
    }
}

impl std::str::FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" | "autumn" => Ok(Season::Fall),
            _ => Err(anyhow::anyhow!("Invalid season: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_date_defaults() {
        let date = PartialDate::new(Some(2023), Some(4), None);
        assert_eq!(date.display().as_deref(), Some("2023-04-01"));
        assert_eq!(date.to_naive_date(), NaiveDate::from_ymd_opt(2023, 4, 1));

        let year_only = PartialDate::new(Some(1998), None, None);
        assert_eq!(year_only.display().as_deref(), Some("1998-01-01"));
    }

    #[test]
    fn test_partial_date_without_year() {
        let date = PartialDate::new(None, Some(4), Some(3));
        assert_eq!(date.display(), None);
        assert_eq!(date.to_naive_date(), None);
    }

    #[test]
    fn test_partial_date_invalid_calendar_day() {
        let date = PartialDate::new(Some(2023), Some(2), Some(30));
        assert_eq!(date.display().as_deref(), Some("2023-02-30"));
        assert_eq!(date.to_naive_date(), None);
    }

    #[test]
    fn test_has_more_prefers_has_next_page() {
        let pagination = PaginationDescriptor {
            current_page: 3,
            last_page: Some(10),
            has_next_page: Some(false),
            ..Default::default()
        };
        assert!(!pagination.has_more());

        let pagination = PaginationDescriptor {
            current_page: 3,
            last_page: Some(10),
            has_next_page: None,
            ..Default::default()
        };
        assert!(pagination.has_more());

        let pagination = PaginationDescriptor {
            current_page: 10,
            last_page: Some(10),
            has_next_page: None,
            ..Default::default()
        };
        assert!(!pagination.has_more());
    }

    #[test]
    fn test_has_more_without_any_hint() {
        let pagination = PaginationDescriptor {
            current_page: 1,
            ..Default::default()
        };
        assert!(!pagination.has_more());
    }

    #[test]
    fn test_status_mapping_tables() {
        assert_eq!(AiringStatus::from_anilist("RELEASING"), AiringStatus::Airing);
        assert_eq!(AiringStatus::from_jikan("Currently Airing"), AiringStatus::Airing);
        assert_eq!(AiringStatus::from_anilist("FINISHED"), AiringStatus::Finished);
        assert_eq!(AiringStatus::from_jikan("Finished Airing"), AiringStatus::Finished);
        assert_eq!(AiringStatus::from_jikan("Not yet aired"), AiringStatus::NotYetAired);
        assert_eq!(AiringStatus::from_anilist("SOMETHING_NEW"), AiringStatus::Unknown);

        assert_eq!(AiringStatus::Finished.jikan_value(), Some("complete"));
        assert_eq!(AiringStatus::Hiatus.jikan_value(), None);
        assert_eq!(AiringStatus::Hiatus.anilist_value(), Some("HIATUS"));
    }

    #[test]
    fn test_format_mapping_tables() {
        assert_eq!(AnimeFormat::from_anilist("TV_SHORT"), AnimeFormat::TvShort);
        assert_eq!(AnimeFormat::from_jikan("Movie"), AnimeFormat::Movie);
        assert_eq!(AnimeFormat::from_jikan("TV Special"), AnimeFormat::Special);
        assert_eq!(AnimeFormat::from_jikan("CM"), AnimeFormat::Unknown);

        assert_eq!(AnimeFormat::Ova.anilist_value(), Some("OVA"));
        assert_eq!(AnimeFormat::Ova.jikan_value(), Some("ova"));
        assert_eq!(AnimeFormat::TvShort.jikan_value(), None);
    }

    #[test]
    fn test_parse_from_cli_spelling() {
        assert_eq!("tv-short".parse::<AnimeFormat>().unwrap(), AnimeFormat::TvShort);
        assert_eq!("upcoming".parse::<AiringStatus>().unwrap(), AiringStatus::NotYetAired);
        assert_eq!("FALL".parse::<Season>().unwrap(), Season::Fall);
        assert_eq!("mal".parse::<Upstream>().unwrap(), Upstream::Jikan);
        assert!("monsoon".parse::<Season>().is_err());
    }

    #[test]
    fn test_season_months() {
        assert_eq!(Season::Winter.months(), (1, 3));
        assert_eq!(Season::Fall.months(), (10, 12));
        assert_eq!(Season::for_month(5), Season::Spring);
        assert_eq!(Season::for_month(12), Season::Fall);
        assert_eq!(Season::parse_upstream("SPRING"), Some(Season::Spring));
        assert_eq!(Season::parse_upstream(""), None);
    }

    #[test]
    fn test_canonical_record_uses_camel_case() {
        let anime = CanonicalAnime {
            id: 1,
            origin: Upstream::AniList,
            title: "Cowboy Bebop".to_string(),
            title_english: Some("Cowboy Bebop".to_string()),
            title_native: None,
            kind: "TV".to_string(),
            format: AnimeFormat::Tv,
            status: "FINISHED".to_string(),
            airing_status: AiringStatus::Finished,
            episodes: Some(26),
            duration_minutes: Some(24),
            score: Some(8.6),
            popularity: None,
            favorites: None,
            aired_from: None,
            aired_to: None,
            aired_display: "Not available".to_string(),
            season: None,
            year: None,
            genres: vec![],
            studios: vec![],
            images: AnimeImages::default(),
            synopsis: None,
        };

        let json = serde_json::to_value(&anime).unwrap();
        assert_eq!(json["titleEnglish"], "Cowboy Bebop");
        assert_eq!(json["type"], "TV");
        assert_eq!(json["airingStatus"], "finished");
        assert_eq!(json["origin"], "anilist");
    }
}
