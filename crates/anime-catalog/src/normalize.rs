//! Response normalization.
//!
//! Converts one upstream page (or one detail payload) into canonical records
//! plus a pagination descriptor, so nothing downstream branches on which
//! upstream produced the data. Everything here is pure: no I/O, inputs are
//! only borrowed.

use shared::{
    AiringStatus, AnimeFormat, AnimeImages, CanonicalAnime, PaginationDescriptor, PartialDate,
    Season, Upstream,
};
use tracing::debug;

use crate::api::anilist::types::{FuzzyDate, Media, MediaEnvelope, PageEnvelope};
use crate::api::jikan::types::{AnimeDetailsResponse, AnimePage, DateProp, JikanAnime};

/// Display string used when the start date is unknown
pub const NOT_AVAILABLE: &str = "Not available";

/// Raw page as received from one of the upstreams
#[derive(Debug, Clone)]
pub enum UpstreamPayload {
    GraphQl(PageEnvelope),
    Rest(AnimePage),
}

impl UpstreamPayload {
    pub fn upstream(&self) -> Upstream {
        match self {
            UpstreamPayload::GraphQl(_) => Upstream::AniList,
            UpstreamPayload::Rest(_) => Upstream::Jikan,
        }
    }
}

/// Canonical records of one page, in upstream order, with its pagination
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub records: Vec<CanonicalAnime>,
    pub pagination: PaginationDescriptor,
}

/// Mature-content exclusion applied during normalization
#[derive(Debug, Clone)]
pub struct ContentFilter {
    excluded_genres: Vec<String>,
}

impl ContentFilter {
    pub fn new<I, S>(excluded_genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_genres: excluded_genres
                .into_iter()
                .map(|g| g.into().to_lowercase())
                .collect(),
        }
    }

    /// Whether any of the genres is excluded (case-insensitive)
    pub fn excludes<'a>(&self, genres: impl IntoIterator<Item = &'a str>) -> bool {
        genres
            .into_iter()
            .any(|genre| self.excluded_genres.iter().any(|ex| genre.eq_ignore_ascii_case(ex)))
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(["Hentai"])
    }
}

/// Normalize one upstream page. `None` when the payload carries no page.
pub fn normalize(payload: &UpstreamPayload, filter: &ContentFilter) -> Option<NormalizedPage> {
    match payload {
        UpstreamPayload::GraphQl(envelope) => normalize_graphql_page(envelope, filter),
        UpstreamPayload::Rest(page) => normalize_rest_page(page, filter),
    }
}

/// Normalize a single-media GraphQL response
pub fn normalize_graphql_detail(
    envelope: &MediaEnvelope,
    filter: &ContentFilter,
) -> Option<CanonicalAnime> {
    let media = envelope.data.as_ref()?.media.as_ref()?;
    normalize_graphql_media(media, filter)
}

/// Normalize a single-anime REST response
pub fn normalize_rest_detail(
    response: &AnimeDetailsResponse,
    filter: &ContentFilter,
) -> Option<CanonicalAnime> {
    normalize_rest_anime(response.data.as_ref()?, filter)
}

fn normalize_graphql_page(envelope: &PageEnvelope, filter: &ContentFilter) -> Option<NormalizedPage> {
    let page = envelope.data.as_ref()?.page.as_ref()?;

    let records: Vec<_> = page
        .media
        .iter()
        .filter_map(|media| normalize_graphql_media(media, filter))
        .collect();
    log_dropped(Upstream::AniList, page.media.len(), records.len());

    let info = page.page_info.clone().unwrap_or_default();
    Some(NormalizedPage {
        records,
        pagination: PaginationDescriptor {
            current_page: info.current_page.unwrap_or(1),
            last_page: info.last_page,
            has_next_page: info.has_next_page,
            total_items: info.total,
            per_page: info.per_page,
        },
    })
}

fn normalize_rest_page(page: &AnimePage, filter: &ContentFilter) -> Option<NormalizedPage> {
    let data = page.data.as_ref()?;

    let records: Vec<_> = data
        .iter()
        .filter_map(|anime| normalize_rest_anime(anime, filter))
        .collect();
    log_dropped(Upstream::Jikan, data.len(), records.len());

    let pagination = match &page.pagination {
        Some(p) => PaginationDescriptor {
            current_page: p.current_page.unwrap_or(1),
            last_page: p.last_visible_page,
            has_next_page: p.has_next_page,
            total_items: p.items.as_ref().map(|items| items.total),
            per_page: p.items.as_ref().map(|items| items.per_page),
        },
        None => PaginationDescriptor {
            current_page: 1,
            has_next_page: Some(false),
            ..Default::default()
        },
    };

    Some(NormalizedPage {
        records,
        pagination,
    })
}

fn log_dropped(upstream: Upstream, received: usize, kept: usize) {
    if kept < received {
        debug!(
            upstream = %upstream,
            dropped = received - kept,
            "Dropped excluded records during normalization"
        );
    }
}

/// Normalize one GraphQL media record; `None` when it is excluded content
pub fn normalize_graphql_media(media: &Media, filter: &ContentFilter) -> Option<CanonicalAnime> {
    if media.is_adult == Some(true) || filter.excludes(media.genres.iter().map(String::as_str)) {
        return None;
    }

    let title = media.title.clone().unwrap_or_default();
    let format = media.format.clone().unwrap_or_default();
    let status = media.status.clone().unwrap_or_default();
    let start = media.start_date.map(fuzzy_to_partial);
    let images = media
        .cover_image
        .as_ref()
        .map(|cover| AnimeImages {
            small: cover.medium.clone(),
            medium: cover.large.clone(),
            large: cover.extra_large.clone().or_else(|| cover.large.clone()),
        })
        .unwrap_or_default();

    Some(build_record(RecordParts {
        id: media.id,
        origin: Upstream::AniList,
        titles: TitleSet {
            user_preferred: title.user_preferred,
            english: title.english,
            romaji: title.romaji,
            native: title.native,
        },
        format: AnimeFormat::from_anilist(&format),
        kind: format,
        airing_status: AiringStatus::from_anilist(&status),
        status,
        episodes: media.episodes,
        duration_minutes: media.duration,
        score: media
            .average_score
            .or(media.mean_score)
            .map(graphql_score),
        popularity: media.popularity,
        favorites: media.favourites,
        start,
        end: media.end_date.map(fuzzy_to_partial),
        season: media.season.as_deref().and_then(Season::parse_upstream),
        year: media.season_year.or(start.and_then(|d| d.year)),
        genres: media.genres.clone(),
        studios: media
            .studios
            .as_ref()
            .map(|s| s.nodes.iter().map(|n| n.name.clone()).collect())
            .unwrap_or_default(),
        images,
        synopsis: media.description.as_deref().and_then(clean_synopsis),
    }))
}

/// Normalize one REST anime record; `None` when it is excluded content
pub fn normalize_rest_anime(anime: &JikanAnime, filter: &ContentFilter) -> Option<CanonicalAnime> {
    let tagged = anime
        .genres
        .iter()
        .chain(anime.explicit_genres.iter())
        .map(|g| g.name.as_str());
    let restricted = anime
        .rating
        .as_deref()
        .is_some_and(|rating| rating.starts_with("Rx"));
    if restricted || filter.excludes(tagged) {
        return None;
    }

    let kind = anime.anime_type.clone().unwrap_or_default();
    let status = anime.status.clone().unwrap_or_default();
    let prop = anime.aired.as_ref().and_then(|aired| aired.prop.as_ref());
    let start = prop.and_then(|p| p.from.as_ref()).map(date_prop_to_partial);
    let end = prop.and_then(|p| p.to.as_ref()).map(date_prop_to_partial);
    let jpg = anime.images.as_ref().and_then(|images| {
        images
            .jpg
            .as_ref()
            .or(images.webp.as_ref())
    });

    Some(build_record(RecordParts {
        id: anime.mal_id,
        origin: Upstream::Jikan,
        titles: TitleSet {
            user_preferred: None,
            english: anime.title_english.clone(),
            romaji: anime.title.clone(),
            native: anime.title_japanese.clone(),
        },
        format: AnimeFormat::from_jikan(&kind),
        kind,
        airing_status: AiringStatus::from_jikan(&status),
        status,
        episodes: anime.episodes,
        duration_minutes: anime.duration.as_deref().and_then(parse_duration_minutes),
        score: anime.score,
        popularity: anime.members,
        favorites: anime.favorites,
        start,
        end,
        season: anime.season.as_deref().and_then(Season::parse_upstream),
        year: anime.year.or(start.and_then(|d| d.year)),
        genres: anime.genres.iter().map(|g| g.name.clone()).collect(),
        studios: anime.studios.iter().map(|s| s.name.clone()).collect(),
        images: jpg
            .map(|set| AnimeImages {
                small: set.small_image_url.clone(),
                medium: set.image_url.clone(),
                large: set.large_image_url.clone(),
            })
            .unwrap_or_default(),
        synopsis: anime.synopsis.as_deref().and_then(clean_synopsis),
    }))
}

/// Title variants in the order they are considered
#[derive(Debug, Clone, Default)]
pub struct TitleSet {
    pub user_preferred: Option<String>,
    pub english: Option<String>,
    pub romaji: Option<String>,
    pub native: Option<String>,
}

/// Primary title: user-preferred, then English, then romaji, else empty
pub fn resolve_title(titles: &TitleSet) -> String {
    [&titles.user_preferred, &titles.english, &titles.romaji]
        .into_iter()
        .flatten()
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// 0-100 GraphQL score onto the canonical 0-10 scale
pub fn graphql_score(raw: u32) -> f64 {
    f64::from(raw) / 10.0
}

/// `"YYYY-MM-DD to YYYY-MM-DD"`, `"YYYY-MM-DD to ?"` without a usable end,
/// `"Not available"` without a start year
pub fn format_aired(start: Option<&PartialDate>, end: Option<&PartialDate>) -> String {
    let Some(from) = start.and_then(PartialDate::display) else {
        return NOT_AVAILABLE.to_string();
    };
    match end.and_then(PartialDate::display) {
        Some(to) => format!("{} to {}", from, to),
        None => format!("{} to ?", from),
    }
}

/// Minutes from REST duration strings (`"24 min per ep"`, `"1 hr 55 min"`,
/// `"30 sec"`). Sub-minute durations round up to one minute.
pub fn parse_duration_minutes(raw: &str) -> Option<u32> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut seconds = 0u32;
    let mut matched = false;

    for pair in tokens.windows(2) {
        let Ok(value) = pair[0].parse::<u32>() else {
            continue;
        };
        let unit = pair[1].trim_end_matches('.').to_ascii_lowercase();
        let factor = match unit.as_str() {
            "hr" | "hrs" | "hour" | "hours" => 3600,
            "min" | "mins" | "minute" | "minutes" => 60,
            "sec" | "secs" | "second" | "seconds" => 1,
            _ => continue,
        };
        seconds = value.checked_mul(factor)?.checked_add(seconds)?;
        matched = true;
    }

    if !matched || seconds == 0 {
        return None;
    }
    Some(seconds.div_ceil(60))
}

/// Strip markup and upstream attribution from a synopsis; `None` when empty
fn clean_synopsis(raw: &str) -> Option<String> {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    let mut tag = String::new();

    for c in raw.chars() {
        match c {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag.trim_start_matches('/').trim_end_matches('/').trim();
                if name.eq_ignore_ascii_case("br") {
                    text.push('\n');
                }
            }
            _ if in_tag => tag.push(c),
            _ => text.push(c),
        }
    }

    let text = text.replace("[Written by MAL Rewrite]", "");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn fuzzy_to_partial(date: FuzzyDate) -> PartialDate {
    PartialDate::new(date.year, date.month, date.day)
}

fn date_prop_to_partial(date: &DateProp) -> PartialDate {
    PartialDate::new(date.year, date.month, date.day)
}

/// Upstream-independent fields handed to the shared constructor
struct RecordParts {
    id: u64,
    origin: Upstream,
    titles: TitleSet,
    kind: String,
    format: AnimeFormat,
    status: String,
    airing_status: AiringStatus,
    episodes: Option<u32>,
    duration_minutes: Option<u32>,
    score: Option<f64>,
    popularity: Option<u32>,
    favorites: Option<u32>,
    start: Option<PartialDate>,
    end: Option<PartialDate>,
    season: Option<Season>,
    year: Option<i32>,
    genres: Vec<String>,
    studios: Vec<String>,
    images: AnimeImages,
    synopsis: Option<String>,
}

fn build_record(parts: RecordParts) -> CanonicalAnime {
    CanonicalAnime {
        id: parts.id,
        origin: parts.origin,
        title: resolve_title(&parts.titles),
        title_english: parts.titles.english,
        title_native: parts.titles.native,
        kind: parts.kind,
        format: parts.format,
        status: parts.status,
        airing_status: parts.airing_status,
        episodes: parts.episodes,
        duration_minutes: parts.duration_minutes,
        score: parts.score,
        popularity: parts.popularity,
        favorites: parts.favorites,
        aired_from: parts.start.and_then(|d| d.to_naive_date()),
        aired_to: parts.end.and_then(|d| d.to_naive_date()),
        aired_display: format_aired(parts.start.as_ref(), parts.end.as_ref()),
        season: parts.season,
        year: parts.year,
        genres: parts.genres,
        studios: parts.studios,
        images: parts.images,
        synopsis: parts.synopsis,
    }
}
