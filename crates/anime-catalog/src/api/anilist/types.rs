use serde::{Deserialize, Serialize};

// ── GraphQL response wrappers ────────────────────────────────────

/// `{ data, errors }` envelope. `data` may be absent or null when the query
/// failed upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlErrorMessage {
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

/// Response to the paged browse query
pub type PageEnvelope = GraphQlResponse<PageData>;

/// Response to the single-media query
pub type MediaEnvelope = GraphQlResponse<MediaData>;

// ── Page / media queries ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData {
    #[serde(rename = "Page", default)]
    pub page: Option<MediaPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    #[serde(default)]
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub has_next_page: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaData {
    #[serde(rename = "Media", default)]
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: u64,
    #[serde(default)]
    pub id_mal: Option<u64>,
    #[serde(default)]
    pub title: Option<MediaTitle>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    /// Minutes per episode
    #[serde(default)]
    pub duration: Option<u32>,
    /// Weighted score on the 0-100 scale
    #[serde(default)]
    pub average_score: Option<u32>,
    #[serde(default)]
    pub mean_score: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub favourites: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub is_adult: Option<bool>,
    #[serde(default)]
    pub studios: Option<StudioConnection>,
    #[serde(default)]
    pub cover_image: Option<CoverImage>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<FuzzyDate>,
    #[serde(default)]
    pub end_date: Option<FuzzyDate>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub season_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTitle {
    #[serde(default)]
    pub romaji: Option<String>,
    #[serde(default)]
    pub english: Option<String>,
    #[serde(default)]
    pub native: Option<String>,
    #[serde(default)]
    pub user_preferred: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub extra_large: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConnection {
    #[serde(default)]
    pub nodes: Vec<StudioNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioNode {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FuzzyDate {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_page_envelope() {
        let raw = json!({
            "data": {
                "Page": {
                    "pageInfo": { "total": 5000, "perPage": 20, "currentPage": 1, "lastPage": 250, "hasNextPage": true },
                    "media": [{
                        "id": 21,
                        "idMal": 21,
                        "title": { "romaji": "ONE PIECE", "english": "ONE PIECE", "native": null, "userPreferred": "ONE PIECE" },
                        "format": "TV",
                        "status": "RELEASING",
                        "averageScore": 88,
                        "isAdult": false,
                        "coverImage": { "medium": "m.jpg", "large": "l.jpg", "extraLarge": "xl.jpg" },
                        "startDate": { "year": 1999, "month": 10, "day": 20 },
                        "endDate": { "year": null, "month": null, "day": null }
                    }]
                }
            }
        });

        let envelope: PageEnvelope = serde_json::from_value(raw).unwrap();
        let page = envelope.data.unwrap().page.unwrap();
        assert_eq!(page.page_info.unwrap().last_page, Some(250));
        let media = &page.media[0];
        assert_eq!(media.average_score, Some(88));
        assert_eq!(media.cover_image.as_ref().unwrap().extra_large.as_deref(), Some("xl.jpg"));
        assert_eq!(
            media.title.as_ref().unwrap().user_preferred.as_deref(),
            Some("ONE PIECE")
        );
        assert!(media.genres.is_empty());
    }

    #[test]
    fn test_decode_error_envelope() {
        let raw = json!({
            "data": null,
            "errors": [{ "message": "Too Many Requests.", "status": 429 }]
        });

        let envelope: MediaEnvelope = serde_json::from_value(raw).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors[0].status, Some(429));
    }

    #[test]
    fn test_decode_envelope_without_data_field() {
        let raw = json!({ "errors": [{ "message": "Not Found." }] });

        let envelope: PageEnvelope = serde_json::from_value(raw).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors[0].status, None);
    }
}
