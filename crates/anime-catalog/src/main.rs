//! Anime catalog CLI application.

use anime_catalog::{
    AniListClient, CatalogSource, FeedPhase, FeedQuery, FeedView, InfiniteFeed, JikanClient,
    ResponseCache, SearchFilters, TopFilter,
};
use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use shared::{AiringStatus, AnimeFormat, CanonicalAnime, Config, Season, Upstream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Upstream to query (anilist or jikan)
    #[arg(short, long, default_value = "anilist")]
    source: Upstream,

    /// Maximum number of pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: u32,

    /// Print records as JSON
    #[arg(long)]
    json: bool,

    /// Bypass the response cache
    #[arg(long)]
    no_cache: bool,

    /// Clear cache before running
    #[arg(long)]
    clear_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Currently trending titles
    Trending,
    /// Top-ranked titles
    Top {
        /// airing, upcoming, bypopularity or favorite
        #[arg(long)]
        filter: Option<TopFilter>,
    },
    /// Titles of one broadcast season (defaults to the current one)
    Seasonal {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        season: Option<Season>,
    },
    /// Search by text and/or filters
    Search {
        query: Option<String>,
        #[arg(long = "genre")]
        genres: Vec<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        season: Option<Season>,
        #[arg(long)]
        format: Option<AnimeFormat>,
        #[arg(long)]
        status: Option<AiringStatus>,
    },
    /// One title by its upstream id
    Anime { id: u64 },
}

impl Command {
    /// Feed query for list commands; `None` for single-record lookups
    fn feed_query(&self) -> Option<FeedQuery> {
        let query = match self {
            Command::Trending => FeedQuery::Trending,
            Command::Top { filter } => FeedQuery::Top { filter: *filter },
            Command::Seasonal { year, season } => {
                let today = chrono::Utc::now().date_naive();
                FeedQuery::Seasonal {
                    year: year.unwrap_or(today.year()),
                    season: season.unwrap_or_else(|| Season::for_month(today.month())),
                }
            }
            Command::Search {
                query,
                genres,
                year,
                season,
                format,
                status,
            } => FeedQuery::search(SearchFilters {
                query: query.clone(),
                genres: genres.clone(),
                year: *year,
                season: *season,
                format: *format,
                status: *status,
            }),
            Command::Anime { .. } => return None,
        };
        Some(query)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config = shared::LogConfig::from_config(&config, "anime-catalog")?;
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Anime catalog starting");
    info!(config_file = %args.config.display(), source = %args.source, "Loaded configuration");

    // Initialize cache
    let cache = ResponseCache::new(
        config.cache_dir(),
        config.cache.enabled && !args.no_cache,
        config.cache.expiration_seconds.map(Duration::from_secs),
    )
    .context("Failed to initialize cache")?;

    if args.clear_cache {
        info!("Clearing cache");
        cache.clear().context("Failed to clear cache")?;
    }

    let cache_stats = cache.stats().context("Failed to get cache stats")?;
    info!(
        cached_files = cache_stats.total_files,
        cache_size_kb = cache_stats.total_size_bytes / 1_000,
        "Cache statistics"
    );
    let cache = Arc::new(cache);

    match args.source {
        Upstream::AniList => {
            let client = AniListClient::new(&config.graphql, config.graphql_token(), &config.feed, cache)
                .context("Failed to create GraphQL client")?;
            run(Arc::new(client), &args).await
        }
        Upstream::Jikan => {
            let client = JikanClient::new(&config.rest, &config.feed, cache)
                .context("Failed to create REST client")?;
            run(Arc::new(client), &args).await
        }
    }
}

async fn run<S: CatalogSource>(source: Arc<S>, args: &Args) -> Result<()> {
    let Some(query) = args.command.feed_query() else {
        if let Command::Anime { id } = args.command {
            return show_anime(source.as_ref(), id, args.json).await;
        }
        return Ok(());
    };

    info!(query = %query, pages = args.pages, "Loading feed");
    let feed = InfiniteFeed::new(source);
    feed.set_query(query).await;
    let view = feed.load_pages(args.pages.max(1)).await;

    print_records(&view.records, args.json)?;
    report(&view);

    match &view.error {
        Some(e) => Err(anyhow::anyhow!("Feed stopped on error: {}", e)),
        None => Ok(()),
    }
}

async fn show_anime<S: CatalogSource>(source: &S, id: u64, json: bool) -> Result<()> {
    let anime = source
        .fetch_anime(id)
        .await
        .with_context(|| format!("Failed to fetch anime {} from {}", id, source.upstream()))?;

    match anime {
        Some(anime) if json => println!("{}", serde_json::to_string_pretty(&anime)?),
        Some(anime) => {
            println!("{}", record_line(0, &anime));
            if let Some(synopsis) = &anime.synopsis {
                println!();
                println!("{}", synopsis);
            }
        }
        None => warn!(id, "No such anime"),
    }
    Ok(())
}

fn print_records(records: &[CanonicalAnime], json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(records).context("Failed to serialize records")?
        );
        return Ok(());
    }

    for (index, anime) in records.iter().enumerate() {
        println!("{}", record_line(index + 1, anime));
    }
    Ok(())
}

fn record_line(position: usize, anime: &CanonicalAnime) -> String {
    let score = anime
        .score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "-".to_string());
    let episodes = anime
        .episodes
        .map(|e| e.to_string())
        .unwrap_or_else(|| "?".to_string());
    let prefix = if position > 0 {
        format!("{:>4}. ", position)
    } else {
        String::new()
    };

    format!(
        "{}[{}] {} ({}, {} eps, {}) score {} | {}",
        prefix, anime.id, anime.title, anime.format, episodes, anime.airing_status, score, anime.aired_display
    )
}

fn report(view: &FeedView) {
    let state = match view.phase {
        FeedPhase::Exhausted { .. } => "no more data",
        FeedPhase::Error { .. } => "error",
        _ if view.has_more => "more available",
        _ => "idle",
    };
    info!(
        records = view.records.len(),
        total = view.pagination.as_ref().and_then(|p| p.total_items),
        phase = ?view.phase,
        state,
        "Feed finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_command() {
        let args = Args::try_parse_from([
            "anime-catalog",
            "--source",
            "jikan",
            "--pages",
            "3",
            "search",
            "frieren",
            "--genre",
            "Drama",
            "--genre",
            "Adventure",
            "--format",
            "tv",
        ])
        .unwrap();

        assert_eq!(args.source, Upstream::Jikan);
        assert_eq!(args.pages, 3);
        assert_eq!(
            args.command.feed_query().unwrap().cache_key(),
            "search_q=frieren_g=adventure+drama_f=tv"
        );
    }

    #[test]
    fn test_seasonal_defaults_to_current_season() {
        let args = Args::try_parse_from(["anime-catalog", "seasonal", "--year", "2022"]).unwrap();
        match args.command.feed_query().unwrap() {
            FeedQuery::Seasonal { year, .. } => assert_eq!(year, 2022),
            other => panic!("unexpected query: {other:?}"),
        }
    }

    #[test]
    fn test_anime_command_has_no_feed() {
        let args = Args::try_parse_from(["anime-catalog", "anime", "5114"]).unwrap();
        assert!(args.command.feed_query().is_none());
        assert_eq!(args.source, Upstream::AniList);
    }

    #[test]
    fn test_top_filter_parses() {
        let args = Args::try_parse_from(["anime-catalog", "top", "--filter", "bypopularity"]).unwrap();
        assert_eq!(
            args.command.feed_query(),
            Some(FeedQuery::Top {
                filter: Some(TopFilter::ByPopularity)
            })
        );
    }
}
