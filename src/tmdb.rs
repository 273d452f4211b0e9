use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::aggregate::normalize_title;
use crate::models::Film;
use crate::scraping::base;

const SEARCH_URL: &str = "https://api.themoviedb.org/3/search/movie";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const FUZZY_THRESHOLD: usize = 2;
// Kinonik links each film to its ticketing page.
const EVENT_PAGE_VENUE: &str = "kinonik";
const EVENT_PAGE_REFERER: &str = "https://www.zeffy.com";

static OG_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("og description selector")
});
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"19\d{2}|20\d{2}|2100").expect("valid year regex"));

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("maine-films/0.1")
        .timeout(Duration::from_secs(20))
        .build()
        .expect("failed to build tmdb client")
});

static CACHE: Lazy<Mutex<HashMap<String, Option<MovieInfo>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static REQUEST_QUEUE: Lazy<AsyncMutex<()>> = Lazy::new(|| AsyncMutex::new(()));
static LAST_REQUEST: Lazy<AsyncMutex<Option<Instant>>> = Lazy::new(|| AsyncMutex::new(None));

const RATE_LIMIT_WINDOW_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    pub poster: Option<String>,
    pub overview: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TmdbError {
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("overrides error: {0}")]
    Overrides(String),
}

/// Hand-maintained corrections for films the search gets wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilmOverride {
    pub year: Option<u32>,
    pub description: Option<String>,
    pub poster: Option<String>,
    /// Venue ids the override is limited to; empty means every venue.
    pub venues: Vec<String>,
}

impl FilmOverride {
    pub fn applies_to(&self, venue_id: Option<&str>) -> bool {
        self.venues.is_empty()
            || venue_id.is_some_and(|id| self.venues.iter().any(|venue| venue == id))
    }
}

/// Overrides keyed by normalized title.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: HashMap<String, FilmOverride>,
}

impl Overrides {
    pub fn from_map(raw: HashMap<String, FilmOverride>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(title, entry)| (normalize_title(&title), entry))
            .collect();
        Self { entries }
    }

    /// A missing file yields no overrides; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, TmdbError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| TmdbError::Overrides(format!("{}: {err}", path.display())))?;
        let raw: HashMap<String, FilmOverride> = serde_json::from_str(&text)
            .map_err(|err| TmdbError::Overrides(format!("{}: {err}", path.display())))?;
        Ok(Self::from_map(raw))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact normalized match first, otherwise the closest key within two edits.
    pub fn find(&self, title: &str) -> Option<&FilmOverride> {
        let key = normalize_title(title);
        if let Some(entry) = self.entries.get(&key) {
            return Some(entry);
        }
        self.entries
            .iter()
            .map(|(candidate, entry)| (levenshtein(&key, candidate), candidate, entry))
            .filter(|(distance, _, _)| *distance <= FUZZY_THRESHOLD)
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, _, entry)| entry)
    }
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current.push((previous[j + 1] + 1).min(current[j] + 1).min(substitution));
        }
        previous = current;
    }
    previous[b.len()]
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<MovieDoc>,
}

#[derive(Debug, Deserialize)]
struct MovieDoc {
    poster_path: Option<String>,
    overview: Option<String>,
}

/// The venue an override's `venues` list is checked against.
fn listing_venue(film: &Film) -> Option<&str> {
    film.first_venue_id()
        .map(|id| id.as_str())
        .or_else(|| film.film_urls.keys().next().map(String::as_str))
        .filter(|id| !id.is_empty())
}

/// Fills a film's missing poster and description from its override and
/// TMDb. Kinonik films without an override fall back to their event page.
/// Fields the film already has are left alone.
pub async fn enrich_film(
    film: Film,
    api_key: Option<&str>,
    overrides: &Overrides,
) -> Result<Film, TmdbError> {
    if film.poster_url().is_some() && !film.description_text().trim().is_empty() {
        return Ok(film);
    }

    let entry = overrides
        .find(&film.title)
        .filter(|entry| entry.applies_to(listing_venue(&film)))
        .cloned();
    let event_page = film
        .film_urls
        .get(EVENT_PAGE_VENUE)
        .filter(|url| !url.trim().is_empty())
        .cloned();

    match (entry, event_page) {
        (Some(entry), _) => enrich_from_override(film, api_key, &entry).await,
        (None, Some(url)) => {
            let hints = load_listing_hints(url).await;
            enrich_from_listing(film, api_key, hints).await
        }
        (None, None) => enrich_from_override(film, api_key, &FilmOverride::default()).await,
    }
}

async fn enrich_from_override(
    film: Film,
    api_key: Option<&str>,
    entry: &FilmOverride,
) -> Result<Film, TmdbError> {
    let found = match usable_key(api_key) {
        Some(key) => lookup_movie(key, &film.title, entry.year).await?,
        None => None,
    };
    let poster = found
        .as_ref()
        .and_then(|info| info.poster.clone())
        .or_else(|| entry.poster.clone());
    let description = found
        .and_then(|info| info.overview)
        .filter(|overview| !overview.trim().is_empty())
        .or_else(|| entry.description.clone());
    Ok(fill_missing(film, poster, description))
}

/// Without a release year on the page only its description is used.
async fn enrich_from_listing(
    film: Film,
    api_key: Option<&str>,
    hints: ListingHints,
) -> Result<Film, TmdbError> {
    let found = match (usable_key(api_key), hints.year) {
        (Some(key), Some(year)) => lookup_movie(key, &film.title, Some(year)).await?,
        _ => None,
    };
    let poster = found.as_ref().and_then(|info| info.poster.clone());
    let description = found
        .and_then(|info| info.overview)
        .filter(|overview| !overview.trim().is_empty())
        .or(hints.description);
    Ok(fill_missing(film, poster, description))
}

fn usable_key(api_key: Option<&str>) -> Option<&str> {
    api_key.map(str::trim).filter(|key| !key.is_empty())
}

fn fill_missing(mut film: Film, poster: Option<String>, description: Option<String>) -> Film {
    if film.poster_url().is_none() {
        if let Some(poster) = poster.filter(|poster| !poster.trim().is_empty()) {
            film.poster = Some(poster);
        }
    }
    if film.description_text().trim().is_empty() {
        if let Some(description) = description.filter(|text| !text.trim().is_empty()) {
            film.description = Some(description);
        }
    }
    film
}

/// What a venue's own event page says about a film.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingHints {
    pub year: Option<u32>,
    pub description: Option<String>,
}

/// Reads `og:description` and the first plausible release year in it.
pub fn listing_hints(html: &str, current_year: u32) -> ListingHints {
    let document = Html::parse_document(html);
    let description = document
        .select(&OG_DESCRIPTION_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string);
    let year = description
        .as_deref()
        .and_then(|text| release_year(text, current_year));
    ListingHints { year, description }
}

fn release_year(text: &str, current_year: u32) -> Option<u32> {
    YEAR_RE
        .find_iter(text)
        .filter_map(|found| found.as_str().parse::<u32>().ok())
        .find(|year| (1900..=current_year).contains(year))
}

fn fetch_listing_hints(url: &str) -> anyhow::Result<ListingHints> {
    let request = base::client().get(url).header("Referer", EVENT_PAGE_REFERER);
    let html = base::fetch_text(request, url)?;
    Ok(listing_hints(&html, Local::now().year().unsigned_abs()))
}

async fn load_listing_hints(url: String) -> ListingHints {
    let result = tokio::task::spawn_blocking(move || {
        fetch_listing_hints(&url).with_context(|| format!("event page {url}"))
    })
    .await;
    match result {
        Ok(Ok(hints)) => hints,
        Ok(Err(err)) => {
            warn!("{err:#}");
            ListingHints::default()
        }
        Err(err) => {
            warn!("event page task failed: {err}");
            ListingHints::default()
        }
    }
}

/// Enriches every film in order. A failed lookup is logged and the film
/// is kept as scraped.
pub async fn enrich_all(films: Vec<Film>, api_key: Option<&str>, overrides: &Overrides) -> Vec<Film> {
    let mut enriched = Vec::with_capacity(films.len());
    for film in films {
        let fallback = film.clone();
        match enrich_film(film, api_key, overrides).await {
            Ok(film) => enriched.push(film),
            Err(err) => {
                warn!("tmdb lookup failed for {:?}: {err}", fallback.title);
                enriched.push(fallback);
            }
        }
    }
    enriched
}

async fn lookup_movie(
    api_key: &str,
    title: &str,
    year: Option<u32>,
) -> Result<Option<MovieInfo>, TmdbError> {
    let key = match year {
        Some(year) => format!("{}|{year}", normalize_title(title)),
        None => normalize_title(title),
    };
    let cached = {
        let guard = CACHE
            .lock()
            .map_err(|err| TmdbError::Cache(err.to_string()))?;
        guard.get(&key).cloned()
    };
    if let Some(cached) = cached {
        return Ok(cached);
    }

    let mut url = Url::parse(SEARCH_URL).map_err(|err| TmdbError::Http(err.to_string()))?;
    url.query_pairs_mut()
        .append_pair("api_key", api_key)
        .append_pair("query", title)
        .append_pair("include_adult", "false")
        .append_pair("language", "en-US");
    if let Some(year) = year {
        url.query_pairs_mut().append_pair("year", &year.to_string());
    }

    let text = fetch_search_payload(url).await?;
    let info = parse_search(&text)?;
    debug!("tmdb {:?}: {}", title, if info.is_some() { "found" } else { "no match" });

    CACHE
        .lock()
        .map_err(|err| TmdbError::Cache(err.to_string()))?
        .insert(key, info.clone());
    Ok(info)
}

fn parse_search(text: &str) -> Result<Option<MovieInfo>, TmdbError> {
    let payload: SearchResponse =
        serde_json::from_str(text).map_err(|err| TmdbError::Parse(err.to_string()))?;
    Ok(payload.results.into_iter().next().map(|movie| MovieInfo {
        poster: movie
            .poster_path
            .filter(|path| !path.is_empty())
            .map(|path| format!("{POSTER_BASE}{path}")),
        overview: movie.overview.filter(|text| !text.trim().is_empty()),
    }))
}

async fn fetch_search_payload(url: Url) -> Result<String, TmdbError> {
    let _guard = REQUEST_QUEUE.lock().await;
    wait_for_rate_limit().await;

    let response = CLIENT
        .get(url)
        .send()
        .await
        .map_err(|err| TmdbError::Http(err.without_url().to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| TmdbError::Http(err.to_string()))?;

    if !status.is_success() {
        return Err(TmdbError::Http(format!("status {}: {}", status, text)));
    }

    Ok(text)
}

async fn wait_for_rate_limit() {
    let mut last = LAST_REQUEST.lock().await;
    if let Some(previous) = *last {
        let elapsed = previous.elapsed();
        let window = Duration::from_millis(RATE_LIMIT_WINDOW_MS);
        if elapsed < window {
            sleep(window - elapsed).await;
        }
    }
    *last = Some(Instant::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Showtime;

    fn overrides() -> Overrides {
        let raw: HashMap<String, FilmOverride> = serde_json::from_str(
            r#"{
                "Nosferatu (1922)": {
                    "year": 1922,
                    "description": "A silent vampire classic.",
                    "poster": "https://posters.example/nosferatu.jpg",
                    "venues": ["kinonik"]
                },
                "Stalker": {"description": "The Zone.", "year": null}
            }"#,
        )
        .expect("parse overrides");
        Overrides::from_map(raw)
    }

    fn film_at(title: &str, venue: &str) -> Film {
        let mut film = Film::new(title);
        film.showtimes
            .push(Showtime::new(venue, venue, "Portland", Some("2025-07-16"), None));
        film
    }

    #[test]
    fn computes_edit_distance() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("stalker", "stalker"), 0);
        assert_eq!(levenshtein("stalkr", "stalker"), 1);
    }

    #[test]
    fn finds_overrides_exactly_and_fuzzily() {
        let overrides = overrides();
        assert_eq!(overrides.len(), 2);
        assert!(overrides.find("NOSFERATU (1922)").is_some());
        assert_eq!(
            overrides.find("Stalkers").and_then(|o| o.description.as_deref()),
            Some("The Zone.")
        );
        assert!(overrides.find("Solaris").is_none());
    }

    #[test]
    fn venue_list_limits_overrides() {
        let entry = overrides().find("Nosferatu 1922").cloned().expect("override");
        assert!(entry.applies_to(Some("kinonik")));
        assert!(!entry.applies_to(Some("strand")));
        assert!(!entry.applies_to(None));
        assert!(FilmOverride::default().applies_to(None));
    }

    #[test]
    fn reads_first_search_result() {
        let info = parse_search(
            r#"{"results": [{"poster_path": "/abc.jpg", "overview": "Shark."}, {"poster_path": "/x.jpg"}]}"#,
        )
        .expect("parse");
        assert_eq!(
            info,
            Some(MovieInfo {
                poster: Some("https://image.tmdb.org/t/p/w500/abc.jpg".to_string()),
                overview: Some("Shark.".to_string()),
            })
        );
        assert_eq!(parse_search(r#"{"results": []}"#).expect("parse"), None);
        assert!(parse_search("not json").is_err());
    }

    #[test]
    fn missing_overrides_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = Overrides::load(&dir.path().join("film_overrides.json")).expect("load");
        assert!(loaded.is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[1, 2").expect("write");
        assert!(Overrides::load(&bad).is_err());
    }

    #[tokio::test]
    async fn overrides_fill_missing_fields_without_api_key() {
        let overrides = overrides();

        let enriched = enrich_film(film_at("Nosferatu (1922)", "kinonik"), None, &overrides)
            .await
            .expect("enrich");
        assert_eq!(enriched.poster.as_deref(), Some("https://posters.example/nosferatu.jpg"));
        assert_eq!(enriched.description_text(), "A silent vampire classic.");

        let elsewhere = enrich_film(film_at("Nosferatu (1922)", "strand"), None, &overrides)
            .await
            .expect("enrich");
        assert_eq!(elsewhere.poster, None);
        assert_eq!(elsewhere.description, None);
    }

    #[tokio::test]
    async fn existing_fields_are_kept() {
        let mut film = film_at("Stalker", "kinonik");
        film.description = Some("Scraped description.".to_string());
        let enriched = enrich_all(vec![film], None, &overrides()).await;
        assert_eq!(enriched[0].description_text(), "Scraped description.");
        assert_eq!(enriched[0].poster, None);
    }

    const EVENT_PAGE_HTML: &str = r#"
    <html><head>
      <meta property="og:title" content="STALKER at Kinonik">
      <meta property="og:description" content="Join us for a 35mm print of Tarkovsky's 1979 classic. Doors at 6:30, tickets $12, series runs through 2099.">
    </head><body><h1>STALKER</h1></body></html>
    "#;

    #[test]
    fn reads_event_page_description_and_year() {
        let hints = listing_hints(EVENT_PAGE_HTML, 2025);
        assert_eq!(hints.year, Some(1979));
        assert!(hints
            .description
            .as_deref()
            .is_some_and(|text| text.starts_with("Join us for a 35mm print")));

        let future_only = listing_hints(
            r#"<meta property="og:description" content="Premieres 2099, restored 2101.">"#,
            2025,
        );
        assert_eq!(future_only.year, None);
        assert!(future_only.description.is_some());

        assert_eq!(listing_hints("<html></html>", 2025), ListingHints::default());
    }

    #[tokio::test]
    async fn event_page_without_year_supplies_description_only() {
        let hints = ListingHints {
            year: None,
            description: Some("A members-only screening.".to_string()),
        };
        let enriched = enrich_from_listing(film_at("Secret Screening", "kinonik"), Some("key"), hints)
            .await
            .expect("enrich");
        assert_eq!(enriched.description_text(), "A members-only screening.");
        assert_eq!(enriched.poster, None);
    }

    #[tokio::test]
    async fn event_page_description_fills_in_without_api_key() {
        let mut film = film_at("Stalker", "kinonik");
        film.poster = Some("https://posters.example/stalker.jpg".to_string());
        let hints = listing_hints(EVENT_PAGE_HTML, 2025);
        let enriched = enrich_from_listing(film, None, hints).await.expect("enrich");
        assert!(enriched.description_text().contains("Tarkovsky"));
        assert_eq!(enriched.poster.as_deref(), Some("https://posters.example/stalker.jpg"));
    }
}
