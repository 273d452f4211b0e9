use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::Film;

pub const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/iammisplaced/maine-films/main/maine_showtimes.json";

static CLIENT: Lazy<Result<Client, String>> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("maine-films/0.1 (+https://github.com/iammisplaced/maine-films)")
        .build()
        .map_err(|err| err.to_string())
});

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(String),
    #[error("io error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("feed is not a list of films: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Remote(String),
    File(PathBuf),
}

impl FeedSource {
    /// `http://` and `https://` locations are fetched, anything else is
    /// read from disk.
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            FeedSource::Remote(trimmed.to_string())
        } else {
            FeedSource::File(PathBuf::from(trimmed))
        }
    }
}

impl Default for FeedSource {
    fn default() -> Self {
        FeedSource::Remote(DEFAULT_FEED_URL.to_string())
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Remote(url) => f.write_str(url),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What the browser currently holds. A failed load leaves the film list
/// empty but keeps the reason around for display.
#[derive(Debug, Clone, Default)]
pub enum FeedState {
    #[default]
    Pending,
    Loaded(Vec<Film>),
    Failed(String),
}

impl FeedState {
    pub fn from_result(result: Result<Vec<Film>, FeedError>) -> Self {
        match result {
            Ok(films) => FeedState::Loaded(films),
            Err(err) => {
                warn!("feed unavailable: {err}");
                FeedState::Failed(err.to_string())
            }
        }
    }

    pub fn films(&self) -> &[Film] {
        match self {
            FeedState::Loaded(films) => films,
            FeedState::Pending | FeedState::Failed(_) => &[],
        }
    }

    pub fn into_films(self) -> Vec<Film> {
        match self {
            FeedState::Loaded(films) => films,
            FeedState::Pending | FeedState::Failed(_) => Vec::new(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FeedState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

pub fn load(source: &FeedSource) -> Result<Vec<Film>, FeedError> {
    info!("loading feed from {source}");
    let text = match source {
        FeedSource::Remote(url) => fetch_text(url)?,
        FeedSource::File(path) => std::fs::read_to_string(path).map_err(|source| FeedError::Io {
            path: path.clone(),
            source,
        })?,
    };
    let films = parse_feed(&text)?;
    debug!("feed holds {} films", films.len());
    Ok(films)
}

pub fn parse_feed(text: &str) -> Result<Vec<Film>, FeedError> {
    serde_json::from_str(text).map_err(|err| FeedError::Parse(err.to_string()))
}

fn fetch_text(url: &str) -> Result<String, FeedError> {
    let client = CLIENT.as_ref().map_err(|err| FeedError::Http(err.clone()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| FeedError::Http(format!("request failed for {url}: {err}")))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| FeedError::Http(format!("unable to read body for {url}: {err}")))?;
    if !status.is_success() {
        return Err(FeedError::Http(format!("status {status} for {url}")));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"[
        {
            "title": "Jaws",
            "poster": "https://image.tmdb.org/t/p/w500/jaws.jpg",
            "description": "A shark.",
            "showtimes": [
                {"date": "2025-06-05", "time": "19:00", "venue": "Strand Theatre", "venue_id": "strand", "city": "Rockland"}
            ],
            "film_urls": {"strand": "https://strandfilms.eventive.org/films/1"}
        },
        {
            "title": "Nosferatu",
            "showtimes": [
                {"date": "", "time": "", "venue": "Kinonik", "venue_id": "kinonik", "city": "Portland", "coming_soon": true}
            ]
        }
    ]"#;

    #[test]
    fn parses_feed_with_optional_fields_missing() {
        let films = parse_feed(SAMPLE_FEED).expect("parse feed");
        assert_eq!(films.len(), 2);
        assert_eq!(films[0].showtimes[0].venue_name, "Strand Theatre");
        assert!(films[1].poster.is_none());
        assert!(films[1].showtimes[0].coming_soon);
    }

    #[test]
    fn top_level_object_is_a_parse_error() {
        let err = parse_feed(r#"{"films": []}"#).expect_err("object is not a feed");
        assert!(matches!(err, FeedError::Parse(_)));
    }

    #[test]
    fn failed_state_fails_open_to_empty() {
        let state = FeedState::from_result(parse_feed("not json"));
        assert!(state.films().is_empty());
        assert!(state.error().is_some());
        assert!(FeedState::Pending.films().is_empty());
        assert!(FeedState::default().error().is_none());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feed.json");
        std::fs::write(&path, SAMPLE_FEED).expect("write feed");

        let films = load(&FeedSource::File(path)).expect("load feed");
        assert_eq!(films[0].title, "Jaws");

        let missing = load(&FeedSource::File(dir.path().join("missing.json")));
        assert!(matches!(missing, Err(FeedError::Io { .. })));
    }

    #[test]
    fn source_parse_distinguishes_urls_from_paths() {
        assert_eq!(
            FeedSource::parse(" https://example.com/feed.json "),
            FeedSource::Remote("https://example.com/feed.json".to_string())
        );
        assert_eq!(
            FeedSource::parse("feed.json"),
            FeedSource::File(PathBuf::from("feed.json"))
        );
        assert_eq!(FeedSource::default().to_string(), DEFAULT_FEED_URL);
    }
}
