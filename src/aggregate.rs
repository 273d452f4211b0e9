use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::models::Film;
use crate::scraping::base::normalize_time_24h;
use crate::scraping::ScrapeOutcome;
use crate::utils;

static PARENS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]+)\)").expect("valid parens regex"));
static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9 ]").expect("valid alnum regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// Comparison key for titles listed differently by different venues:
/// `"Jaws (50th Anniversary)"` and `"JAWS - 50th anniversary"` share a key.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let opened = PARENS_RE.replace_all(&lowered, " $1 ");
    let stripped = NON_ALNUM_RE.replace_all(&opened, "");
    SPACES_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Combines films from all venues into one entry per normalized title.
///
/// The first listing's title is kept. Showtimes are appended unless an
/// identical one is already present; venue URLs, posters and descriptions
/// keep the first non-empty value.
pub fn merge_films_by_title<I>(films: I) -> Vec<Film>
where
    I: IntoIterator<Item = Film>,
{
    let mut merged: Vec<Film> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for film in films {
        let key = normalize_title(&film.title);
        match index.get(&key) {
            Some(&position) => {
                let has_poster = film.poster_url().is_some();
                let existing = &mut merged[position];
                for st in film.showtimes {
                    if !existing.showtimes.contains(&st) {
                        existing.showtimes.push(st);
                    }
                }
                for (venue, url) in film.film_urls {
                    if !url.is_empty() {
                        existing.film_urls.entry(venue).or_insert(url);
                    }
                }
                if existing.poster_url().is_none() && has_poster {
                    existing.poster = film.poster;
                }
                if existing.description_text().trim().is_empty() {
                    existing.description = film.description;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(film);
            }
        }
    }

    merged
}

/// Rewrites every showtime's time to `HH:MM` where it can be read.
pub fn normalize_times(films: &mut [Film]) {
    for film in films {
        for st in &mut film.showtimes {
            st.time = st.time.as_deref().and_then(normalize_time_24h);
        }
    }
}

/// Films from a previous feed indexed by the venue each was first listed at.
pub fn films_by_venue(previous: &[Film]) -> HashMap<String, Vec<Film>> {
    let mut by_venue: HashMap<String, Vec<Film>> = HashMap::new();
    for film in previous {
        if let Some(venue_id) = film.first_venue_id().filter(|id| !id.as_str().is_empty()) {
            by_venue
                .entry(venue_id.to_string())
                .or_default()
                .push(film.clone());
        }
    }
    by_venue
}

/// Turns scrape outcomes into one film list. A venue that failed or came
/// back empty reuses what the previous feed had for it.
pub fn collect_outcomes(outcomes: Vec<ScrapeOutcome>, previous: &[Film]) -> Vec<Film> {
    let mut fallback = films_by_venue(previous);
    let mut films = Vec::new();

    for outcome in outcomes {
        let scraped = match outcome.result {
            Ok(scraped) if !scraped.is_empty() => scraped,
            Ok(_) | Err(_) => {
                let reused = fallback.remove(&outcome.venue_id).unwrap_or_default();
                warn!(
                    "{}: using {} films from the previous feed",
                    outcome.venue_id,
                    reused.len()
                );
                reused
            }
        };
        films.extend(scraped);
    }

    let mut merged = merge_films_by_title(films);
    normalize_times(&mut merged);
    merged
}

/// Reads the previous feed, treating a missing or unreadable file as empty.
pub fn read_previous(path: &Path) -> Vec<Film> {
    match std::fs::read_to_string(path) {
        Ok(text) => match crate::feed::parse_feed(&text) {
            Ok(films) => films,
            Err(err) => {
                warn!("ignoring previous feed {:?}: {err}", path);
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

pub fn write_feed(path: &Path, films: &[Film]) -> Result<()> {
    utils::ensure_parent(path);
    let contents = serde_json::to_string_pretty(films).context("feed serialization")?;
    std::fs::write(path, contents).with_context(|| format!("unable to write {:?}", path))?;
    let total: usize = films.iter().map(|film| film.showtimes.len()).sum();
    info!(
        "combined {} films with {} showtimes into {:?}",
        films.len(),
        total,
        path
    );
    Ok(())
}
