use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder};
use scraper::{ElementRef, Selector};
use serde_json::Value;

use crate::models::{Film, Showtime, VenueId};

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2}):(\d{2})(a|am|p|pm)?$").expect("valid time regex")
});
static SLUG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid slug regex"));
static SLUG_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid slug regex"));
static SLUG_DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid slug regex"));

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Identity of the venue a scraper reports showtimes for.
#[derive(Clone, Copy, Debug)]
pub struct VenueInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub city: &'static str,
}

impl VenueInfo {
    pub fn showtime(&self, date: Option<String>, time: Option<String>) -> Showtime {
        Showtime {
            venue_id: VenueId::new(self.id),
            venue_name: self.name.to_string(),
            city: self.city.to_string(),
            date,
            time,
            coming_soon: false,
        }
    }

    pub fn film(&self, title: &str, url: Option<String>) -> Film {
        let mut film = Film::new(title);
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            film.film_urls.insert(self.id.to_string(), url);
        }
        film
    }
}

pub fn client() -> &'static Client {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .expect("http client")
    });
    &CLIENT
}

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href);
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(&href).ok().map(|u| u.to_string())
}

pub fn fetch_html(url: &str) -> Result<String> {
    fetch_text(client().get(url), url)
}

pub fn fetch_json(request: RequestBuilder, url: &str) -> Result<Value> {
    let body = fetch_text(request, url)?;
    serde_json::from_str(&body).with_context(|| format!("invalid json from {url}"))
}

pub fn fetch_text(request: RequestBuilder, url: &str) -> Result<String> {
    let response = request
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .with_context(|| format!("unable to read response body for {url}"))
}

/// Normalizes `7:30pm`, `7:30 PM`, `12:00a` and `19:30` to `HH:MM`.
/// Blank input is absent; anything else unrecognized is kept as written.
pub fn normalize_time_24h(time: &str) -> Option<String> {
    let trimmed = time.trim();
    if trimmed.is_empty() {
        return None;
    }
    let compact: String = trimmed.chars().filter(|ch| !ch.is_whitespace()).collect();
    let caps = match TIME_RE.captures(&compact) {
        Some(caps) => caps,
        None => return Some(trimmed.to_string()),
    };
    let mut hour: u32 = caps[1].parse().unwrap_or(0);
    let minute: u32 = caps[2].parse().unwrap_or(0);
    let period = caps.get(3).map(|m| m.as_str().to_lowercase());
    match period.as_deref() {
        Some("p") | Some("pm") if hour != 12 => hour += 12,
        Some("a") | Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    Some(format!("{hour:02}:{minute:02}"))
}

pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = SLUG_STRIP_RE.replace_all(&lowered, "");
    let spaced = SLUG_SPACE_RE.replace_all(&stripped, "-");
    let collapsed = SLUG_DASH_RE.replace_all(&spaced, "-");
    collapsed.trim_matches('-').to_string()
}

/// Appends `film`'s showtimes to an existing entry with the same
/// case-insensitive title, or adds it. Repeated showtimes are dropped.
pub fn merge_into(films: &mut Vec<Film>, film: Film) {
    let key = film.title.trim().to_lowercase();
    match films
        .iter_mut()
        .find(|existing| existing.title.trim().to_lowercase() == key)
    {
        Some(existing) => {
            for st in film.showtimes {
                if !existing.showtimes.contains(&st) {
                    existing.showtimes.push(st);
                }
            }
            for (venue, url) in film.film_urls {
                existing.film_urls.entry(venue).or_insert(url);
            }
            if existing.poster_url().is_none() {
                existing.poster = film.poster;
            }
            if existing.description_text().is_empty() {
                existing.description = film.description;
            }
        }
        None => films.push(film),
    }
}

pub fn fail_if_empty<T>(venue_id: &str, items: Vec<T>) -> Result<Vec<T>> {
    if items.is_empty() {
        Err(anyhow!("no films scraped for {venue_id}"))
    } else {
        Ok(items)
    }
}
