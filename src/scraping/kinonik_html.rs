use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::base::{self, VenueInfo};
use super::VenueScraper;
use crate::models::Film;

const URL: &str = "https://www.kinonik.org/";
const VENUE: VenueInfo = VenueInfo {
    id: "kinonik",
    name: "Kinonik",
    city: "Portland",
};
// Listings carry dates only; screenings start at seven.
const DEFAULT_TIME: &str = "19:00";

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#upcoming-films-list ul li a").expect("kinonik link"));
static ON_DATES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+ON\s+(.+?)\s+AT\b").expect("kinonik on regex"));
static BARE_DATES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?)\s+((?:\d{1,2}/\d{1,2}(?:\s*(?:and|,)\s*)?)+)\s+AT\b")
        .expect("kinonik dates regex")
});
static DATE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\band\b|,").expect("kinonik split regex"));
static MONTH_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})").expect("kinonik month/day regex"));

pub struct Kinonik;

impl VenueScraper for Kinonik {
    fn venue_id(&self) -> &'static str {
        VENUE.id
    }

    fn venue_name(&self) -> &'static str {
        VENUE.name
    }

    fn venue_url(&self) -> &'static str {
        URL
    }

    fn fetch(&self) -> Result<Vec<Film>> {
        let html = base::fetch_html(URL)?;
        base::fail_if_empty(VENUE.id, self.parse_document(&html, Local::now().year()))
    }
}

impl Kinonik {
    pub(crate) fn parse_document(&self, html: &str, year: i32) -> Vec<Film> {
        let document = Html::parse_document(html);
        let mut films = Vec::new();

        for link in document.select(&LINK_SELECTOR) {
            let text = base::inner_text(link);
            if text.is_empty() {
                continue;
            }
            let (title, dates) = extract_title_and_dates(&text, year);
            if title.is_empty() {
                continue;
            }

            let href = base::absolute_url(URL, link.value().attr("href").map(str::to_string));
            let mut film = VENUE.film(&title, href);
            film.showtimes = dates
                .iter()
                .map(|date| {
                    VENUE.showtime(
                        Some(date.format("%Y-%m-%d").to_string()),
                        Some(DEFAULT_TIME.to_string()),
                    )
                })
                .collect();
            if film.showtimes.is_empty() {
                film.showtimes.push(
                    VENUE
                        .showtime(Some(String::new()), Some(String::new()))
                        .flagged_coming_soon(),
                );
            }
            films.push(film);
        }

        films
    }
}

/// Splits listing text like `NOSFERATU ON 9/3 and 9/6 AT |Kinonik|` into
/// the title and the dates it names in `year`.
fn extract_title_and_dates(text: &str, year: i32) -> (String, Vec<NaiveDate>) {
    let (title, dates_part) = if let Some(caps) = ON_DATES_RE.captures(text) {
        (caps[1].trim().to_string(), caps[2].trim().to_string())
    } else if let Some(caps) = BARE_DATES_RE.captures(text) {
        (caps[1].trim().to_string(), caps[2].trim().to_string())
    } else {
        let title = match text.to_uppercase().find(" AT") {
            Some(index) => text.get(..index).unwrap_or(text),
            None => text,
        };
        (title.trim().to_string(), String::new())
    };

    let dates = DATE_SPLIT_RE
        .split(&dates_part)
        .filter_map(|token| {
            let caps = MONTH_DAY_RE.captures(token.trim())?;
            let month = caps[1].parse().ok()?;
            let day = caps[2].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .collect();
    (title, dates)
}
