use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Deserialize;

use super::base::{self, VenueInfo};
use super::VenueScraper;
use crate::models::Film;

const URL: &str = "https://app.formovietickets.com/schedules/scheduleV1/L244286.json";
const SITE_URL: &str = "https://colonialtheatre.com";
const VENUE: VenueInfo = VenueInfo {
    id: "colonial",
    name: "Colonial Theatre",
    city: "Belfast",
};
const SKIPPED_PREFIX: &str = "LIVE SHOW:";
const STRIPPED_PREFIXES: [&str; 3] = ["NEW:", "INDIE FILM:", "INAUGURAL:"];

#[derive(Debug, Deserialize)]
struct Schedule {
    #[serde(default)]
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(rename = "Titles", default)]
    titles: Vec<TitleDoc>,
}

#[derive(Debug, Deserialize)]
struct TitleDoc {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(rename = "Shows", default)]
    shows: Vec<ShowDoc>,
}

#[derive(Debug, Deserialize)]
struct ShowDoc {
    #[serde(default)]
    time: Option<String>,
}

pub struct Colonial;

impl VenueScraper for Colonial {
    fn venue_id(&self) -> &'static str {
        VENUE.id
    }

    fn venue_name(&self) -> &'static str {
        VENUE.name
    }

    fn venue_url(&self) -> &'static str {
        SITE_URL
    }

    fn fetch(&self) -> Result<Vec<Film>> {
        let payload = base::fetch_json(base::client().get(URL), URL)?;
        let schedule: Schedule = serde_json::from_value(payload)?;
        base::fail_if_empty(VENUE.id, self.parse_schedule(schedule))
    }
}

impl Colonial {
    fn parse_schedule(&self, schedule: Schedule) -> Vec<Film> {
        let titles = schedule.location.map(|loc| loc.titles).unwrap_or_default();
        let mut films = Vec::new();

        for doc in titles {
            let raw_title = doc.title.as_deref().unwrap_or("").trim();
            if raw_title.is_empty() || raw_title.starts_with(SKIPPED_PREFIX) {
                continue;
            }
            let title = strip_prefix(raw_title);

            let mut film = VENUE.film(title, Some(SITE_URL.to_string()));
            film.description = doc.synopsis.filter(|s| !s.trim().is_empty());
            film.showtimes = doc
                .shows
                .iter()
                .filter_map(|show| show.time.as_deref())
                .filter(|time| !time.is_empty())
                .map(|stamp| {
                    let (date, time) = split_stamp(stamp);
                    VENUE.showtime(Some(date), time)
                })
                .collect();
            films.push(film);
        }

        films
    }
}

fn strip_prefix(title: &str) -> &str {
    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = title.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    title
}

/// Splits `2025-06-05T19:00:00` into date and `HH:MM`. Stamps that do not
/// parse are split on `T` as written.
fn split_stamp(stamp: &str) -> (String, Option<String>) {
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(stamp, fmt) {
            return (
                parsed.format("%Y-%m-%d").to_string(),
                Some(parsed.format("%H:%M").to_string()),
            );
        }
    }
    match stamp.split_once('T') {
        Some((date, time)) => (date.to_string(), Some(time.chars().take(5).collect())),
        None => (stamp.to_string(), None),
    }
}
