use std::collections::HashSet;

use anyhow::Result;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;

use super::base::{self, VenueInfo};
use super::VenueScraper;
use crate::models::Film;

const URL: &str =
    "https://api.eventive.org/event_buckets/67d44b1883a80ee59cc61f2f/events?upcoming_only=true";
const SITE_URL: &str = "https://strandfilms.eventive.org/schedule";
const FILM_URL_BASE: &str = "https://strandfilms.eventive.org/films/";
// Public key the Eventive schedule widget embeds in the page.
const WIDGET_AUTH: &str = "Basic M2QyYzFjNDZlYWY5MjBjMGY5MDBmN2NmNjc4ZDY5NDI6";
const TIMEZONE: Tz = chrono_tz::America::New_York;
const VENUE: VenueInfo = VenueInfo {
    id: "strand",
    name: "Strand Theatre",
    city: "Rockland",
};

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Option<Vec<EventDoc>>,
    #[serde(default)]
    data: Option<DataDoc>,
}

#[derive(Debug, Deserialize)]
struct DataDoc {
    #[serde(default)]
    events: Vec<EventDoc>,
}

#[derive(Debug, Deserialize)]
struct EventDoc {
    #[serde(default)]
    films: Vec<FilmDoc>,
    #[serde(default)]
    start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilmDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    poster_image: Option<String>,
    #[serde(default)]
    cover_image: Option<String>,
}

pub struct Strand;

impl VenueScraper for Strand {
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
        let request = base::client()
            .get(URL)
            .header("Accept", "application/json")
            .header("Authorization", WIDGET_AUTH);
        let payload = base::fetch_json(request, URL)?;
        let response: EventsResponse = serde_json::from_value(payload)?;
        base::fail_if_empty(VENUE.id, self.parse_events(response))
    }
}

impl Strand {
    fn parse_events(&self, response: EventsResponse) -> Vec<Film> {
        let events = response
            .events
            .or_else(|| response.data.map(|data| data.events))
            .unwrap_or_default();
        let mut films: Vec<Film> = Vec::new();

        for event in events {
            let Some(doc) = event.films.into_iter().next() else {
                continue;
            };
            let title = match doc.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };
            let url = match doc.id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => format!("{FILM_URL_BASE}{id}"),
                None => SITE_URL.to_string(),
            };

            let mut film = VENUE.film(&title, Some(url));
            film.description = doc.description.filter(|d| !d.trim().is_empty());
            film.poster = doc
                .poster_image
                .filter(|p| !p.is_empty())
                .or(doc.cover_image)
                .filter(|p| !p.is_empty());
            if let Some(stamp) = event.start_time.as_deref() {
                let (date, time) = local_date_time(stamp);
                film.showtimes.push(VENUE.showtime(Some(date), Some(time)));
            }
            base::merge_into(&mut films, film);
        }

        for film in &mut films {
            let mut seen = HashSet::new();
            film.showtimes
                .retain(|st| seen.insert((st.date.clone(), st.time.clone())));
        }
        films
    }
}

/// Eventive stamps are UTC; the theatre lists local wall-clock times.
fn local_date_time(stamp: &str) -> (String, String) {
    match DateTime::parse_from_rfc3339(stamp) {
        Ok(parsed) => {
            let local = parsed.with_timezone(&TIMEZONE);
            (
                local.format("%Y-%m-%d").to_string(),
                local.format("%H:%M").to_string(),
            )
        }
        Err(_) => (
            stamp.chars().take(10).collect(),
            stamp.chars().skip(11).take(5).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "events": [
            {
                "start_time": "2025-06-05T23:00:00.000Z",
                "films": [{
                    "id": "abc123",
                    "name": "Jaws",
                    "description": "A shark.",
                    "poster_image": "",
                    "cover_image": "https://cdn.example.com/jaws.jpg"
                }]
            },
            {
                "start_time": "2025-06-06T17:30:00.000Z",
                "films": [{"id": "abc123", "name": "Jaws"}]
            },
            {
                "start_time": "2025-06-05T23:00:00.000Z",
                "films": [{"id": "abc123", "name": "jaws"}]
            },
            {"start_time": "2025-06-07T23:00:00.000Z", "films": []},
            {"start_time": "2025-06-07T23:00:00.000Z", "films": [{"name": "  "}]}
        ]
    }"#;

    #[test]
    fn parses_strand_events_in_local_time() {
        let response: EventsResponse = serde_json::from_str(SAMPLE_JSON).expect("parse json");
        let films = Strand.parse_events(response);
        assert_eq!(films.len(), 1);

        let jaws = &films[0];
        assert_eq!(jaws.poster.as_deref(), Some("https://cdn.example.com/jaws.jpg"));
        assert_eq!(
            jaws.film_urls.get("strand").map(String::as_str),
            Some("https://strandfilms.eventive.org/films/abc123")
        );
        let slots: Vec<(&str, &str)> = jaws
            .showtimes
            .iter()
            .map(|st| (st.date_key(), st.time_slot()))
            .collect();
        assert_eq!(slots, vec![("2025-06-05", "19:00"), ("2025-06-06", "13:30")]);
    }

    #[test]
    fn nested_data_events_are_read() {
        let response: EventsResponse = serde_json::from_str(
            r#"{"data": {"events": [{"start_time": "bad-stamp-value", "films": [{"name": "Alien"}]}]}}"#,
        )
        .expect("parse json");
        let films = Strand.parse_events(response);
        assert_eq!(films[0].title, "Alien");
        assert_eq!(
            films[0].film_urls.get("strand").map(String::as_str),
            Some(SITE_URL)
        );
    }
}
