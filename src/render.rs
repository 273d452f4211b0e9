use std::fmt;

use chrono::NaiveDateTime;

use crate::models::Film;
use crate::showtimes::{card_venues, group_by_venue_and_date, DateDisplay};

pub const PLACEHOLDER_POSTER: &str = "/no-poster.png";

pub fn poster_or_placeholder(film: &Film) -> &str {
    film.poster_url().unwrap_or(PLACEHOLDER_POSTER)
}

/// One grid card: title, poster, and the venue lists.
pub struct FilmCard<'a> {
    pub film: &'a Film,
    pub now: NaiveDateTime,
}

impl fmt::Display for FilmCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let venues = card_venues(self.film, self.now);
        writeln!(f, "{}", self.film.title)?;
        writeln!(f, "  poster: {}", poster_or_placeholder(self.film))?;
        write_venue_list(f, "Now Showing", &venues.now)?;
        write_venue_list(f, "Coming Soon", &venues.soon)
    }
}

fn write_venue_list(f: &mut fmt::Formatter<'_>, heading: &str, names: &[String]) -> fmt::Result {
    if names.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {heading}")?;
    for name in names {
        writeln!(f, "    - {name}")?;
    }
    Ok(())
}

/// The detail view of a film with showtimes grouped per venue.
pub struct FilmDetail<'a>(pub &'a Film);

impl fmt::Display for FilmDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let film = self.0;
        writeln!(f, "{}", film.title)?;
        writeln!(f, "poster: {}", poster_or_placeholder(film))?;
        writeln!(f)?;
        writeln!(f, "{}", film.description_text())?;
        writeln!(f)?;
        writeln!(f, "Showtimes")?;

        for venue in group_by_venue_and_date(&film.showtimes) {
            match film.url_for(&venue.venue_id) {
                Some(url) => writeln!(f, "{} <{url}> ({}):", venue.venue_name, venue.city)?,
                None => writeln!(f, "{} ({}):", venue.venue_name, venue.city)?,
            }
            for date in &venue.dates {
                writeln!(f, "  - {}", DateDisplay::for_group(date))?;
            }
        }
        Ok(())
    }
}

pub fn render_card(film: &Film, now: NaiveDateTime) -> String {
    FilmCard { film, now }.to_string()
}

pub fn render_grid(films: &[&Film], now: NaiveDateTime) -> String {
    let mut out = String::from("Now Showing\n\n");
    if films.is_empty() {
        out.push_str("(no films)\n");
        return out;
    }
    let cards: Vec<String> = films.iter().map(|film| render_card(film, now)).collect();
    out.push_str(&cards.join("\n"));
    out
}

pub fn render_detail(film: &Film) -> String {
    FilmDetail(film).to_string()
}
