use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{Film, Showtime};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VenueStatus {
    Now,
    Soon,
    None,
}

/// Venue names for a film card, split by status.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct CardVenues {
    pub now: Vec<String>,
    pub soon: Vec<String>,
}

/// Classifies one venue's screenings of a film relative to `now`.
///
/// "Now" compares calendar dates only, so an earlier screening today still
/// counts. "Soon" compares the full date and time.
pub fn classify_venue<'a, I>(showtimes: I, now: NaiveDateTime) -> VenueStatus
where
    I: IntoIterator<Item = &'a Showtime>,
    I::IntoIter: Clone,
{
    let showtimes = showtimes.into_iter();
    let today = now.date();

    let any_now = showtimes
        .clone()
        .any(|st| st.calendar_date().is_some_and(|date| date <= today));
    if any_now {
        return VenueStatus::Now;
    }

    let any_soon = showtimes.into_iter().any(|st| {
        st.coming_soon || st.moment().is_some_and(|moment| moment > now)
    });
    if any_soon {
        VenueStatus::Soon
    } else {
        VenueStatus::None
    }
}

/// Splits a film's venues into "now showing" and "coming soon" lists.
///
/// Venues are keyed by display name here, matching what the card shows.
/// Showtimes without a venue name are skipped.
pub fn card_venues(film: &Film, now: NaiveDateTime) -> CardVenues {
    let mut by_name: Vec<(&str, Vec<&Showtime>)> = Vec::new();
    for st in &film.showtimes {
        let name = st.venue_name.as_str();
        if name.is_empty() {
            continue;
        }
        match by_name.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, list)) => list.push(st),
            None => by_name.push((name, vec![st])),
        }
    }

    let mut card = CardVenues::default();
    for (name, showtimes) in by_name {
        match classify_venue(showtimes.iter().copied(), now) {
            VenueStatus::Now => card.now.push(name.to_string()),
            VenueStatus::Soon => card.soon.push(name.to_string()),
            VenueStatus::None => {}
        }
    }
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 5)
            .and_then(|d| d.and_hms_opt(20, 15, 0))
            .expect("valid now")
    }

    fn at(date: Option<&str>, time: Option<&str>) -> Showtime {
        Showtime::new("strand", "Strand Theatre", "Rockland", date, time)
    }

    #[test]
    fn today_is_now_even_after_the_clock_time() {
        let showtimes = vec![at(Some("2025-06-05"), Some("13:00"))];
        assert_eq!(classify_venue(&showtimes, now()), VenueStatus::Now);
    }

    #[test]
    fn past_dates_are_now() {
        let showtimes = vec![at(Some("2025-05-30"), Some("19:00"))];
        assert_eq!(classify_venue(&showtimes, now()), VenueStatus::Now);
    }

    #[test]
    fn tomorrow_without_flag_is_soon() {
        let showtimes = vec![at(Some("2025-06-06"), None)];
        assert_eq!(classify_venue(&showtimes, now()), VenueStatus::Soon);
    }

    #[test]
    fn flagged_dateless_showtime_is_soon() {
        let showtimes = vec![at(None, None).flagged_coming_soon()];
        assert_eq!(classify_venue(&showtimes, now()), VenueStatus::Soon);
    }

    #[test]
    fn dateless_unflagged_showtimes_are_none() {
        let showtimes = vec![at(None, Some("19:00")), at(Some(""), None)];
        assert_eq!(classify_venue(&showtimes, now()), VenueStatus::None);
        assert_eq!(classify_venue(std::iter::empty(), now()), VenueStatus::None);
    }

    #[test]
    fn now_wins_over_soon() {
        let showtimes = vec![
            at(Some("2025-06-20"), None).flagged_coming_soon(),
            at(Some("2025-06-05"), Some("10:00")),
        ];
        assert_eq!(classify_venue(&showtimes, now()), VenueStatus::Now);
    }

    #[test]
    fn card_lists_unique_names_in_first_appearance_order() {
        let mut film = Film::new("Jaws");
        film.showtimes = vec![
            Showtime::new("kinonik", "Kinonik", "Portland", None, None).flagged_coming_soon(),
            Showtime::new("strand", "Strand Theatre", "Rockland", Some("2025-06-05"), Some("19:00")),
            Showtime::new("colonial", "Colonial Theatre", "Belfast", Some("2025-06-04"), None),
            Showtime::new("strand", "Strand Theatre", "Rockland", Some("2025-06-06"), Some("19:00")),
            Showtime::new("space", "", "Portland", Some("2025-06-01"), None),
            Showtime::new("nowhere", "Nowhere", "", None, None),
            Showtime::new("tba", " ", "Portland", Some("2025-06-02"), None),
        ];

        let card = card_venues(&film, now());
        assert_eq!(card.now, vec!["Strand Theatre", "Colonial Theatre", " "]);
        assert_eq!(card.soon, vec!["Kinonik"]);
    }
}
