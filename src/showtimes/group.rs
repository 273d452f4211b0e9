use std::fmt;

use crate::models::{parse_calendar_date, DateGroup, Showtime, VenueGroup};

use super::format::{format_show_date, format_show_time};

/// Buckets showtimes by venue id, then by date string.
///
/// Venues and dates keep the order in which they first appear. Times are
/// kept in encounter order with blanks and duplicates intact; a showtime
/// without a date lands in the `""` bucket.
pub fn group_by_venue_and_date<'a, I>(showtimes: I) -> Vec<VenueGroup>
where
    I: IntoIterator<Item = &'a Showtime>,
{
    let mut venues: Vec<VenueGroup> = Vec::new();

    for st in showtimes {
        let venue = match venues.iter().position(|group| group.venue_id == st.venue_id) {
            Some(index) => &mut venues[index],
            None => {
                venues.push(VenueGroup {
                    venue_id: st.venue_id.clone(),
                    venue_name: st.venue_name.clone(),
                    city: st.city.clone(),
                    dates: Vec::new(),
                });
                let last = venues.len() - 1;
                &mut venues[last]
            }
        };

        let date_key = st.date_key();
        match venue.dates.iter_mut().find(|group| group.date == date_key) {
            Some(group) => {
                group.times.push(st.time_slot().to_string());
                group.any_coming_soon |= st.coming_soon;
            }
            None => venue.dates.push(DateGroup {
                date: date_key.to_string(),
                times: vec![st.time_slot().to_string()],
                any_coming_soon: st.coming_soon,
            }),
        }
    }

    venues
}

/// How one date line of a venue block is shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DateDisplay {
    /// Missing or unusable date.
    ComingSoon,
    /// Announced date with no times yet.
    ComingOn(String),
    Times { date: String, times: Vec<String> },
}

impl DateDisplay {
    pub fn for_group(group: &DateGroup) -> Self {
        if !is_displayable_date(&group.date) {
            return DateDisplay::ComingSoon;
        }
        let date = format_show_date(&group.date);
        if group.all_times_missing() && group.any_coming_soon {
            return DateDisplay::ComingOn(date);
        }
        let times = group
            .times
            .iter()
            .filter(|time| !time.is_empty())
            .map(|time| format_show_time(time))
            .collect();
        DateDisplay::Times { date, times }
    }
}

impl fmt::Display for DateDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateDisplay::ComingSoon => f.write_str("Coming Soon!"),
            DateDisplay::ComingOn(date) => write!(f, "Coming {date}"),
            DateDisplay::Times { date, times } if times.is_empty() => write!(f, "{date}:"),
            DateDisplay::Times { date, times } => write!(f, "{date}: {}", times.join(", ")),
        }
    }
}

fn is_displayable_date(date: &str) -> bool {
    let date = date.trim();
    !(date.is_empty() || date == "null" || date == "undefined")
        && parse_calendar_date(date).is_some()
}
