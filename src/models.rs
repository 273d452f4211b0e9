use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Venue identifier as it appears in the feed. Older feeds carry integer
/// ids, newer ones short slugs; both normalize to a string.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "RawVenueId")]
pub struct VenueId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVenueId {
    Text(String),
    Number(i64),
    Missing,
}

impl From<RawVenueId> for VenueId {
    fn from(raw: RawVenueId) -> Self {
        match raw {
            RawVenueId::Text(text) => VenueId(text),
            RawVenueId::Number(number) => VenueId(number.to_string()),
            RawVenueId::Missing => VenueId::default(),
        }
    }
}

impl VenueId {
    pub fn new(id: impl Into<String>) -> Self {
        VenueId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VenueId {
    fn from(id: &str) -> Self {
        VenueId(id.to_string())
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Showtime {
    #[serde(default)]
    pub venue_id: VenueId,
    #[serde(rename = "venue", default, deserialize_with = "null_as_default")]
    pub venue_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub coming_soon: bool,
}

impl Showtime {
    pub fn new(
        venue_id: impl Into<VenueId>,
        venue_name: &str,
        city: &str,
        date: Option<&str>,
        time: Option<&str>,
    ) -> Self {
        Self {
            venue_id: venue_id.into(),
            venue_name: venue_name.to_string(),
            city: city.to_string(),
            date: date.map(str::to_string),
            time: time.map(str::to_string),
            coming_soon: false,
        }
    }

    pub fn flagged_coming_soon(mut self) -> Self {
        self.coming_soon = true;
        self
    }

    /// Key used when grouping by date. A missing date groups under `""`.
    pub fn date_key(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }

    /// The time string, or `""` when the feed carries none.
    pub fn time_slot(&self) -> &str {
        self.time.as_deref().unwrap_or("")
    }

    pub fn has_time(&self) -> bool {
        !self.time_slot().is_empty()
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_calendar_date)
    }

    /// Date and time combined. A missing or unreadable time counts as the
    /// start of the day; a missing or invalid date yields `None`.
    pub fn moment(&self) -> Option<NaiveDateTime> {
        let date = self.calendar_date()?;
        match self.time.as_deref().and_then(parse_clock_time) {
            Some(time) => Some(date.and_time(time)),
            None => date.and_hms_opt(0, 0, 0),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Film {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub showtimes: Vec<Showtime>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub film_urls: BTreeMap<String, String>,
}

impl Film {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Poster URL when one is present and non-blank.
    pub fn poster_url(&self) -> Option<&str> {
        non_blank(self.poster.as_deref())
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn url_for(&self, venue_id: &VenueId) -> Option<&str> {
        non_blank(self.film_urls.get(venue_id.as_str()).map(String::as_str))
    }

    /// Id of the venue the film was first listed at.
    pub fn first_venue_id(&self) -> Option<&VenueId> {
        self.showtimes.first().map(|st| &st.venue_id)
    }
}

/// One time-slot list for a single date at a single venue.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DateGroup {
    pub date: String,
    pub times: Vec<String>,
    pub any_coming_soon: bool,
}

impl DateGroup {
    pub fn all_times_missing(&self) -> bool {
        self.times.iter().all(String::is_empty)
    }
}

/// Showtimes of one film at one venue, bucketed by date.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct VenueGroup {
    pub venue_id: VenueId,
    pub venue_name: String,
    pub city: String,
    pub dates: Vec<DateGroup>,
}

impl VenueGroup {
    pub fn times_for(&self, date: &str) -> Option<&[String]> {
        self.dates
            .iter()
            .find(|group| group.date == date)
            .map(|group| group.times.as_slice())
    }

    pub fn slot_count(&self) -> usize {
        self.dates.iter().map(|group| group.times.len()).sum()
    }
}

pub fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// `HH:MM`, with or without a trailing `:SS`.
pub fn parse_clock_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
