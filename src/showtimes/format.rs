use chrono::{Datelike, NaiveTime};

use crate::models::parse_calendar_date;

/// Renders a `YYYY-MM-DD` date as e.g. `"Thursday June 5th"`.
///
/// The calendar date is taken literally; no time zone conversion happens.
/// Anything that does not parse as a date is returned unchanged.
pub fn format_show_date(date: &str) -> String {
    match parse_calendar_date(date) {
        Some(parsed) => format!("{}{}", parsed.format("%A %B %-d"), day_suffix(parsed.day())),
        None => date.to_string(),
    }
}

/// Renders a 24-hour `HH:MM` time on a 12-hour clock, e.g. `"7:30 PM"`.
///
/// Blank input gives `""`. Input whose hour or minute is not a number is
/// returned as-is so noisy feed values still show up.
pub fn format_show_time(time: &str) -> String {
    if time.is_empty() {
        return String::new();
    }
    match parse_hour_minute(time) {
        Some(clock) => clock.format("%-I:%M %p").to_string(),
        None => time.to_string(),
    }
}

pub fn day_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&day) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

fn parse_hour_minute(time: &str) -> Option<NaiveTime> {
    let mut parts = time.trim().split(':');
    let hour = parts.next().and_then(parse_number)?;
    let minute = parts.next().and_then(parse_number)?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_number(part: &str) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}
