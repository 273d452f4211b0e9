//! Pure transformations from feed records to what the film grid shows:
//! display formatting, venue classification, grouping and ordering.
//!
//! Nothing in here performs I/O or reads the clock; callers pass the
//! current moment in.

pub mod classify;
pub mod format;
pub mod group;
pub mod sort;

pub use classify::{card_venues, classify_venue, CardVenues, VenueStatus};
pub use format::{format_show_date, format_show_time};
pub use group::{group_by_venue_and_date, DateDisplay};
pub use sort::{earliest_showtime, filter_films, sort_films_by_soonest, venue_names};
