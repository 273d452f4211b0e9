use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::models::Film;

/// Earliest dated screening of a film, if it has any.
pub fn earliest_showtime(film: &Film) -> Option<NaiveDateTime> {
    film.showtimes.iter().filter_map(|st| st.moment()).min()
}

/// Orders films by their earliest screening. Films with no dated screening
/// go last; ties keep their input order.
pub fn sort_films_by_soonest(mut films: Vec<Film>) -> Vec<Film> {
    films.sort_by_cached_key(|film| {
        let earliest = earliest_showtime(film);
        (earliest.is_none(), earliest)
    });
    films
}

/// Keeps films whose title contains `title_query` (case-insensitive) and,
/// when a venue is selected, that screen at a venue with exactly that name.
/// An empty query or venue matches everything.
pub fn filter_films<'a>(
    films: &'a [Film],
    title_query: &str,
    venue_name: Option<&str>,
) -> Vec<&'a Film> {
    let query = title_query.to_lowercase();
    let venue = venue_name.filter(|name| !name.is_empty());

    films
        .iter()
        .filter(|film| query.is_empty() || film.title.to_lowercase().contains(&query))
        .filter(|film| match venue {
            Some(name) => film.showtimes.iter().any(|st| st.venue_name == name),
            None => true,
        })
        .collect()
}

/// Distinct venue names across all films, alphabetized, for a venue picker.
pub fn venue_names(films: &[Film]) -> Vec<String> {
    films
        .iter()
        .flat_map(|film| film.showtimes.iter())
        .map(|st| st.venue_name.as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
