use chrono::{NaiveDate, NaiveDateTime};

use maine_films_lib::feed::parse_feed;
use maine_films_lib::render::{render_detail, render_grid};
use maine_films_lib::{
    card_venues, classify_venue, filter_films, format_show_date, group_by_venue_and_date,
    sort_films_by_soonest, venue_names, DateDisplay, Film, VenueStatus,
};

const FEED: &str = r#"[
  {
    "title": "Film B",
    "showtimes": [
      {"venue_id": "v2", "venue": "Venue Two", "city": "Orono", "date": "2025-06-12", "time": null, "coming_soon": true}
    ],
    "film_urls": {"v2": "https://venue-two.example/film-b"}
  },
  {
    "title": "Film A",
    "poster": "https://posters.example/a.jpg",
    "description": "Playing today.",
    "showtimes": [
      {"venue_id": "v1", "venue": "Venue One", "city": "Portland", "date": "2025-06-05", "time": "19:00"},
      {"venue_id": "v1", "venue": "Venue One", "city": "Portland", "date": "2025-06-05", "time": "13:30"}
    ]
  },
  {
    "title": "Film C",
    "showtimes": [
      {"venue_id": 7, "venue": "Venue Three", "city": "Rockland", "date": null, "time": null}
    ]
  }
]"#;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 5)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .expect("valid now")
}

fn films() -> Vec<Film> {
    sort_films_by_soonest(parse_feed(FEED).expect("feed parses"))
}

fn titles(films: &[&Film]) -> Vec<String> {
    films.iter().map(|film| film.title.clone()).collect()
}

#[test]
fn films_sort_soonest_first_with_undated_last() {
    let films = films();
    let order: Vec<&str> = films.iter().map(|film| film.title.as_str()).collect();
    assert_eq!(order, vec!["Film A", "Film B", "Film C"]);
}

#[test]
fn cards_split_now_and_soon() {
    let films = films();
    let a = card_venues(&films[0], now());
    assert_eq!(a.now, vec!["Venue One"]);
    assert!(a.soon.is_empty());

    let b = card_venues(&films[1], now());
    assert!(b.now.is_empty());
    assert_eq!(b.soon, vec!["Venue Two"]);

    assert_eq!(
        classify_venue(&films[2].showtimes, now()),
        VenueStatus::None
    );
}

#[test]
fn announced_date_without_times_reads_coming_on() {
    let films = films();
    let groups = group_by_venue_and_date(&films[1].showtimes);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].dates.len(), 1);
    assert_eq!(groups[0].times_for("2025-06-12"), Some(&[String::new()][..]));

    let display = DateDisplay::for_group(&groups[0].dates[0]);
    assert_eq!(display.to_string(), format!("Coming {}", format_show_date("2025-06-12")));
    assert_eq!(display.to_string(), "Coming Thursday June 12th");
}

#[test]
fn detail_view_lists_times_and_coming_soon() {
    let films = films();
    let detail = render_detail(&films[0]);
    assert!(detail.contains("Venue One (Portland):"));
    assert!(detail.contains("  - Thursday June 5th: 7:00 PM, 1:30 PM"));

    let undated = render_detail(&films[2]);
    assert!(undated.contains("Venue Three (Rockland):"));
    assert!(undated.contains("  - Coming Soon!"));

    let linked = render_detail(&films[1]);
    assert!(linked.contains("Venue Two <https://venue-two.example/film-b> (Orono):"));
}

#[test]
fn filters_by_title_and_venue() {
    let films = films();
    assert_eq!(filter_films(&films, "", None).len(), 3);
    assert_eq!(titles(&filter_films(&films, "film a", None)), vec!["Film A"]);
    assert_eq!(titles(&filter_films(&films, "", Some("Venue Two"))), vec!["Film B"]);
    assert!(filter_films(&films, "film a", Some("Venue Two")).is_empty());
    assert_eq!(filter_films(&films, "", Some("")).len(), 3);
}

#[test]
fn grid_and_venue_picker() {
    let films = films();
    assert_eq!(
        venue_names(&films),
        vec!["Venue One", "Venue Three", "Venue Two"]
    );

    let visible = filter_films(&films, "", None);
    let grid = render_grid(&visible, now());
    assert!(grid.starts_with("Now Showing\n\n"));
    let a = grid.find("Film A").expect("film a listed");
    let b = grid.find("Film B").expect("film b listed");
    assert!(a < b);
    assert!(grid.contains("/no-poster.png"));

    let empty = render_grid(&[], now());
    assert!(empty.contains("(no films)"));
}
