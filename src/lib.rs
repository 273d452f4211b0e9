pub mod aggregate;
mod cli;
pub mod config;
pub mod feed;
pub mod models;
pub mod render;
pub mod scraping;
pub mod showtimes;
pub mod tmdb;
mod utils;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};
use config::{AppConfig, ConfigStore};
use feed::{FeedError, FeedSource, FeedState};
use tmdb::Overrides;

pub use models::{DateGroup, Film, Showtime, VenueGroup, VenueId};
pub use showtimes::{
    card_venues, classify_venue, earliest_showtime, filter_films, format_show_date,
    format_show_time, group_by_venue_and_date, sort_films_by_soonest, venue_names, CardVenues,
    DateDisplay, VenueStatus,
};

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn feed_source(cli_feed: Option<&str>, config: &AppConfig) -> FeedSource {
    match cli_feed {
        Some(location) if !location.trim().is_empty() => FeedSource::parse(location),
        _ => FeedSource::parse(&config.resolved_feed_url()),
    }
}

async fn load_feed(source: FeedSource) -> FeedState {
    let result = tokio::task::spawn_blocking(move || feed::load(&source))
        .await
        .unwrap_or_else(|err| Err(FeedError::Http(err.to_string())));
    FeedState::from_result(result)
}

async fn loaded_films(source: FeedSource) -> Result<Vec<Film>> {
    let state = load_feed(source).await;
    if let Some(err) = state.error() {
        bail!("could not load showtimes: {err}");
    }
    Ok(state.into_films())
}

async fn list_films(source: FeedSource, title: &str, venue: Option<&str>) -> Result<()> {
    let films = sort_films_by_soonest(loaded_films(source).await?);
    let visible = filter_films(&films, title, venue);
    print!("{}", render::render_grid(&visible, now()));
    Ok(())
}

async fn show_film(source: FeedSource, title: &str) -> Result<()> {
    let films = loaded_films(source).await?;
    let wanted = title.trim();
    let film = films
        .iter()
        .find(|film| film.title.trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| anyhow!("no film titled {wanted:?} in the feed"))?;
    print!("{}", render::render_detail(film));
    Ok(())
}

async fn list_venues(source: FeedSource) -> Result<()> {
    for name in venue_names(&loaded_films(source).await?) {
        println!("{name}");
    }
    Ok(())
}

fn list_scrapers() {
    for info in scraping::list_scrapers() {
        println!("{}\t{}\t{}", info.id, info.name, info.url);
    }
}

async fn scrape(
    config: &AppConfig,
    venues: Vec<String>,
    output: Option<PathBuf>,
    previous: Option<PathBuf>,
    no_enrich: bool,
) -> Result<()> {
    let output = output.unwrap_or_else(|| config.resolved_output_path());
    let previous_path = previous.unwrap_or_else(|| output.clone());

    let outcomes = if venues.is_empty() {
        scraping::run_all().await
    } else {
        scraping::run_selected(&venues).await?
    };

    let previous_films =
        tokio::task::spawn_blocking(move || aggregate::read_previous(&previous_path))
            .await
            .context("reading previous feed")?;
    let mut films = aggregate::collect_outcomes(outcomes, &previous_films);

    if !no_enrich {
        let overrides = match Overrides::load(&config.resolved_overrides_path()) {
            Ok(overrides) => overrides,
            Err(err) => {
                warn!("{err}");
                Overrides::default()
            }
        };
        let api_key = config.resolved_tmdb_key();
        if api_key.is_none() {
            info!("no TMDb api key configured; using overrides only");
        }
        films = tmdb::enrich_all(films, api_key.as_deref(), &overrides).await;
    }

    tokio::task::spawn_blocking(move || aggregate::write_feed(&output, &films))
        .await
        .context("writing feed")??;
    Ok(())
}

fn configure(
    store: &ConfigStore,
    feed_url: Option<String>,
    tmdb_api_key: Option<String>,
    overrides: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let changed = feed_url.is_some()
        || tmdb_api_key.is_some()
        || overrides.is_some()
        || output.is_some();
    let mut current = if changed {
        store
            .update(|config| {
                if let Some(url) = feed_url {
                    config.feed_url = Some(url).filter(|url| !url.trim().is_empty());
                }
                if let Some(key) = tmdb_api_key {
                    config.tmdb_api_key = Some(key).filter(|key| !key.trim().is_empty());
                }
                if overrides.is_some() {
                    config.overrides_path = overrides;
                }
                if output.is_some() {
                    config.output_path = output;
                }
            })
            .map_err(|err| anyhow!("failed to save config: {err}"))?
    } else {
        store.read()
    };

    if current.tmdb_api_key.is_some() {
        current.tmdb_api_key = Some("********".to_string());
    }
    println!("# {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&current)?);
    Ok(())
}

async fn dispatch(cli: Cli, store: ConfigStore) -> Result<()> {
    let config = store.read();
    let source = feed_source(cli.feed.as_deref(), &config);

    match cli.command {
        Commands::List { title, venue } => list_films(source, &title, venue.as_deref()).await,
        Commands::Show { title } => show_film(source, &title).await,
        Commands::Venues => list_venues(source).await,
        Commands::Scrapers => {
            list_scrapers();
            Ok(())
        }
        Commands::Scrape {
            venues,
            output,
            previous,
            no_enrich,
        } => scrape(&config, venues, output, previous, no_enrich).await,
        Commands::Config {
            feed_url,
            tmdb_api_key,
            overrides,
            output,
        } => configure(&store, feed_url, tmdb_api_key, overrides, output),
    }
}

pub fn run() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maine_films_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(dispatch(cli, ConfigStore::load())) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
