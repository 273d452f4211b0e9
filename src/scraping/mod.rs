pub mod base;
pub mod colonial_json;
pub mod kinonik_html;
pub mod patriot_html;
pub mod strand_json;

use anyhow::Error;
use tracing::{info, warn};

use crate::models::Film;

pub trait VenueScraper: Send + Sync {
    fn venue_id(&self) -> &'static str;
    fn venue_name(&self) -> &'static str;
    fn venue_url(&self) -> &'static str;
    fn fetch(&self) -> anyhow::Result<Vec<Film>>;
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct ScraperInfo {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Result of scraping one venue.
pub struct ScrapeOutcome {
    pub venue_id: String,
    pub result: Result<Vec<Film>, Error>,
}

fn active_scrapers() -> Vec<Box<dyn VenueScraper>> {
    vec![
        Box::new(patriot_html::NICKELODEON),
        Box::new(strand_json::Strand),
        Box::new(kinonik_html::Kinonik),
        Box::new(patriot_html::BLACK_BEAR),
        Box::new(colonial_json::Colonial),
    ]
}

pub fn list_scrapers() -> Vec<ScraperInfo> {
    active_scrapers()
        .into_iter()
        .map(|scraper| ScraperInfo {
            id: scraper.venue_id().to_string(),
            name: scraper.venue_name().to_string(),
            url: scraper.venue_url().to_string(),
        })
        .collect()
}

fn find_scraper(id: &str) -> Option<Box<dyn VenueScraper>> {
    active_scrapers()
        .into_iter()
        .find(|scraper| scraper.venue_id() == id)
}

pub fn run_single(id: &str) -> anyhow::Result<Vec<Film>> {
    let scraper = find_scraper(id).ok_or_else(|| anyhow::anyhow!("unknown venue id: {id}"))?;
    scraper.fetch()
}

/// Scrapes every registered venue, each on its own blocking task, and
/// reports the outcomes in registration order.
pub async fn run_all() -> Vec<ScrapeOutcome> {
    run_scrapers(active_scrapers()).await
}

/// Like [`run_all`] but limited to the given venue ids.
pub async fn run_selected(ids: &[String]) -> anyhow::Result<Vec<ScrapeOutcome>> {
    let mut scrapers = Vec::with_capacity(ids.len());
    for id in ids {
        let scraper = find_scraper(id).ok_or_else(|| anyhow::anyhow!("unknown venue id: {id}"))?;
        scrapers.push(scraper);
    }
    Ok(run_scrapers(scrapers).await)
}

async fn run_scrapers(scrapers: Vec<Box<dyn VenueScraper>>) -> Vec<ScrapeOutcome> {
    let handles: Vec<_> = scrapers
        .into_iter()
        .map(|scraper| {
            let venue_id = scraper.venue_id().to_string();
            info!("scraping {}", scraper.venue_name());
            (venue_id, tokio::task::spawn_blocking(move || scraper.fetch()))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (venue_id, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(anyhow::anyhow!("scraper task failed: {err}")),
        };
        match &result {
            Ok(films) => info!("{venue_id}: {} films scraped", films.len()),
            Err(err) => warn!("{venue_id}: scrape failed: {err:#}"),
        }
        outcomes.push(ScrapeOutcome { venue_id, result });
    }
    outcomes
}
