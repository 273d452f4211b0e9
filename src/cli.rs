use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Browse and rebuild the Maine independent cinema showtime feed
#[derive(Parser, Debug)]
#[command(name = "maine-films", version)]
#[command(about = "Browse and rebuild the Maine film showtime feed", long_about = None)]
pub struct Cli {
    /// Feed URL or local JSON file; overrides the configured feed
    #[arg(long, global = true, value_name = "URL|PATH")]
    pub feed: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List films soonest first
    List {
        /// Case-insensitive title search
        #[arg(short, long, default_value = "")]
        title: String,
        /// Only films with a showtime at this venue
        #[arg(short, long)]
        venue: Option<String>,
    },
    /// Show one film with its showtimes grouped by venue and date
    Show {
        /// Title of the film, matched case-insensitively
        title: String,
    },
    /// List the venues present in the feed
    Venues,
    /// List the registered venue scrapers
    Scrapers,
    /// Scrape the venues and write a combined feed
    Scrape {
        /// Scrape only this venue id (repeatable)
        #[arg(long = "venue", value_name = "ID")]
        venues: Vec<String>,
        /// Where to write the combined feed
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Previous feed used for venues that fail; defaults to the output file
        #[arg(long)]
        previous: Option<PathBuf>,
        /// Skip poster and description lookups
        #[arg(long)]
        no_enrich: bool,
    },
    /// Show or update the stored configuration
    Config {
        #[arg(long)]
        feed_url: Option<String>,
        #[arg(long)]
        tmdb_api_key: Option<String>,
        /// Path of the film overrides file
        #[arg(long)]
        overrides: Option<PathBuf>,
        /// Default output path for `scrape`
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_filters() {
        let cli = Cli::try_parse_from(["maine-films", "list", "--title", "jaws", "--venue", "Strand Theatre"])
            .expect("parse");
        match cli.command {
            Commands::List { title, venue } => {
                assert_eq!(title, "jaws");
                assert_eq!(venue.as_deref(), Some("Strand Theatre"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn feed_flag_is_global() {
        let cli = Cli::try_parse_from(["maine-films", "venues", "--feed", "feed.json"]).expect("parse");
        assert_eq!(cli.feed.as_deref(), Some("feed.json"));
    }

    #[test]
    fn scrape_accepts_repeated_venues() {
        let cli = Cli::try_parse_from([
            "maine-films",
            "scrape",
            "--venue",
            "strand",
            "--venue",
            "kinonik",
            "--no-enrich",
        ])
        .expect("parse");
        match cli.command {
            Commands::Scrape { venues, no_enrich, output, .. } => {
                assert_eq!(venues, vec!["strand", "kinonik"]);
                assert!(no_enrich);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
