//! Search and browse commands
//!
//! Thin glue over the metadata client: forward the query, print the results.
//! No scoring or library logic lives here.

use anyhow::Result;

use crate::cli::SearchArgs;
use crate::config::Config;
use crate::services::genres;
use crate::services::jikan::{CandidateRecord, JikanClient};

const DEFAULT_LIMIT: usize = 10;

pub async fn run(config: &Config, args: &SearchArgs) -> Result<()> {
    let client = JikanClient::new(&config.jikan_base_url, config.pacer());
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);

    let results = match &args.genres {
        Some(genre_arg) => {
            let names = genres::parse_genre_list(genre_arg);
            let validation = genres::validate_genres(&names);
            if !validation.invalid.is_empty() {
                println!("Ignoring unknown genres: {}", validation.invalid.join(", "));
            }
            let ids = genres::genre_ids(&validation.valid);
            if ids.is_empty() {
                anyhow::bail!("no valid genres given; run `toshokan genres` for the known list");
            }
            client.search_by_genre(&ids, limit).await?
        }
        None => client.search_anime(&args.query, limit).await?,
    };

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_records(&results);
    Ok(())
}

pub async fn run_top(config: &Config, limit: Option<usize>) -> Result<()> {
    let client = JikanClient::new(&config.jikan_base_url, config.pacer());
    let results = client.top_anime(limit.unwrap_or(DEFAULT_LIMIT)).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_records(&results);
    Ok(())
}

pub async fn run_info(config: &Config, id: u64) -> Result<()> {
    let client = JikanClient::new(&config.jikan_base_url, config.pacer());
    match client.get_anime(id).await? {
        Some(record) => print_details(&record),
        None => println!("No anime with id {}.", id),
    }
    Ok(())
}

pub fn run_genres() {
    println!("Known genres:");
    for genre in genres::GENRES {
        println!("  {}", genre.name);
    }
}

fn print_details(record: &CandidateRecord) {
    println!("{} (id {})", record.title, record.id);
    if let Some(english) = &record.title_english {
        if english != &record.title {
            println!("  English:  {}", english);
        }
    }
    if let Some(japanese) = &record.title_japanese {
        println!("  Japanese: {}", japanese);
    }
    if let Some(year) = record.year {
        match &record.season {
            Some(season) => println!("  Aired:    {} {}", season, year),
            None => println!("  Aired:    {}", year),
        }
    }
    if let Some(score) = record.score {
        println!("  Score:    {:.2}", score);
    }
    if let Some(episodes) = record.episodes {
        println!("  Episodes: {}", episodes);
    }
}

fn print_records(records: &[CandidateRecord]) {
    for (index, record) in records.iter().enumerate() {
        let year = record
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "????".to_string());
        let score = record
            .score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "n/a".to_string());
        let episodes = record
            .episodes
            .map(|e| format!("{} eps", e))
            .unwrap_or_else(|| "? eps".to_string());

        println!(
            "{:>2}. {} ({}) - score {}, {}",
            index + 1,
            record.title,
            year,
            score,
            episodes
        );
        if let Some(english) = &record.title_english {
            if english != &record.title {
                println!("    {}", english);
            }
        }
    }
}
