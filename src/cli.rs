//! Minimal hand-rolled CLI parsing

use std::env;
use std::path::PathBuf;

use crate::services::organizer::DuplicatePolicy;

#[derive(Debug)]
pub enum Command {
    Organize(OrganizeArgs),
    Search(SearchArgs),
    Top { limit: Option<usize> },
    Info { id: u64 },
    Genres,
    Help,
}

#[derive(Debug, Default)]
pub struct OrganizeArgs {
    pub directory: PathBuf,
    pub preview: bool,
    pub interactive: bool,
    pub min_confidence: Option<u8>,
    pub duplicates: Option<DuplicatePolicy>,
    pub target: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct SearchArgs {
    pub query: String,
    pub limit: Option<usize>,
    pub genres: Option<String>,
}

pub fn parse() -> Result<Command, String> {
    parse_from(env::args().skip(1))
}

pub fn parse_from(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };
    match command.as_str() {
        "organize" => parse_organize(args),
        "search" => parse_search(args),
        "top" => parse_top(args),
        "info" => parse_info(args),
        "genres" => Ok(Command::Genres),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(format!("unknown command: {}", other)),
    }
}

fn value_of(flag: &str, arg: &str, args: &mut impl Iterator<Item = String>) -> Result<String, String> {
    if let Some((_, value)) = arg.split_once('=') {
        return Ok(value.to_string());
    }
    args.next()
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_organize(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut directory: Option<PathBuf> = None;
    let mut out = OrganizeArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--preview" => out.preview = true,
            "--interactive" => out.interactive = true,
            _ if arg == "--min-confidence" || arg.starts_with("--min-confidence=") => {
                let value = value_of("--min-confidence", &arg, &mut args)?;
                let parsed: u8 = value
                    .parse()
                    .ok()
                    .filter(|v| *v <= 100)
                    .ok_or_else(|| format!("invalid confidence (0-100): {}", value))?;
                out.min_confidence = Some(parsed);
            }
            _ if arg == "--handle-duplicates" || arg.starts_with("--handle-duplicates=") => {
                let value = value_of("--handle-duplicates", &arg, &mut args)?;
                let policy = DuplicatePolicy::from_str(&value)
                    .ok_or_else(|| format!("invalid duplicate mode (skip|rename|overwrite): {}", value))?;
                out.duplicates = Some(policy);
            }
            _ if arg == "--target" || arg.starts_with("--target=") => {
                let value = value_of("--target", &arg, &mut args)?;
                out.target = Some(PathBuf::from(value));
            }
            _ if arg.starts_with("--") => return Err(format!("unknown flag: {}", arg)),
            _ => {
                if directory.is_some() {
                    return Err(format!("unexpected argument: {}", arg));
                }
                directory = Some(PathBuf::from(arg));
            }
        }
    }

    out.directory = directory.ok_or_else(|| "organize requires a directory argument".to_string())?;
    Ok(Command::Organize(out))
}

fn parse_search(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut out = SearchArgs::default();
    let mut query_parts: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            _ if arg == "--limit" || arg.starts_with("--limit=") => {
                let value = value_of("--limit", &arg, &mut args)?;
                let parsed: usize = value
                    .parse()
                    .map_err(|_| format!("invalid limit: {}", value))?;
                out.limit = Some(parsed);
            }
            _ if arg == "--genres" || arg.starts_with("--genres=") => {
                out.genres = Some(value_of("--genres", &arg, &mut args)?);
            }
            _ if arg.starts_with("--") => return Err(format!("unknown flag: {}", arg)),
            _ => query_parts.push(arg),
        }
    }

    out.query = query_parts.join(" ");
    if out.query.is_empty() && out.genres.is_none() {
        return Err("search requires a query or --genres".to_string());
    }
    Ok(Command::Search(out))
}

fn parse_top(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut limit = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            _ if arg == "--limit" || arg.starts_with("--limit=") => {
                let value = value_of("--limit", &arg, &mut args)?;
                limit = Some(
                    value
                        .parse()
                        .map_err(|_| format!("invalid limit: {}", value))?,
                );
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(Command::Top { limit })
}

fn parse_info(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let Some(value) = args.next() else {
        return Err("info requires an anime id".to_string());
    };
    let id = value
        .parse()
        .map_err(|_| format!("invalid anime id: {}", value))?;
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument: {}", extra));
    }
    Ok(Command::Info { id })
}

pub fn usage() -> &'static str {
    "toshokan - anime media library classifier and organizer

USAGE:
    toshokan organize <directory> [OPTIONS]
    toshokan search <query> [--limit N] [--genres a,b]
    toshokan top [--limit N]
    toshokan info <id>
    toshokan genres

ORGANIZE OPTIONS:
    --preview                   Show what would happen without moving files
    --interactive               Review matches and recover rejects before committing
    --min-confidence <0-100>    Minimum confidence to organize a file (default: 70)
    --handle-duplicates <mode>  skip | rename | overwrite (default: skip)
    --target <directory>        Library root (default: <directory>/Organized)"
}
