//! The organize command: scan, classify, validate, review, commit
//!
//! Wires the pipeline end to end. Every stage reports its counts; single-file
//! failures never abort the run, and only a bad source directory (or an
//! unexpected top-level error) is fatal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cli::OrganizeArgs;
use crate::config::Config;
use crate::services::cache::LookupCache;
use crate::services::classifier::{self, FileKind};
use crate::services::jikan::JikanClient;
use crate::services::organizer::{self, OrganizeOptions, OrganizeReport};
use crate::services::prompt::Prompt;
use crate::services::review::ReviewSession;
use crate::services::validator::AnimeValidator;

pub async fn run(config: &Config, args: OrganizeArgs, prompt: &mut dyn Prompt) -> Result<()> {
    let mut options = OrganizeOptions::for_source(&args.directory);
    options.preview = args.preview;
    options.target_dir = args.target.clone();
    if let Some(min_confidence) = args.min_confidence {
        options.min_confidence = min_confidence;
    }
    if let Some(duplicates) = args.duplicates {
        options.duplicates = duplicates;
    }

    organizer::validate_source_dir(&options.source_dir).await?;
    info!(dir = %options.source_dir.display(), "Source directory validated");

    let files = organizer::scan_directory(&options.source_dir, &options.video_extensions);
    if files.is_empty() {
        println!("No video files found in {}.", options.source_dir.display());
        return Ok(());
    }
    println!("Found {} video file(s).", files.len());

    let candidates = summarize_classification(&files);
    let parsed_files: Vec<_> = files
        .iter()
        .filter_map(|path| classifier::parse_file(path))
        .collect();

    println!(
        "Validating {} candidate(s) against the metadata service, this may take a while...",
        candidates
    );
    let validator = AnimeValidator::new(
        Arc::new(JikanClient::new(&config.jikan_base_url, config.pacer())),
        Arc::new(LookupCache::new(config.cache_ttl, config.cache_capacity)),
        config.validator_config(),
    );
    let outcome = validator.validate_batch(parsed_files).await;

    println!(
        "Validation done: {} confirmed, {} not recognized as anime.",
        outcome.matches.len(),
        outcome.rejected.len()
    );

    let mut session = ReviewSession::new(outcome.matches, outcome.rejected, options.min_confidence);

    if session.matches.is_empty() && session.rejected.is_empty() {
        println!("Nothing to organize.");
        return Ok(());
    }
    if session.matches.is_empty() && !args.interactive {
        print_rejected(&session);
        return Ok(());
    }

    if args.interactive {
        let proceed = interactive_review(&mut session, &validator, &mut options, prompt).await?;
        if !proceed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if options.preview {
        println!("{}", organizer::preview_report(&session.matches, &options));
        return Ok(());
    }

    if !args.interactive {
        println!("{}", organizer::preview_report(&session.matches, &options));
        if !prompt.confirm("Proceed with organizing these files?", false)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let report = organizer::organize(session.matches, &options).await;
    print_summary(&report, &options);
    Ok(())
}

/// Log the classification split and return the candidate count
fn summarize_classification(files: &[PathBuf]) -> usize {
    let mut candidates = 0usize;
    let mut other = 0usize;
    for path in files {
        match classifier::classify(path).kind {
            FileKind::Candidate => candidates += 1,
            FileKind::Other => other += 1,
        }
    }
    println!(
        "Classification: {} candidate(s), {} other file(s).",
        candidates, other
    );
    candidates
}

fn print_rejected(session: &ReviewSession) {
    println!("No files were confirmed as anime.");
    for file in session.rejected.iter().take(5) {
        println!("  - {}", file.file_name);
    }
    if session.rejected.len() > 5 {
        println!("  ... and {} more", session.rejected.len() - 5);
    }
}

/// Interactive review loop. Returns false when the operator aborts.
async fn interactive_review(
    session: &mut ReviewSession,
    validator: &AnimeValidator,
    options: &mut OrganizeOptions,
    prompt: &mut dyn Prompt,
) -> Result<bool> {
    loop {
        let (good, low) = session.split();
        println!(
            "\n{} match(es) at or above {}%, {} below, {} rejected.",
            good.len(),
            session.threshold,
            low.len(),
            session.rejected.len()
        );

        let choices = vec![
            "Show matches".to_string(),
            "Adjust confidence threshold".to_string(),
            "Override a file's confidence".to_string(),
            "Recover rejected files".to_string(),
            "Continue with organization".to_string(),
            "Abort".to_string(),
        ];
        match prompt.select("Review options:", &choices)? {
            Some(0) => show_matches(session),
            Some(1) => {
                if let Some(threshold) = prompt.number("New minimum confidence", 0, 100)? {
                    session.set_threshold(threshold as u8);
                    options.min_confidence = threshold as u8;
                    println!("Threshold set to {}%.", threshold);
                }
            }
            Some(2) => override_confidence(session, prompt)?,
            Some(3) => recover_rejected(session, validator, prompt).await?,
            Some(4) => return Ok(true),
            Some(5) | None => return Ok(false),
            Some(_) => {}
        }
    }
}

fn show_matches(session: &ReviewSession) {
    for m in session.matches.iter().take(10) {
        println!(
            "[{:>3}%] {} -> {}/{}",
            m.parsed.confidence,
            m.parsed.file_name,
            m.target_relative_path.display(),
            organizer::canonical_file_name(m)
        );
        if let Some(metadata) = &m.metadata {
            let year = metadata
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "????".to_string());
            println!("       {} ({})", metadata.title, year);
        }
    }
    if session.matches.len() > 10 {
        println!("  ... and {} more", session.matches.len() - 10);
    }
}

fn override_confidence(session: &mut ReviewSession, prompt: &mut dyn Prompt) -> Result<()> {
    if session.matches.is_empty() {
        println!("No matches to adjust.");
        return Ok(());
    }
    let items: Vec<String> = session
        .matches
        .iter()
        .map(|m| format!("{} ({}%)", m.parsed.file_name, m.parsed.confidence))
        .collect();

    let Some(index) = prompt.select("Pick a file:", &items)? else {
        return Ok(());
    };
    let Some(value) = prompt.number("New confidence (0 = not anime)", 0, 100)? else {
        return Ok(());
    };
    session.override_confidence(index, value as u8);
    Ok(())
}

async fn recover_rejected(
    session: &mut ReviewSession,
    validator: &AnimeValidator,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    if session.rejected.is_empty() {
        println!("No rejected files to recover.");
        return Ok(());
    }
    let items: Vec<String> = session
        .rejected
        .iter()
        .map(|f| format!("{} (guess: {})", f.file_name, f.series_guess))
        .collect();

    let selected = prompt.multi_select("Files to re-validate:", &items)?;
    if selected.is_empty() {
        return Ok(());
    }

    println!("Re-validating {} file(s)...", selected.len());
    let (recovered, still_rejected) = session.recover(validator, &selected).await;
    println!(
        "Recovered {} file(s); {} still not confirmed.",
        recovered, still_rejected
    );
    Ok(())
}

fn print_summary(report: &OrganizeReport, options: &OrganizeOptions) {
    println!("\nOrganization result");
    println!("===================");
    println!("Processed: {}", report.processed);
    println!("Organized: {}", report.organized);
    println!("Skipped:   {}", report.skipped);
    println!("Errors:    {}", report.errors);

    if !report.skipped_files.is_empty() {
        println!("\nSkipped files:");
        for skipped in report.skipped_files.iter().take(5) {
            println!("  - {} ({})", skipped.file, skipped.reason);
        }
        if report.skipped_files.len() > 5 {
            println!("  ... and {} more", report.skipped_files.len() - 5);
        }
    }

    if !report.error_files.is_empty() {
        println!("\nErrors:");
        for error in report.error_files.iter().take(5) {
            println!("  - {}: {}", error.file, error.error);
        }
        if report.error_files.len() > 5 {
            println!("  ... and {} more", report.error_files.len() - 5);
        }
    }

    println!("\nLibrary root: {}", options.library_root().display());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::services::classifier::ParsedFile;
    use crate::services::jikan::CandidateRecord;
    use crate::services::prompt::scripted::{Response, ScriptedPrompt};
    use crate::services::validator::{
        AnimeMatch, MetadataLookup, ValidatorConfig, target_relative_path,
    };

    struct NoLookup;

    #[async_trait]
    impl MetadataLookup for NoLookup {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<CandidateRecord>> {
            Ok(Vec::new())
        }
    }

    fn empty_validator() -> AnimeValidator {
        AnimeValidator::new(
            Arc::new(NoLookup),
            Arc::new(LookupCache::new(Duration::from_secs(300), 100)),
            ValidatorConfig::without_delays(),
        )
    }

    fn confirmed(name: &str, confidence: u8) -> AnimeMatch {
        let parsed = ParsedFile {
            original_path: PathBuf::from(format!("{name}E01.mp4")),
            file_name: format!("{name}E01.mp4"),
            series_guess: name.to_string(),
            season: None,
            episode: 1,
            language: None,
            confidence,
            pattern_id: Some("simple-episode"),
        };
        let target_relative_path = target_relative_path(&parsed, name);
        AnimeMatch {
            parsed,
            metadata: None,
            normalized_name: name.to_string(),
            target_relative_path,
        }
    }

    fn rejected_file(name: &str) -> ParsedFile {
        ParsedFile {
            original_path: PathBuf::from(format!("{name}.mp4")),
            file_name: format!("{name}.mp4"),
            series_guess: name.to_string(),
            season: None,
            episode: 1,
            language: None,
            confidence: 30,
            pattern_id: None,
        }
    }

    #[tokio::test]
    async fn test_interactive_review_threshold_then_continue() {
        let mut session = ReviewSession::new(vec![confirmed("Naruto", 90)], Vec::new(), 70);
        let mut options = OrganizeOptions::for_source("/tmp/library");
        let validator = empty_validator();
        let mut prompt = ScriptedPrompt::new(vec![
            Response::Select(Some(1)),
            Response::Number(Some(50)),
            Response::Select(Some(4)),
        ]);

        let proceed = interactive_review(&mut session, &validator, &mut options, &mut prompt)
            .await
            .unwrap();
        assert!(proceed);
        assert_eq!(session.threshold, 50);
        assert_eq!(options.min_confidence, 50);
    }

    #[tokio::test]
    async fn test_interactive_review_abort() {
        let mut session = ReviewSession::new(vec![confirmed("Naruto", 90)], Vec::new(), 70);
        let mut options = OrganizeOptions::for_source("/tmp/library");
        let validator = empty_validator();
        let mut prompt = ScriptedPrompt::new(vec![Response::Select(Some(5))]);

        let proceed = interactive_review(&mut session, &validator, &mut options, &mut prompt)
            .await
            .unwrap();
        assert!(!proceed);
    }

    #[tokio::test]
    async fn test_interactive_override_marks_not_anime() {
        let mut session = ReviewSession::new(vec![confirmed("Naruto", 90)], Vec::new(), 70);
        let mut options = OrganizeOptions::for_source("/tmp/library");
        let validator = empty_validator();
        let mut prompt = ScriptedPrompt::new(vec![
            Response::Select(Some(2)),
            Response::Select(Some(0)),
            Response::Number(Some(0)),
            Response::Select(Some(4)),
        ]);

        let proceed = interactive_review(&mut session, &validator, &mut options, &mut prompt)
            .await
            .unwrap();
        assert!(proceed);
        assert_eq!(session.matches[0].parsed.confidence, 0);
    }

    #[tokio::test]
    async fn test_interactive_recovery_keeps_unconfirmed_files_rejected() {
        let mut session =
            ReviewSession::new(Vec::new(), vec![rejected_file("home_video")], 70);
        let mut options = OrganizeOptions::for_source("/tmp/library");
        let validator = empty_validator();
        let mut prompt = ScriptedPrompt::new(vec![
            Response::Select(Some(3)),
            Response::MultiSelect(vec![0]),
            Response::Select(Some(5)),
        ]);

        let proceed = interactive_review(&mut session, &validator, &mut options, &mut prompt)
            .await
            .unwrap();
        assert!(!proceed);
        assert!(session.matches.is_empty());
        assert_eq!(session.rejected.len(), 1);
    }
}
