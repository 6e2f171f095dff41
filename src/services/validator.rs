//! Metadata validation and enrichment
//!
//! The classifier only guesses; this module decides. Every parsed file is
//! checked against the metadata service across its name variations, scored,
//! and either enriched into an [`AnimeMatch`] or rejected as not-anime.
//! Lookups go through an injected cache and a paced API client; files are
//! validated in small concurrent batches with sequential pacing between
//! batches.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::SharedLookupCache;
use super::classifier::ParsedFile;
use super::jikan::{CandidateRecord, JikanClient};
use super::normalizer;

/// Abstract search boundary; the production implementation is [`JikanClient`]
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CandidateRecord>>;
}

#[async_trait]
impl MetadataLookup for JikanClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CandidateRecord>> {
        self.search_anime(query, limit).await
    }
}

/// A parsed file confirmed by the metadata service
#[derive(Debug, Clone, Serialize)]
pub struct AnimeMatch {
    pub parsed: ParsedFile,
    pub metadata: Option<CandidateRecord>,
    /// Display/path form of the series name
    pub normalized_name: String,
    /// Series folder, plus "Season N" when a season was parsed
    pub target_relative_path: PathBuf,
}

/// Validation pacing and fan-out settings
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Search results requested per query
    pub search_limit: usize,
    /// Files validated concurrently per batch
    pub batch_size: usize,
    /// Pause between batches
    pub batch_delay: Duration,
    /// Pause between recovery groups
    pub group_delay: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            search_limit: 5,
            batch_size: 3,
            batch_delay: Duration::from_millis(500),
            group_delay: Duration::from_millis(300),
        }
    }
}

impl ValidatorConfig {
    /// No pacing, for tests
    pub fn without_delays() -> Self {
        Self {
            batch_delay: Duration::ZERO,
            group_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Outcome of validating a set of files
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub matches: Vec<AnimeMatch>,
    pub rejected: Vec<ParsedFile>,
}

/// Outcome of re-validating operator-flagged rejects
#[derive(Debug, Default)]
pub struct RecoveryOutcome {
    pub recovered: Vec<AnimeMatch>,
    pub still_rejected: Vec<ParsedFile>,
}

/// Validator over an injected lookup collaborator and cache
pub struct AnimeValidator {
    lookup: Arc<dyn MetadataLookup>,
    cache: SharedLookupCache<Vec<CandidateRecord>>,
    config: ValidatorConfig,
}

impl AnimeValidator {
    pub fn new(
        lookup: Arc<dyn MetadataLookup>,
        cache: SharedLookupCache<Vec<CandidateRecord>>,
        config: ValidatorConfig,
    ) -> Self {
        Self { lookup, cache, config }
    }

    /// Validate one file across all of its name variations.
    ///
    /// Returns `Ok(None)` when no variation produced any search result: the
    /// service, not the filename pattern, decides what counts as anime. Per
    /// variation lookup failures are logged and skipped.
    pub async fn enrich(&self, parsed: ParsedFile) -> Result<Option<AnimeMatch>> {
        let variations = normalizer::variations(&parsed.series_guess);
        let mut best: Option<(CandidateRecord, i32, String)> = None;

        for variation in &variations {
            let results = match self.lookup_cached(variation).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(query = %variation, error = %e, "Lookup failed, skipping variation");
                    continue;
                }
            };
            if results.is_empty() {
                continue;
            }

            let Some(candidate) = best_candidate(variation, &results) else {
                continue;
            };
            let score = match_score(&parsed, candidate, variation);
            debug!(query = %variation, candidate = %candidate.title, score = score, "Scored candidate");

            if best.as_ref().map(|(_, s, _)| score > *s).unwrap_or(true) {
                best = Some((candidate.clone(), score, variation.clone()));
            }
        }

        let Some((record, score, winning_query)) = best else {
            debug!(file = %parsed.file_name, "No metadata match for any variation, rejecting");
            return Ok(None);
        };

        Ok(Some(build_match(parsed, record, score, &winning_query)))
    }

    async fn lookup_cached(&self, query: &str) -> Result<Vec<CandidateRecord>> {
        if let Some(hit) = self.cache.get(query) {
            debug!(query = %query, "Lookup served from cache");
            return Ok(hit);
        }
        let results = self.lookup.search(query, self.config.search_limit).await?;
        self.cache.insert(query, results.clone());
        Ok(results)
    }

    /// Validate files in fixed-size concurrent batches.
    ///
    /// Batches run strictly in sequence with a pacing delay between them. If
    /// the concurrent pass of a batch reports an unexpected error, that batch
    /// is retried file by file so one failure cannot discard its peers; a
    /// file that still fails is rejected with its confidence untouched.
    pub async fn validate_batch(&self, files: Vec<ParsedFile>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if files.is_empty() {
            return outcome;
        }

        let total = files.len();
        info!(files = total, batch_size = self.config.batch_size, "Validating files against metadata service");

        for (index, chunk) in files.chunks(self.config.batch_size).enumerate() {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let results = join_all(chunk.iter().map(|file| self.enrich(file.clone()))).await;

            if results.iter().any(|r| r.is_err()) {
                warn!(batch = index + 1, "Concurrent validation failed, retrying batch sequentially");
                for file in chunk {
                    match self.enrich(file.clone()).await {
                        Ok(Some(m)) => outcome.matches.push(m),
                        Ok(None) => outcome.rejected.push(file.clone()),
                        Err(e) => {
                            warn!(file = %file.file_name, error = %e, "Validation failed, treating as unconfirmed");
                            outcome.rejected.push(file.clone());
                        }
                    }
                }
                continue;
            }

            for (file, result) in chunk.iter().zip(results) {
                match result {
                    Ok(Some(m)) => outcome.matches.push(m),
                    _ => outcome.rejected.push(file.clone()),
                }
            }
        }

        info!(
            confirmed = outcome.matches.len(),
            rejected = outcome.rejected.len(),
            "Metadata validation completed"
        );
        outcome
    }

    /// Re-validate operator-flagged rejects, amortizing lookups per series.
    ///
    /// Files are grouped by their parsed series guess; only the first file of
    /// each group hits the service. A confirmed representative shares its
    /// metadata with every sibling as an independent copy, each boosted to at
    /// least confidence 60; a rejected representative sinks the whole group.
    pub async fn recover_groups(&self, files: Vec<ParsedFile>) -> RecoveryOutcome {
        let mut groups: Vec<(String, Vec<ParsedFile>)> = Vec::new();
        for file in files {
            let key = file.series_guess.trim().to_lowercase();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(file),
                None => groups.push((key, vec![file])),
            }
        }

        let mut outcome = RecoveryOutcome::default();
        for (index, (series, members)) in groups.into_iter().enumerate() {
            if index > 0 && !self.config.group_delay.is_zero() {
                tokio::time::sleep(self.config.group_delay).await;
            }
            info!(series = %series, files = members.len(), "Re-validating rejected group");

            let mut members = members.into_iter();
            let Some(representative) = members.next() else {
                continue;
            };

            match self.enrich(representative.clone()).await {
                Ok(Some(lead)) => {
                    let metadata = lead.metadata.clone();
                    let normalized_name = lead.normalized_name.clone();
                    outcome.recovered.push(lead);

                    for mut sibling in members {
                        sibling.confidence =
                            clamp_confidence((sibling.confidence as i32 + 15).max(60));
                        let target_relative_path =
                            target_relative_path(&sibling, &normalized_name);
                        outcome.recovered.push(AnimeMatch {
                            parsed: sibling,
                            metadata: metadata.clone(),
                            normalized_name: normalized_name.clone(),
                            target_relative_path,
                        });
                    }
                }
                Ok(None) => {
                    info!(series = %series, "Group not confirmed as anime");
                    outcome.still_rejected.push(representative);
                    outcome.still_rejected.extend(members);
                }
                Err(e) => {
                    warn!(series = %series, error = %e, "Group re-validation failed");
                    outcome.still_rejected.push(representative);
                    outcome.still_rejected.extend(members);
                }
            }
        }
        outcome
    }
}

/// Clamp an adjusted confidence into the 0-100 contract
pub fn clamp_confidence(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

/// Relative library path for a match: series folder, plus a season folder
/// only when the filename actually carried one
pub fn target_relative_path(parsed: &ParsedFile, normalized_name: &str) -> PathBuf {
    let mut path = PathBuf::from(normalized_name);
    if let Some(season) = parsed.season {
        path.push(format!("Season {}", season));
    }
    path
}

/// Pick the best record for a query: exact (case-insensitive) title or
/// English-title equality wins outright, otherwise the first, most relevant
/// ranked result.
fn best_candidate<'a>(query: &str, results: &'a [CandidateRecord]) -> Option<&'a CandidateRecord> {
    let q = query.to_lowercase();
    results
        .iter()
        .find(|record| {
            record.title.to_lowercase() == q
                || record
                    .title_english
                    .as_ref()
                    .map(|t| t.to_lowercase() == q)
                    .unwrap_or(false)
        })
        .or_else(|| results.first())
}

/// Score how well a record matches the query and the parsed episode
fn match_score(parsed: &ParsedFile, record: &CandidateRecord, query: &str) -> i32 {
    let q = query.to_lowercase();
    let title = record.title.to_lowercase();
    let english = record
        .title_english
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut score = if title == q || (!english.is_empty() && english == q) {
        50
    } else if title.contains(&q) || (!english.is_empty() && english.contains(&q)) {
        30
    } else {
        10
    };

    if record.score.map(|s| s > 7.0).unwrap_or(false) {
        score += 10;
    }

    if let Some(total) = record.episodes {
        if parsed.episode <= total {
            score += 15;
        } else {
            score -= 10;
        }
    }

    score
}

/// Fold the API score into the classifier's base confidence
fn adjusted_confidence(base: u8, api_score: i32, has_metadata: bool, query: &str) -> u8 {
    let mut adjustment: i32 = if has_metadata {
        if api_score >= 40 {
            20
        } else if api_score >= 25 {
            10
        } else {
            5
        }
    } else {
        -15
    };

    // Very short queries are unreliable search anchors.
    if query.chars().count() <= 3 {
        adjustment -= 10;
    }

    clamp_confidence(base as i32 + adjustment)
}

fn build_match(
    mut parsed: ParsedFile,
    record: CandidateRecord,
    score: i32,
    winning_query: &str,
) -> AnimeMatch {
    let normalized_name =
        normalizer::preferred_title(&record.title, record.title_english.as_deref());
    let target_relative_path = target_relative_path(&parsed, &normalized_name);
    parsed.confidence = adjusted_confidence(parsed.confidence, score, true, winning_query);

    AnimeMatch {
        parsed,
        metadata: Some(record),
        normalized_name,
        target_relative_path,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::services::cache::LookupCache;

    fn record(id: u64, title: &str, english: Option<&str>, episodes: Option<u32>, score: Option<f64>) -> CandidateRecord {
        CandidateRecord {
            id,
            title: title.to_string(),
            title_english: english.map(str::to_string),
            title_japanese: None,
            episodes,
            score,
            season: None,
            year: Some(2002),
        }
    }

    fn parsed(name: &str, episode: u32, confidence: u8) -> ParsedFile {
        ParsedFile {
            original_path: PathBuf::from(format!("{name}.mp4")),
            file_name: format!("{name}.mp4"),
            series_guess: name.to_string(),
            season: None,
            episode,
            language: None,
            confidence,
            pattern_id: Some("simple-episode"),
        }
    }

    struct FakeLookup {
        responses: HashMap<String, Vec<CandidateRecord>>,
        failures: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeLookup {
        fn new(responses: HashMap<String, Vec<CandidateRecord>>) -> Self {
            Self { responses, failures: Vec::new(), calls: AtomicUsize::new(0) }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataLookup for FakeLookup {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<CandidateRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures.iter().any(|f| f == query) {
                anyhow::bail!("simulated lookup failure");
            }
            Ok(self
                .responses
                .get(&query.to_lowercase())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn validator(lookup: FakeLookup) -> (AnimeValidator, Arc<FakeLookup>) {
        let lookup = Arc::new(lookup);
        let cache = Arc::new(LookupCache::new(Duration::from_secs(300), 100));
        (
            AnimeValidator::new(lookup.clone(), cache, ValidatorConfig::without_delays()),
            lookup,
        )
    }

    #[tokio::test]
    async fn test_exact_match_raises_confidence() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![record(20, "Naruto", Some("Naruto"), Some(220), Some(8.0))],
        );
        let (validator, _) = validator(FakeLookup::new(responses));

        let result = validator.enrich(parsed("Naruto", 1, 75)).await.unwrap().unwrap();
        // Exact (+50) + popular (+10) + episode in range (+15) = 75 -> +20
        assert_eq!(result.parsed.confidence, 95);
        assert_eq!(result.normalized_name, "Naruto");
        assert_eq!(result.target_relative_path, PathBuf::from("Naruto"));
        assert_eq!(result.metadata.as_ref().unwrap().id, 20);
    }

    #[tokio::test]
    async fn test_confidence_is_clamped_at_100() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![record(20, "Naruto", None, Some(220), Some(9.0))],
        );
        let (validator, _) = validator(FakeLookup::new(responses));

        let result = validator.enrich(parsed("Naruto", 1, 95)).await.unwrap().unwrap();
        assert_eq!(result.parsed.confidence, 100);
    }

    #[tokio::test]
    async fn test_no_results_means_rejection() {
        let (validator, _) = validator(FakeLookup::new(HashMap::new()));
        let result = validator.enrich(parsed("definitely not anime", 1, 30)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_short_query_penalty() {
        let mut responses = HashMap::new();
        responses.insert(
            "hxh".to_string(),
            vec![record(11061, "Hunter x Hunter (2011)", None, Some(148), Some(9.0))],
        );
        let (validator, _) = validator(FakeLookup::new(responses));

        // Winning query is "HXH" (3 chars): substring fails, weak match +10,
        // popular +10, episode ok +15 = 35 -> +10 adjustment, -10 short query.
        let result = validator.enrich(parsed("HXH", 3, 80)).await.unwrap().unwrap();
        assert_eq!(result.parsed.confidence, 80);
    }

    #[tokio::test]
    async fn test_out_of_range_episode_is_penalized() {
        let mut responses = HashMap::new();
        responses.insert(
            "bleach".to_string(),
            vec![record(269, "Bleach", None, Some(366), Some(7.9))],
        );
        let (validator, _) = validator(FakeLookup::new(responses));

        // Exact +50, popular +10, episode out of range -10 = 50 -> +20.
        let result = validator.enrich(parsed("Bleach", 999, 50)).await.unwrap().unwrap();
        assert_eq!(result.parsed.confidence, 70);
    }

    #[tokio::test]
    async fn test_cache_prevents_repeat_lookups() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![record(20, "Naruto", None, Some(220), Some(8.0))],
        );
        let (validator, lookup) = validator(FakeLookup::new(responses));

        validator.enrich(parsed("Naruto", 1, 75)).await.unwrap();
        validator.enrich(parsed("Naruto", 2, 75)).await.unwrap();
        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exact_title_beats_first_result() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![
                record(1735, "Naruto: Shippuuden", None, Some(500), Some(8.2)),
                record(20, "Naruto", None, Some(220), Some(8.0)),
            ],
        );
        let (validator, _) = validator(FakeLookup::new(responses));

        let result = validator.enrich(parsed("Naruto", 1, 75)).await.unwrap().unwrap();
        assert_eq!(result.metadata.as_ref().unwrap().id, 20);
    }

    #[tokio::test]
    async fn test_validate_batch_splits_matches_and_rejects() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![record(20, "Naruto", None, Some(220), Some(8.0))],
        );
        let (validator, _) = validator(FakeLookup::new(responses));

        let files = vec![
            parsed("Naruto", 1, 75),
            parsed("random home video", 1, 30),
            parsed("Naruto", 2, 75),
            parsed("another clip", 1, 30),
        ];
        let outcome = validator.validate_batch(files).await;
        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.rejected.len(), 2);
        // Rejected files keep their original confidence.
        assert!(outcome.rejected.iter().all(|f| f.confidence == 30));
    }

    #[tokio::test]
    async fn test_lookup_failure_rejects_instead_of_erroring() {
        let mut lookup = FakeLookup::new(HashMap::new());
        lookup.failures.push("Mystery Show".to_string());
        lookup.failures.push("mystery show".to_string());
        let (validator, _) = validator(lookup);

        let outcome = validator.validate_batch(vec![parsed("Mystery Show", 1, 50)]).await;
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].confidence, 50);
    }

    #[tokio::test]
    async fn test_recovery_propagates_metadata_to_group() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![record(20, "Naruto", None, Some(220), Some(8.0))],
        );
        let (validator, lookup) = validator(FakeLookup::new(responses));

        let files = vec![
            parsed("Naruto", 1, 30),
            parsed("Naruto", 2, 30),
            parsed("Naruto", 3, 30),
        ];
        let outcome = validator.recover_groups(files).await;
        assert_eq!(outcome.recovered.len(), 3);
        assert!(outcome.still_rejected.is_empty());
        // One group, one live lookup.
        assert_eq!(lookup.call_count(), 1);

        // Siblings carry independent metadata copies boosted to at least 60.
        for sibling in &outcome.recovered[1..] {
            assert_eq!(sibling.metadata.as_ref().unwrap().id, 20);
            assert_eq!(sibling.parsed.confidence, 60);
        }
    }

    #[tokio::test]
    async fn test_recovery_rejected_group_stays_rejected() {
        let (validator, _) = validator(FakeLookup::new(HashMap::new()));
        let files = vec![parsed("home movie", 1, 30), parsed("home movie", 2, 30)];
        let outcome = validator.recover_groups(files).await;
        assert!(outcome.recovered.is_empty());
        assert_eq!(outcome.still_rejected.len(), 2);
    }

    #[test]
    fn test_clamp_confidence_bounds() {
        assert_eq!(clamp_confidence(-5), 0);
        assert_eq!(clamp_confidence(0), 0);
        assert_eq!(clamp_confidence(64), 64);
        assert_eq!(clamp_confidence(140), 100);
    }

    #[test]
    fn test_target_relative_path_with_season() {
        let mut file = parsed("Naruto", 1, 75);
        file.season = Some(2);
        assert_eq!(
            target_relative_path(&file, "Naruto"),
            PathBuf::from("Naruto/Season 2")
        );
    }
}
