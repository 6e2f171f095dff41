//! Interactive review state for validated matches
//!
//! Holds the in-memory match list between validation and the organize
//! commit. Everything here is either a recomputed view (threshold splits) or
//! an explicit operator action (confidence override, recovery of rejected
//! files); no policy decision happens automatically.

use tracing::info;

use super::classifier::ParsedFile;
use super::validator::{AnimeMatch, AnimeValidator, clamp_confidence};

/// Matches and rejects under operator review
pub struct ReviewSession {
    pub matches: Vec<AnimeMatch>,
    pub rejected: Vec<ParsedFile>,
    pub threshold: u8,
}

impl ReviewSession {
    pub fn new(matches: Vec<AnimeMatch>, rejected: Vec<ParsedFile>, threshold: u8) -> Self {
        Self { matches, rejected, threshold }
    }

    /// Recompute the good/low split under the current threshold.
    /// Stored confidences are never touched by this view.
    pub fn split(&self) -> (Vec<&AnimeMatch>, Vec<&AnimeMatch>) {
        self.matches
            .iter()
            .partition(|m| m.parsed.confidence >= self.threshold)
    }

    /// Change the working threshold for subsequent splits
    pub fn set_threshold(&mut self, threshold: u8) {
        self.threshold = clamp_confidence(threshold as i32);
    }

    /// Manually override one match's confidence. Zero is the explicit
    /// "not anime" marker; it keeps the file out of every organize pass.
    pub fn override_confidence(&mut self, index: usize, value: u8) -> bool {
        match self.matches.get_mut(index) {
            Some(m) => {
                let value = clamp_confidence(value as i32);
                info!(
                    file = %m.parsed.file_name,
                    from = m.parsed.confidence,
                    to = value,
                    "Manual confidence override"
                );
                m.parsed.confidence = value;
                true
            }
            None => false,
        }
    }

    /// Re-validate the selected rejected files (indices into `rejected`).
    ///
    /// Confirmed files move into the match list; the rest return to the
    /// rejected bucket. Returns (recovered, still rejected) counts.
    pub async fn recover(
        &mut self,
        validator: &AnimeValidator,
        indices: &[usize],
    ) -> (usize, usize) {
        let mut indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.rejected.len())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        // Pull selected files out, highest index first.
        let mut selected = Vec::with_capacity(indices.len());
        for &index in indices.iter().rev() {
            selected.push(self.rejected.remove(index));
        }
        selected.reverse();

        if selected.is_empty() {
            return (0, 0);
        }

        let outcome = validator.recover_groups(selected).await;
        let recovered = outcome.recovered.len();
        let still_rejected = outcome.still_rejected.len();

        self.matches.extend(outcome.recovered);
        self.rejected.extend(outcome.still_rejected);
        (recovered, still_rejected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::services::cache::LookupCache;
    use crate::services::jikan::CandidateRecord;
    use crate::services::validator::{MetadataLookup, ValidatorConfig, target_relative_path};

    fn parsed(name: &str, episode: u32, confidence: u8) -> ParsedFile {
        ParsedFile {
            original_path: PathBuf::from(format!("{name}E{episode:02}.mp4")),
            file_name: format!("{name}E{episode:02}.mp4"),
            series_guess: name.to_string(),
            season: None,
            episode,
            language: None,
            confidence,
            pattern_id: Some("simple-episode"),
        }
    }

    fn confirmed(name: &str, episode: u32, confidence: u8) -> AnimeMatch {
        let parsed = parsed(name, episode, confidence);
        let target = target_relative_path(&parsed, name);
        AnimeMatch {
            parsed,
            metadata: None,
            normalized_name: name.to_string(),
            target_relative_path: target,
        }
    }

    struct FixedLookup {
        responses: HashMap<String, Vec<CandidateRecord>>,
    }

    #[async_trait]
    impl MetadataLookup for FixedLookup {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<CandidateRecord>> {
            Ok(self
                .responses
                .get(&query.to_lowercase())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn validator(responses: HashMap<String, Vec<CandidateRecord>>) -> AnimeValidator {
        AnimeValidator::new(
            Arc::new(FixedLookup { responses }),
            Arc::new(LookupCache::new(Duration::from_secs(300), 100)),
            ValidatorConfig::without_delays(),
        )
    }

    #[test]
    fn test_split_tracks_threshold_without_mutation() {
        let mut session = ReviewSession::new(
            vec![confirmed("Naruto", 1, 90), confirmed("Bleach", 1, 60)],
            Vec::new(),
            70,
        );

        let (good, low) = session.split();
        assert_eq!(good.len(), 1);
        assert_eq!(low.len(), 1);

        session.set_threshold(50);
        let (good, low) = session.split();
        assert_eq!(good.len(), 2);
        assert_eq!(low.len(), 0);

        // Confidences themselves were never altered.
        assert_eq!(session.matches[0].parsed.confidence, 90);
        assert_eq!(session.matches[1].parsed.confidence, 60);
    }

    #[test]
    fn test_override_confidence() {
        let mut session = ReviewSession::new(vec![confirmed("Naruto", 1, 90)], Vec::new(), 70);
        assert!(session.override_confidence(0, 0));
        assert_eq!(session.matches[0].parsed.confidence, 0);
        assert!(!session.override_confidence(5, 50));
    }

    #[tokio::test]
    async fn test_recover_merges_confirmed_and_still_rejected() {
        let mut responses = HashMap::new();
        responses.insert(
            "naruto".to_string(),
            vec![CandidateRecord {
                id: 20,
                title: "Naruto".to_string(),
                title_english: None,
                title_japanese: None,
                episodes: Some(220),
                score: Some(8.0),
                season: None,
                year: Some(2002),
            }],
        );
        let validator = validator(responses);

        let mut session = ReviewSession::new(
            Vec::new(),
            vec![
                parsed("Naruto", 1, 30),
                parsed("home video", 1, 30),
                parsed("Naruto", 2, 30),
            ],
            70,
        );

        let (recovered, still) = session.recover(&validator, &[0, 1, 2]).await;
        assert_eq!(recovered, 2);
        assert_eq!(still, 1);
        assert_eq!(session.matches.len(), 2);
        assert_eq!(session.rejected.len(), 1);
        assert_eq!(session.rejected[0].series_guess, "home video");
    }
}
