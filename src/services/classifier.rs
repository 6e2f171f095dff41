//! Filename classifier for anime release names
//!
//! Classifies files against an ordered bank of release-naming patterns:
//! - "Kamitsubaki City Under Construction - ... - 03 VOSTFR - 03 - Voiranime.mp4"
//! - "[Tsundere-Raws] Black Clover - 169 VOSTFR [CR 720p].mkv"
//! - "SNK_S1_1_VF.mp4", "NarutoE01.mp4"
//!
//! The bank order is a contract: rules are tried strictly in sequence and the
//! first match wins, so narrow site-specific conventions must stay ahead of
//! the loose fallbacks that would otherwise swallow them.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Confidence assigned to video files no rule recognizes. They stay in the
/// pipeline as low-trust candidates; metadata validation makes the final call.
pub const FALLBACK_CONFIDENCE: u8 = 30;

/// Video container extensions we accept (lowercase, with dot)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".ts", ".m4v",
];

/// Audio language tag carried by French release names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    /// French dub
    Vf,
    /// Original audio with French subtitles
    Vostfr,
}

impl Language {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_uppercase().as_str() {
            "VF" => Some(Self::Vf),
            "VOSTFR" => Some(Self::Vostfr),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vf => write!(f, "VF"),
            Self::Vostfr => write!(f, "VOSTFR"),
        }
    }
}

/// One file interpreted through a naming rule
#[derive(Debug, Clone, Serialize)]
pub struct ParsedFile {
    pub original_path: std::path::PathBuf,
    pub file_name: String,
    pub series_guess: String,
    /// None means the filename carried no season, not "season zero"
    pub season: Option<u32>,
    pub episode: u32,
    pub language: Option<Language>,
    /// 0-100, revised later by metadata validation or manual override
    pub confidence: u8,
    /// Which rule matched; None when the low-confidence fallback applied
    pub pattern_id: Option<&'static str>,
}

/// Whether a scanned file is worth validating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Candidate,
    Other,
}

/// Classification verdict for one scanned file
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub file: String,
    pub kind: FileKind,
    pub confidence: u8,
    pub reason: String,
}

struct PatternRule {
    id: &'static str,
    regex: Regex,
    name_group: usize,
    season_group: Option<usize>,
    episode_group: Option<usize>,
    language_group: Option<usize>,
    confidence: u8,
}

/// Ordered rule bank, most specific first. The Voiranime season variant and
/// the fansub VOSTFR variant precede their broader siblings so the extra
/// season/language captures are never shadowed by the looser rule.
static PATTERN_BANK: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        // "Naruto Shippuden 2 - Naruto Shippuden - 04 VF - 04 - Voiranime.mp4"
        PatternRule {
            id: "voiranime-season",
            regex: Regex::new(
                r"(?i)^(.+?)\s+(\d+)\s*(?:\((?:VF|VOSTFR)\))?\s*-\s*.+?\s*-\s*(\d+)(?:x\d+)?\s*(VF|VOSTFR)\s*-\s*\d+(?:x\d+)?\s*-\s*Voiranime",
            )
            .unwrap(),
            name_group: 1,
            season_group: Some(2),
            episode_group: Some(3),
            language_group: Some(4),
            confidence: 95,
        },
        // "Title - Title - 03 VOSTFR - 03 - Voiranime.mp4"
        PatternRule {
            id: "voiranime",
            regex: Regex::new(
                r"(?i)^(.+?)\s*(?:\((?:VF|VOSTFR)\))?\s*-\s*.+?\s*-\s*(\d+)(?:x\d+)?\s*(VF|VOSTFR)\s*-\s*\d+(?:x\d+)?\s*-\s*Voiranime",
            )
            .unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: Some(2),
            language_group: Some(3),
            confidence: 95,
        },
        // "A Couple of Cuckoos - Saison 2 - Anime-Sama - Streaming ....ts"
        PatternRule {
            id: "anime-sama",
            regex: Regex::new(r"(?i)^(.+?)\s*-\s*Saison\s+(\d+)\s*-\s*Anime-Sama").unwrap(),
            name_group: 1,
            season_group: Some(2),
            episode_group: None,
            language_group: None,
            confidence: 90,
        },
        // "Kimi to Idol Precure - Episode 28 vostfr - ADKami.mp4"
        PatternRule {
            id: "adkami",
            regex: Regex::new(r"(?i)^(.+?)\s*-\s*Episode\s+(\d+)\s+(vostfr|vf)\s*-\s*ADKami")
                .unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: Some(2),
            language_group: Some(3),
            confidence: 90,
        },
        // "Mushishi Special - Hihamukage S1 EP1 VOSTFR - FRAnime.fr ....mp4"
        PatternRule {
            id: "franime",
            regex: Regex::new(r"(?i)^(.+?)\s*-\s*.*?S(\d+)\s*EP(\d+)\s+(VOSTFR|VF)\s*-\s*FRAnime")
                .unwrap(),
            name_group: 1,
            season_group: Some(2),
            episode_group: Some(3),
            language_group: Some(4),
            confidence: 90,
        },
        // "Watch Title English Sub-Dub online Free on HiAnime.to.ts"
        PatternRule {
            id: "hianime",
            regex: Regex::new(
                r"(?i)^Watch\s+(.+?)\s+English\s+Sub-Dub\s+online\s+Free\s+on\s+HiAnime",
            )
            .unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: None,
            language_group: None,
            confidence: 85,
        },
        // "[Tsundere-Raws] Black Clover - 169 VOSTFR [CR 720p].mkv"
        PatternRule {
            id: "nyaa-fansub-vostfr",
            regex: Regex::new(
                r"(?i)^\[([^\]]+)\]\s*(.+?)\s*-\s*(\d+)\s*(VOSTFR|VF)\s*\[[^\]]+\]",
            )
            .unwrap(),
            name_group: 2,
            season_group: None,
            episode_group: Some(3),
            language_group: Some(4),
            confidence: 90,
        },
        // "[shincaps] Black Clover - 129 (ANIMAX Asia 1920x1080 H264 MP2).ts"
        PatternRule {
            id: "nyaa-fansub",
            regex: Regex::new(r"(?i)^\[([^\]]+)\]\s*(.+?)\s*-\s*(\d+)\s*(?:\([^)]*\))?").unwrap(),
            name_group: 2,
            season_group: None,
            episode_group: Some(3),
            language_group: None,
            confidence: 85,
        },
        // "Black.Clover.S01.MULTi.1080p.BDRiP.x265-KAF.mkv"
        PatternRule {
            id: "nyaa-season-pack",
            regex: Regex::new(r"(?i)^([^.]+(?:\.[^.]+)?)\.S(\d+)\.").unwrap(),
            name_group: 1,
            season_group: Some(2),
            episode_group: None,
            language_group: None,
            confidence: 80,
        },
        // "Shingeki no Kyojin 3E17 [VF].mp4"
        PatternRule {
            id: "season-episode",
            regex: Regex::new(
                r"(?i)^(.+?)\s*(\d+)E(\d+)(?:\s*\[(VF|VOSTFR)\])?\.(?:mp4|mkv|avi|ts)$",
            )
            .unwrap(),
            name_group: 1,
            season_group: Some(2),
            episode_group: Some(3),
            language_group: Some(4),
            confidence: 80,
        },
        // "Shingeki no Kyojin The Final SeasonE01.mp4"
        PatternRule {
            id: "named-season-episode",
            regex: Regex::new(
                r"(?i)^(.+?)\s+(?:The\s+)?(?:Final\s+)?SeasonE(\d+)\.(?:mp4|mkv|avi|ts)$",
            )
            .unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: Some(2),
            language_group: None,
            confidence: 75,
        },
        // "NarutoE01.mp4"
        PatternRule {
            id: "simple-episode",
            regex: Regex::new(r"(?i)^(.+?)E(\d+)\.(?:mp4|mkv|avi|ts)$").unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: Some(2),
            language_group: None,
            confidence: 75,
        },
        // "SNK_S1_1_VF.mp4"
        PatternRule {
            id: "abbreviation-season",
            regex: Regex::new(r"(?i)^([A-Z]+)_S(\d+)_(\d+)_(VF|VOSTFR)").unwrap(),
            name_group: 1,
            season_group: Some(2),
            episode_group: Some(3),
            language_group: Some(4),
            confidence: 85,
        },
        // "NS.52.VF.www.vostfree.com.mp4"
        PatternRule {
            id: "abbreviation-dot",
            regex: Regex::new(r"(?i)^([A-Z]+)\.(\d+)\.(VF|VOSTFR)\.").unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: Some(2),
            language_group: Some(3),
            confidence: 80,
        },
        // "Hataraku Maou sama.ts", "Title 52.mkv"
        PatternRule {
            id: "generic-title",
            regex: Regex::new(r"(?i)^([^.]+?)(?:\s+(\d+))?\.(?:ts|mkv|mp4|avi)$").unwrap(),
            name_group: 1,
            season_group: None,
            episode_group: Some(2),
            language_group: None,
            confidence: 50,
        },
    ]
});

/// Check whether a path carries a supported video extension
pub fn is_video_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Classify a file as a validation candidate or as unrelated
///
/// Unsupported extensions are a definitive `Other`. Everything else stays a
/// candidate: a rule match carries the rule's base confidence, an unmatched
/// video file is kept at [`FALLBACK_CONFIDENCE`] for the validator to judge.
pub fn classify(path: &Path) -> ClassificationResult {
    let file_name = file_name_of(path);

    let Some(ext) = extension_of(path) else {
        return ClassificationResult {
            file: file_name,
            kind: FileKind::Other,
            confidence: 100,
            reason: "no file extension".to_string(),
        };
    };
    if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return ClassificationResult {
            file: file_name,
            kind: FileKind::Other,
            confidence: 100,
            reason: format!("extension {} not supported", ext),
        };
    }

    for rule in PATTERN_BANK.iter() {
        if rule.regex.is_match(&file_name) {
            return ClassificationResult {
                file: file_name,
                kind: FileKind::Candidate,
                confidence: rule.confidence,
                reason: format!("matched naming rule: {}", rule.id),
            };
        }
    }

    ClassificationResult {
        file: file_name,
        kind: FileKind::Candidate,
        confidence: FALLBACK_CONFIDENCE,
        reason: "no naming rule matched, deferring to metadata validation".to_string(),
    }
}

/// Parse a file into a [`ParsedFile`] guess
///
/// Returns None for non-video files. Video files that match no rule get a
/// fallback guess built from the cleaned file stem, at low confidence.
pub fn parse_file(path: &Path) -> Option<ParsedFile> {
    let file_name = file_name_of(path);
    if !is_video_file(path) {
        return None;
    }

    for rule in PATTERN_BANK.iter() {
        if let Some(caps) = rule.regex.captures(&file_name) {
            let raw_name = caps
                .get(rule.name_group)
                .map(|m| m.as_str())
                .unwrap_or_default();
            let season = rule
                .season_group
                .and_then(|g| caps.get(g))
                .and_then(|m| m.as_str().parse().ok());
            let episode = rule
                .episode_group
                .and_then(|g| caps.get(g))
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            let language = rule
                .language_group
                .and_then(|g| caps.get(g))
                .and_then(|m| Language::from_tag(m.as_str()));

            let parsed = ParsedFile {
                original_path: path.to_path_buf(),
                file_name: file_name.clone(),
                series_guess: clean_series_name(raw_name),
                season,
                episode,
                language,
                confidence: rule.confidence,
                pattern_id: Some(rule.id),
            };
            debug!(
                file = %parsed.file_name,
                rule = rule.id,
                series = %parsed.series_guess,
                season = ?parsed.season,
                episode = parsed.episode,
                "Parsed filename"
            );
            return Some(parsed);
        }
    }

    // No rule matched: keep the file in play with a stem-derived guess.
    let stem = Path::new(&file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&file_name);
    Some(ParsedFile {
        original_path: path.to_path_buf(),
        file_name: file_name.clone(),
        series_guess: clean_series_name(stem),
        season: None,
        episode: 1,
        language: None,
        confidence: FALLBACK_CONFIDENCE,
        pattern_id: None,
    })
}

/// Clean a raw series name extracted from a filename
///
/// Collapses separator runs to single spaces and drops a leading article.
pub fn clean_series_name(name: &str) -> String {
    static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._-]+").unwrap());
    static ARTICLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^the\s+").unwrap());

    let spaced = SEPARATORS.replace_all(name.trim(), " ");
    let cleaned = ARTICLE.replace(spaced.trim(), "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
