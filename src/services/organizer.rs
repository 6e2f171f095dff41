//! Library organization service
//!
//! Moves confirmed matches into the canonical layout:
//! `<library root>/<Series>/Season N/<Series - SxxEyy [LANG].ext>`
//!
//! The season folder appears only when a season was actually parsed; the
//! filename always carries a season/episode pair (defaulting to 01) so the
//! library stays uniformly named. Collisions follow the configured duplicate
//! policy and every per-file failure is recorded without aborting the run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::classifier::VIDEO_EXTENSIONS;
use super::validator::AnimeMatch;

/// Source directory precondition failures, diagnosed before any work starts
#[derive(Debug, Error)]
pub enum SourceDirError {
    #[error("directory does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("insufficient permissions for directory: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("failed to access {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What to do when the computed target path already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Leave both files in place and record the skip
    #[default]
    Skip,
    /// Append an incrementing " (n)" suffix until a free name is found
    Rename,
    /// Replace the existing file
    Overwrite,
}

impl DuplicatePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "rename" => Some(Self::Rename),
            "overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Rename => "rename",
            Self::Overwrite => "overwrite",
        }
    }
}

/// Settings for one organize run
#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub source_dir: PathBuf,
    /// Library root override; defaults to `<source>/Organized`
    pub target_dir: Option<PathBuf>,
    /// Report what would happen without touching the filesystem
    pub preview: bool,
    /// Matches below this confidence are skipped, never moved
    pub min_confidence: u8,
    pub duplicates: DuplicatePolicy,
    pub video_extensions: Vec<String>,
}

impl OrganizeOptions {
    pub fn for_source(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: None,
            preview: false,
            min_confidence: 70,
            duplicates: DuplicatePolicy::default(),
            video_extensions: default_video_extensions(),
        }
    }

    /// The single library root all target paths are resolved against
    pub fn library_root(&self) -> PathBuf {
        self.target_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.join("Organized"))
    }
}

pub fn default_video_extensions() -> Vec<String> {
    VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorFile {
    pub file: String,
    pub error: String,
}

/// Aggregate result of one organize run
#[derive(Debug, Default, Serialize)]
pub struct OrganizeReport {
    pub processed: usize,
    pub organized: usize,
    pub skipped: usize,
    pub errors: usize,
    pub matches: Vec<AnimeMatch>,
    pub skipped_files: Vec<SkippedFile>,
    pub error_files: Vec<ErrorFile>,
}

/// Check the source directory exists, is a directory, and is usable,
/// with a distinct diagnosis per failure mode
pub async fn validate_source_dir(path: &Path) -> Result<(), SourceDirError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(SourceDirError::NotFound(path.to_path_buf()));
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(SourceDirError::PermissionDenied(path.to_path_buf()));
        }
        Err(e) => {
            return Err(SourceDirError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    if !metadata.is_dir() {
        return Err(SourceDirError::NotADirectory(path.to_path_buf()));
    }

    if let Err(e) = tokio::fs::read_dir(path).await {
        return Err(match e.kind() {
            ErrorKind::PermissionDenied => SourceDirError::PermissionDenied(path.to_path_buf()),
            _ => SourceDirError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        });
    }

    if metadata.permissions().readonly() {
        return Err(SourceDirError::PermissionDenied(path.to_path_buf()));
    }

    Ok(())
}

/// List video files directly inside the source directory, sorted for
/// deterministic processing order
pub fn scan_directory(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_video_extension(path, extensions))
        .collect();
    files.sort();
    info!(dir = %dir.display(), count = files.len(), "Scanned source directory");
    files
}

fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)))
        .unwrap_or(false)
}

/// Canonical filename for a match: `Series - SxxEyy [LANG].ext`.
/// Season and episode default to 01 so filenames stay uniformly formatted;
/// the language bracket is omitted when unknown.
pub fn canonical_file_name(m: &AnimeMatch) -> String {
    let ext = Path::new(&m.parsed.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mkv");

    let mut name = format!(
        "{} - S{:02}E{:02}",
        m.normalized_name,
        m.parsed.season.unwrap_or(1),
        m.parsed.episode
    );
    if let Some(language) = m.parsed.language {
        name.push_str(&format!(" [{}]", language));
    }

    sanitize_filename::sanitize(format!("{}.{}", name, ext))
}

/// Organize matches into the library root.
///
/// Per-file failures are recorded and never abort the run; in preview mode
/// nothing on disk changes.
pub async fn organize(matches: Vec<AnimeMatch>, options: &OrganizeOptions) -> OrganizeReport {
    let root = options.library_root();
    let mut report = OrganizeReport::default();

    let eligible = matches
        .iter()
        .filter(|m| m.parsed.confidence >= options.min_confidence)
        .count();
    info!(
        total = matches.len(),
        eligible = eligible,
        min_confidence = options.min_confidence,
        preview = options.preview,
        root = %root.display(),
        "Organizing files"
    );

    for m in matches {
        report.processed += 1;

        if m.parsed.confidence < options.min_confidence {
            report.skipped += 1;
            report.skipped_files.push(SkippedFile {
                file: m.parsed.file_name.clone(),
                reason: format!(
                    "confidence {}% below threshold {}%",
                    m.parsed.confidence, options.min_confidence
                ),
            });
            continue;
        }

        if options.preview {
            report.organized += 1;
            report.matches.push(m);
            continue;
        }

        match move_file(&m, &root, options.duplicates).await {
            Ok(MoveOutcome::Moved(target)) => {
                info!(
                    file = %m.parsed.file_name,
                    target = %target.display(),
                    "Moved file"
                );
                report.organized += 1;
                report.matches.push(m);
            }
            Ok(MoveOutcome::SkippedExisting) => {
                info!(file = %m.parsed.file_name, "Skipped, target already exists");
                report.skipped += 1;
                report.skipped_files.push(SkippedFile {
                    file: m.parsed.file_name.clone(),
                    reason: "target already exists".to_string(),
                });
            }
            Err(e) => {
                warn!(file = %m.parsed.file_name, error = %e, "Failed to organize file");
                report.errors += 1;
                report.error_files.push(ErrorFile {
                    file: m.parsed.file_name.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    report
}

enum MoveOutcome {
    Moved(PathBuf),
    SkippedExisting,
}

async fn move_file(
    m: &AnimeMatch,
    root: &Path,
    policy: DuplicatePolicy,
) -> Result<MoveOutcome> {
    let target_dir = root.join(&m.target_relative_path);
    let target_path = target_dir.join(canonical_file_name(m));

    tokio::fs::create_dir_all(&target_dir)
        .await
        .with_context(|| format!("failed to create directory {}", target_dir.display()))?;

    if target_path.exists() {
        return handle_duplicate(&m.parsed.original_path, &target_path, policy).await;
    }

    tokio::fs::rename(&m.parsed.original_path, &target_path)
        .await
        .with_context(|| format!("failed to move file to {}", target_path.display()))?;
    Ok(MoveOutcome::Moved(target_path))
}

async fn handle_duplicate(
    source: &Path,
    target: &Path,
    policy: DuplicatePolicy,
) -> Result<MoveOutcome> {
    match policy {
        DuplicatePolicy::Skip => Ok(MoveOutcome::SkippedExisting),
        DuplicatePolicy::Overwrite => {
            debug!(target = %target.display(), "Overwriting existing file");
            tokio::fs::rename(source, target)
                .await
                .with_context(|| format!("failed to overwrite {}", target.display()))?;
            Ok(MoveOutcome::Moved(target.to_path_buf()))
        }
        DuplicatePolicy::Rename => {
            let alternative = find_available_name(target);
            debug!(target = %alternative.display(), "Renaming to avoid collision");
            tokio::fs::rename(source, &alternative)
                .await
                .with_context(|| format!("failed to move file to {}", alternative.display()))?;
            Ok(MoveOutcome::Moved(alternative))
        }
    }
}

/// First ` (n)`-suffixed sibling of `path` that does not exist yet
fn find_available_name(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str());

    let mut counter = 1;
    loop {
        let candidate = match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, counter, ext)),
            None => dir.join(format!("{} ({})", stem, counter)),
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Render the preview of an organize run, grouped series -> season -> episode
pub fn preview_report(matches: &[AnimeMatch], options: &OrganizeOptions) -> String {
    let accepted: Vec<&AnimeMatch> = matches
        .iter()
        .filter(|m| m.parsed.confidence >= options.min_confidence)
        .collect();
    let below: Vec<&AnimeMatch> = matches
        .iter()
        .filter(|m| m.parsed.confidence < options.min_confidence)
        .collect();

    let mut report = String::new();
    report.push_str("Organization preview\n");
    report.push_str("====================\n");
    report.push_str(&format!("Files analyzed:    {}\n", matches.len()));
    report.push_str(&format!(
        "Will be organized: {} (confidence >= {}%)\n",
        accepted.len(),
        options.min_confidence
    ));
    report.push_str(&format!("Will be skipped:   {}\n", below.len()));
    report.push_str(&format!("Library root:      {}\n", options.library_root().display()));

    if !accepted.is_empty() {
        report.push('\n');
        // Group by series, preserving first-seen order.
        let mut series: Vec<(&str, Vec<&AnimeMatch>)> = Vec::new();
        for m in accepted.iter().copied() {
            match series.iter_mut().find(|(name, _)| *name == m.normalized_name) {
                Some((_, group)) => group.push(m),
                None => series.push((m.normalized_name.as_str(), vec![m])),
            }
        }

        for (name, group) in series {
            report.push_str(&format!("{}/\n", name));
            let mut seasons: Vec<(Option<u32>, Vec<&AnimeMatch>)> = Vec::new();
            for m in group {
                match seasons.iter_mut().find(|(s, _)| *s == m.parsed.season) {
                    Some((_, entries)) => entries.push(m),
                    None => seasons.push((m.parsed.season, vec![m])),
                }
            }
            for (season, mut entries) in seasons {
                let indent = if let Some(season) = season {
                    report.push_str(&format!("  Season {}/\n", season));
                    "    "
                } else {
                    "  "
                };
                entries.sort_by_key(|m| m.parsed.episode);
                for m in entries {
                    let language = m
                        .parsed
                        .language
                        .map(|l| format!(" [{}]", l))
                        .unwrap_or_default();
                    report.push_str(&format!(
                        "{}E{:02}{} ({}%) - {}\n",
                        indent, m.parsed.episode, language, m.parsed.confidence, m.parsed.file_name
                    ));
                }
            }
        }
    }

    if !below.is_empty() {
        report.push_str(&format!(
            "\nSkipped (confidence < {}%):\n",
            options.min_confidence
        ));
        for m in below {
            report.push_str(&format!(
                "  {} ({}%, rule: {})\n",
                m.parsed.file_name,
                m.parsed.confidence,
                m.parsed.pattern_id.unwrap_or("none")
            ));
        }
    }

    report
}
