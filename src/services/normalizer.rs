//! Series name normalization and lookup variations
//!
//! Two jobs: widen search recall by expanding a parsed name into the spelling
//! variants worth querying, and produce filesystem-safe display titles for
//! confirmed matches.

use once_cell::sync::Lazy;
use regex::Regex;

use super::classifier::clean_series_name;

/// Common fan abbreviations and the full titles they search as.
/// Expansion order is part of the lookup contract: variations are tried in
/// sequence and ties in match score go to the earliest.
const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("SNK", &["Shingeki no Kyojin", "Attack on Titan"]),
    ("NS", &["Naruto Shippuden", "Naruto Shippuuden"]),
    ("HXH", &["Hunter x Hunter"]),
    ("AOT", &["Attack on Titan", "Shingeki no Kyojin"]),
    ("MHA", &["My Hero Academia", "Boku no Hero Academia"]),
];

/// Build the ordered, deduplicated set of query variations for a series name:
/// the name itself, its cleaned form, then any abbreviation expansions.
pub fn variations(name: &str) -> Vec<String> {
    let mut out: Vec<String> = vec![name.to_string()];

    let cleaned = clean_series_name(name);
    if !cleaned.is_empty() && cleaned != name {
        out.push(cleaned);
    }

    let upper = name.trim().to_uppercase();
    for (abbr, expansions) in ABBREVIATIONS {
        if *abbr == upper {
            out.extend(expansions.iter().map(|s| s.to_string()));
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|v| seen.insert(v.clone()));
    out
}

/// Pick the display title for a confirmed series.
///
/// The English title wins only when it is strictly shorter than the native
/// one and carries no colon; a colon marks retitled releases where the native
/// name is the recognizable one.
pub fn preferred_title(native: &str, english: Option<&str>) -> String {
    match english {
        Some(en) if !en.is_empty() && en.len() < native.len() && !en.contains(':') => {
            sanitize_title(en)
        }
        _ => sanitize_title(native),
    }
}

/// Strip characters that are illegal in path components and collapse
/// whitespace. Applied to every name before it becomes part of a target path.
pub fn sanitize_title(name: &str) -> String {
    static ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[:<>"|?*]"#).unwrap());
    let stripped = ILLEGAL.replace_all(name.trim(), "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_variations_include_original_and_cleaned() {
        let vars = variations("Black.Clover");
        assert_eq!(vars, vec!["Black.Clover".to_string(), "Black Clover".to_string()]);
    }

    #[test]
    fn test_variations_expand_abbreviations_in_table_order() {
        let vars = variations("SNK");
        assert_eq!(
            vars,
            vec![
                "SNK".to_string(),
                "Shingeki no Kyojin".to_string(),
                "Attack on Titan".to_string(),
            ]
        );
    }

    #[test]
    fn test_variations_deduplicate() {
        let vars = variations("Naruto");
        assert_eq!(vars, vec!["Naruto".to_string()]);
    }

    #[test]
    fn test_abbreviation_lookup_is_case_insensitive() {
        let vars = variations("mha");
        assert!(vars.contains(&"My Hero Academia".to_string()));
        assert!(vars.contains(&"Boku no Hero Academia".to_string()));
    }

    #[test]
    fn test_preferred_title_uses_shorter_english() {
        let title = preferred_title("Shingeki no Kyojin", Some("Attack on Titan"));
        assert_eq!(title, "Attack on Titan");
    }

    #[test]
    fn test_preferred_title_keeps_native_when_english_has_colon() {
        let title = preferred_title("Kimetsu no Yaiba", Some("Demon Slayer: Kimetsu no Yaiba"));
        assert_eq!(title, "Kimetsu no Yaiba");
    }

    #[test]
    fn test_preferred_title_keeps_native_when_english_longer() {
        let title = preferred_title("Naruto", Some("Naruto the Animated Series"));
        assert_eq!(title, "Naruto");
    }

    #[test]
    fn test_sanitize_title_strips_path_hostile_characters() {
        assert_eq!(sanitize_title("Re:Zero"), "ReZero");
        assert_eq!(sanitize_title("What * If? <TV>"), "What If TV");
        assert_eq!(sanitize_title("  spaced   out  "), "spaced out");
    }
}
