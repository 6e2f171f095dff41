//! Fixed genre table for genre-constrained search
//!
//! MyAnimeList genre ids change rarely enough that a static table beats a
//! discovery request on every run. Validation happens locally; only the
//! mapped ids travel to the API.

/// A known genre with its MyAnimeList id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenreInfo {
    pub id: u32,
    pub name: &'static str,
}

pub const GENRES: &[GenreInfo] = &[
    GenreInfo { id: 1, name: "Action" },
    GenreInfo { id: 2, name: "Adventure" },
    GenreInfo { id: 4, name: "Comedy" },
    GenreInfo { id: 8, name: "Drama" },
    GenreInfo { id: 10, name: "Fantasy" },
    GenreInfo { id: 14, name: "Horror" },
    GenreInfo { id: 22, name: "Romance" },
    GenreInfo { id: 24, name: "Sci-Fi" },
    GenreInfo { id: 36, name: "Slice of Life" },
    GenreInfo { id: 37, name: "Supernatural" },
    GenreInfo { id: 41, name: "Thriller" },
    GenreInfo { id: 9, name: "Ecchi" },
    GenreInfo { id: 26, name: "School" },
    GenreInfo { id: 23, name: "Historical" },
    GenreInfo { id: 18, name: "Mecha" },
    GenreInfo { id: 19, name: "Music" },
    GenreInfo { id: 7, name: "Mystery" },
    GenreInfo { id: 20, name: "Parody" },
    GenreInfo { id: 21, name: "Samurai" },
    GenreInfo { id: 29, name: "Space" },
    GenreInfo { id: 31, name: "Super Power" },
    GenreInfo { id: 32, name: "Vampire" },
    GenreInfo { id: 30, name: "Sports" },
    GenreInfo { id: 38, name: "Military" },
    GenreInfo { id: 39, name: "Police" },
    GenreInfo { id: 40, name: "Psychological" },
];

/// Requested genre names split into recognized and unknown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreValidation {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

/// Validate genre names against the table, case-insensitively.
/// Input spelling is preserved in the output buckets.
pub fn validate_genres(genres: &[String]) -> GenreValidation {
    let mut result = GenreValidation::default();
    for genre in genres {
        let known = GENRES
            .iter()
            .any(|g| g.name.eq_ignore_ascii_case(genre.trim()));
        if known {
            result.valid.push(genre.clone());
        } else {
            result.invalid.push(genre.clone());
        }
    }
    result
}

/// Map genre names to their API ids, skipping unknown names
pub fn genre_ids(names: &[String]) -> Vec<u32> {
    names
        .iter()
        .filter_map(|name| {
            GENRES
                .iter()
                .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
                .map(|g| g.id)
        })
        .collect()
}

/// Split a comma-separated genre argument into trimmed names
pub fn parse_genre_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect()
}
