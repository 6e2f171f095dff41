//! Jikan API client for anime metadata
//!
//! Jikan is a free MyAnimeList mirror that doesn't require authentication.
//! Base URL: https://api.jikan.moe/v4
//!
//! Only the fields the pipeline consumes are modeled; everything else in the
//! response is ignored.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::rate_limiter::{LookupPacer, RetryPolicy, is_transient_status};

pub const DEFAULT_BASE_URL: &str = "https://api.jikan.moe/v4";

/// One anime entry as returned by search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(rename = "mal_id")]
    pub id: u64,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    /// Total episode count, absent for airing or unknown series
    pub episodes: Option<u32>,
    /// Community score out of 10
    pub score: Option<f64>,
    /// Airing season name ("winter", "spring", ...)
    pub season: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<CandidateRecord>,
}

#[derive(Debug, Deserialize)]
struct SingleResponse {
    data: CandidateRecord,
}

/// Jikan API client with built-in request pacing
pub struct JikanClient {
    http: Client,
    pacer: LookupPacer,
    retry: RetryPolicy,
    base_url: String,
}

impl JikanClient {
    pub fn new(base_url: impl Into<String>, pacer: LookupPacer) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            pacer,
            retry: RetryPolicy::default(),
            base_url: base_url.into(),
        }
    }

    /// Paced GET with retry on transport errors and transient statuses.
    /// Non-transient bad statuses come back as a normal response for the
    /// caller to interpret.
    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<Response> {
        self.retry
            .run(operation, || self.attempt(url, query))
            .await
    }

    async fn attempt(&self, url: &str, query: &[(&str, &str)]) -> Result<Response> {
        self.pacer.acquire().await;
        debug!(url = %url, "Requesting metadata");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .context("metadata request failed")?;
        if is_transient_status(response.status()) {
            anyhow::bail!("metadata service returned {}", response.status());
        }
        Ok(response)
    }

    async fn get_list(
        &self,
        url: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<Vec<CandidateRecord>> {
        let response = self.fetch(url, query, operation).await?;
        if !response.status().is_success() {
            anyhow::bail!("Jikan request failed with status: {}", response.status());
        }

        let parsed: ListResponse = response
            .json()
            .await
            .context("Failed to parse Jikan response")?;
        debug!(count = parsed.data.len(), operation = operation, "Jikan returned results");
        Ok(parsed.data)
    }

    /// Search anime by name, most relevant first
    pub async fn search_anime(&self, query: &str, limit: usize) -> Result<Vec<CandidateRecord>> {
        info!(query = %query, limit = limit, "Searching Jikan");
        let url = format!("{}/anime", self.base_url);
        let limit = limit.to_string();
        self.get_list(&url, &[("q", query), ("limit", limit.as_str())], "jikan search")
            .await
    }

    /// Search anime constrained to the given MyAnimeList genre ids
    pub async fn search_by_genre(
        &self,
        genre_ids: &[u32],
        limit: usize,
    ) -> Result<Vec<CandidateRecord>> {
        let genres = genre_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        info!(genres = %genres, limit = limit, "Searching Jikan by genre");

        let url = format!("{}/anime", self.base_url);
        let limit = limit.to_string();
        self.get_list(
            &url,
            &[
                ("genres", genres.as_str()),
                ("limit", limit.as_str()),
                ("order_by", "score"),
                ("sort", "desc"),
            ],
            "jikan genre search",
        )
        .await
    }

    /// Top-rated anime
    pub async fn top_anime(&self, limit: usize) -> Result<Vec<CandidateRecord>> {
        info!(limit = limit, "Fetching top anime from Jikan");
        let url = format!("{}/top/anime", self.base_url);
        let limit = limit.to_string();
        self.get_list(&url, &[("limit", limit.as_str())], "jikan top").await
    }

    /// Fetch a single anime by MyAnimeList id
    pub async fn get_anime(&self, id: u64) -> Result<Option<CandidateRecord>> {
        let url = format!("{}/anime/{}", self.base_url, id);
        let response = self.fetch(&url, &[], "jikan anime by id").await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Jikan get anime failed with status: {}", response.status());
        }

        let parsed: SingleResponse = response
            .json()
            .await
            .context("Failed to parse Jikan anime")?;
        Ok(Some(parsed.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search_response() {
        let body = r#"{
            "data": [{
                "mal_id": 20,
                "title": "Naruto",
                "title_english": "Naruto",
                "title_japanese": "ナルト",
                "episodes": 220,
                "score": 8.01,
                "season": "fall",
                "year": 2002,
                "source": "Manga"
            }],
            "pagination": {"has_next_page": false}
        }"#;

        let parsed: ListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        let record = &parsed.data[0];
        assert_eq!(record.id, 20);
        assert_eq!(record.title, "Naruto");
        assert_eq!(record.episodes, Some(220));
        assert_eq!(record.year, Some(2002));
    }

    #[test]
    fn test_deserialize_empty_data() {
        let parsed: ListResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parsed.data.is_empty());

        // Some error payloads omit "data" entirely.
        let parsed: ListResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.data.is_empty());
    }
}
