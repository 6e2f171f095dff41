//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::jikan::DEFAULT_BASE_URL;
use crate::services::rate_limiter::LookupPacer;
use crate::services::validator::ValidatorConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Metadata API base URL
    pub jikan_base_url: String,

    /// Sustained lookup requests per second
    pub requests_per_second: u32,

    /// Lookup burst capacity
    pub burst_size: u32,

    /// Lookup cache entry lifetime
    pub cache_ttl: Duration,

    /// Lookup cache capacity (entries)
    pub cache_capacity: usize,

    /// Search results requested per query
    pub search_limit: usize,

    /// Files validated concurrently per batch
    pub batch_size: usize,

    /// Pause between validation batches
    pub batch_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            jikan_base_url: env::var("JIKAN_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),

            requests_per_second: env::var("JIKAN_REQUESTS_PER_SECOND")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Invalid JIKAN_REQUESTS_PER_SECOND")?,

            burst_size: env::var("JIKAN_BURST_SIZE")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid JIKAN_BURST_SIZE")?,

            cache_ttl: Duration::from_secs(
                env::var("LOOKUP_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("Invalid LOOKUP_CACHE_TTL_SECS")?,
            ),

            cache_capacity: env::var("LOOKUP_CACHE_CAPACITY")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("Invalid LOOKUP_CACHE_CAPACITY")?,

            search_limit: env::var("SEARCH_LIMIT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid SEARCH_LIMIT")?,

            batch_size: env::var("VALIDATION_BATCH_SIZE")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid VALIDATION_BATCH_SIZE")?,

            batch_delay: Duration::from_millis(
                env::var("VALIDATION_BATCH_DELAY_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .context("Invalid VALIDATION_BATCH_DELAY_MS")?,
            ),
        })
    }

    pub fn pacer(&self) -> LookupPacer {
        LookupPacer::new(self.requests_per_second, self.burst_size)
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            search_limit: self.search_limit,
            batch_size: self.batch_size.max(1),
            batch_delay: self.batch_delay,
            ..ValidatorConfig::default()
        }
    }
}
