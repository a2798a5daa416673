//! Configuration module
//!
//! Environment-driven configuration for the validator, queue, and worker,
//! with defaulted constants and a `validate()` pass.

use std::env;
use std::time::Duration;

use crate::placeholder::DEFAULT_PLACEHOLDER_BASE_URL;

const PROBE_TIMEOUT_SECS: u64 = 10;
const PROBE_MAX_REDIRECTS: usize = 5;
const VALIDATOR_CONCURRENCY: usize = 8;
const QUEUE_REDELIVERY_SECS: u64 = 300;
const QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const WORKER_CONCURRENCY: usize = 4;
const MAX_SCAN_DEPTH: usize = 6;

/// Collections scanned by default. Changing scope means changing this list
/// (via MEDIA_COLLECTIONS), not the algorithm.
pub const DEFAULT_COLLECTIONS: [&str; 5] = [
    "unified_yacht_experiences",
    "yacht_profiles",
    "products_add_ons",
    "articles_and_guides",
    "event_announcements",
];

/// Queue transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub collections: Vec<String>,
    /// Base URL prefixed onto relative paths during repair. No trailing slash.
    pub public_base_url: String,
    pub placeholder_base_url: String,
    pub probe_timeout: Duration,
    pub probe_max_redirects: usize,
    pub validator_concurrency: usize,
    pub max_scan_depth: usize,
    pub queue_backend: QueueBackend,
    pub queue_redelivery: Duration,
    pub queue_poll_interval: Duration,
    pub worker_concurrency: usize,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let collections: Vec<String> = env::var("MEDIA_COLLECTIONS")
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect());

        let queue_backend = match env::var("QUEUE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => QueueBackend::Memory,
            _ => QueueBackend::Postgres,
        };

        let mut public_base_url = env::var("PUBLIC_BASE_URL")
            .map_err(|_| anyhow::anyhow!("PUBLIC_BASE_URL must be set for relative-URL repair"))?;
        while public_base_url.ends_with('/') {
            public_base_url.pop();
        }

        let config = Config {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            collections,
            public_base_url,
            placeholder_base_url: env::var("PLACEHOLDER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PLACEHOLDER_BASE_URL.to_string()),
            probe_timeout: Duration::from_secs(
                env::var("PROBE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| PROBE_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(PROBE_TIMEOUT_SECS),
            ),
            probe_max_redirects: env::var("PROBE_MAX_REDIRECTS")
                .unwrap_or_else(|_| PROBE_MAX_REDIRECTS.to_string())
                .parse()
                .unwrap_or(PROBE_MAX_REDIRECTS),
            validator_concurrency: env::var("VALIDATOR_CONCURRENCY")
                .unwrap_or_else(|_| VALIDATOR_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(VALIDATOR_CONCURRENCY),
            max_scan_depth: env::var("MAX_SCAN_DEPTH")
                .unwrap_or_else(|_| MAX_SCAN_DEPTH.to_string())
                .parse()
                .unwrap_or(MAX_SCAN_DEPTH),
            queue_backend,
            queue_redelivery: Duration::from_secs(
                env::var("QUEUE_REDELIVERY_SECS")
                    .unwrap_or_else(|_| QUEUE_REDELIVERY_SECS.to_string())
                    .parse()
                    .unwrap_or(QUEUE_REDELIVERY_SECS),
            ),
            queue_poll_interval: Duration::from_millis(
                env::var("QUEUE_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| QUEUE_POLL_INTERVAL_MS.to_string())
                    .parse()
                    .unwrap_or(QUEUE_POLL_INTERVAL_MS),
            ),
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .unwrap_or_else(|_| WORKER_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(WORKER_CONCURRENCY),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }
        if self.collections.is_empty() {
            return Err(anyhow::anyhow!("MEDIA_COLLECTIONS must not be empty"));
        }
        if !self.public_base_url.starts_with("http://")
            && !self.public_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "PUBLIC_BASE_URL must start with http:// or https://"
            ));
        }
        if self.validator_concurrency == 0 || self.worker_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "VALIDATOR_CONCURRENCY and WORKER_CONCURRENCY must be at least 1"
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
