//! Bearer tokens for the Google APIs.
//!
//! Either a static token from configuration, or one fetched from the GCE
//! metadata server and cached until shortly before it expires.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::EngineError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(value: String, expires_in: Duration, now: Instant) -> Self {
        Self {
            value,
            refresh_at: now + expires_in.saturating_sub(EXPIRY_MARGIN),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

enum Source {
    Static(String),
    Metadata(Mutex<Option<CachedToken>>),
}

pub struct TokenSource {
    source: Source,
}

impl TokenSource {
    pub fn from_config(access_token: Option<String>) -> Self {
        let source = match access_token {
            Some(token) => Source::Static(token),
            None => Source::Metadata(Mutex::new(None)),
        };
        Self { source }
    }

    /// Current bearer token, refreshing from the metadata server if needed.
    pub async fn token(&self, client: &reqwest::Client) -> Result<String, EngineError> {
        let cache = match &self.source {
            Source::Static(token) => return Ok(token.clone()),
            Source::Metadata(cache) => cache,
        };

        let mut cached = cache.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let response = client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| EngineError::Token(e.to_string()))?;
        if !response.status().is_success() {
            return Err(EngineError::Token(format!(
                "metadata server returned {}",
                response.status()
            )));
        }
        let fetched: MetadataToken = response
            .json()
            .await
            .map_err(|e| EngineError::Token(e.to_string()))?;

        tracing::debug!(expires_in = fetched.expires_in, "Fetched engine access token");
        let token = CachedToken::new(
            fetched.access_token,
            Duration::from_secs(fetched.expires_in),
            Instant::now(),
        );
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}
