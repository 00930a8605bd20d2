use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Executor routes are
    /// exempt because they wait on downstream generation jobs.
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_secs("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs = env_secs("SHUTDOWN_TIMEOUT_SECS", 30);

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Settings of the workflow-executor façade.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base URL of the generation backend, without trailing slash.
    pub backend_url: String,
    /// Wait before the first status poll.
    pub poll_initial_delay: Duration,
    pub poll_interval: Duration,
    /// Give up polling after this long and answer 504.
    pub poll_timeout: Duration,
    /// Per-request timeout of calls to the backend.
    pub http_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080".into(),
            poll_initial_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(300),
        }
    }
}

impl ExecutorConfig {
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `BACKEND_URL`                  | `http://localhost:8080` |
    /// | `EXECUTOR_POLL_DELAY_SECS`     | `2`                     |
    /// | `EXECUTOR_POLL_INTERVAL_SECS`  | `5`                     |
    /// | `EXECUTOR_POLL_TIMEOUT_SECS`   | `300`                   |
    /// | `EXECUTOR_HTTP_TIMEOUT_SECS`   | `300`                   |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend_url = std::env::var("BACKEND_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);

        Self {
            backend_url,
            poll_initial_delay: Duration::from_secs(env_secs("EXECUTOR_POLL_DELAY_SECS", 2)),
            poll_interval: Duration::from_secs(env_secs("EXECUTOR_POLL_INTERVAL_SECS", 5)),
            poll_timeout: Duration::from_secs(env_secs("EXECUTOR_POLL_TIMEOUT_SECS", 300)),
            http_timeout: Duration::from_secs(env_secs("EXECUTOR_HTTP_TIMEOUT_SECS", 300)),
        }
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}
