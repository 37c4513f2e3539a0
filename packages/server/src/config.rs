use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => anyhow::bail!(
                "API_ENV must be one of development/staging/production, got '{other}'"
            ),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub env: Environment,
    pub api_prefix: String,
    pub redis_url: String,
    pub redis_max_connections: u32,
    pub rate_limit_enabled: bool,
    pub worker_enabled: bool,
    /// Seconds the worker sleeps between polls when the queue is empty.
    pub worker_poll_interval: f64,
    /// Optional bound on the total queue backlog. `None` means unbounded;
    /// admission past the bound fails with QUEUE_FULL.
    pub queue_max_depth: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("API_PORT must be a valid port number")?,
            env: Environment::parse(
                &env::var("API_ENV").unwrap_or_else(|_| "development".to_string()),
            )?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/v1".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            redis_max_connections: env::var("REDIS_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("REDIS_MAX_CONNECTIONS must be a number")?,
            rate_limit_enabled: parse_bool(
                &env::var("RATE_LIMIT_ENABLED").unwrap_or_else(|_| "true".to_string()),
            )
            .context("RATE_LIMIT_ENABLED must be a boolean")?,
            worker_enabled: parse_bool(
                &env::var("WORKER_ENABLED").unwrap_or_else(|_| "true".to_string()),
            )
            .context("WORKER_ENABLED must be a boolean")?,
            worker_poll_interval: env::var("WORKER_POLL_INTERVAL")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .context("WORKER_POLL_INTERVAL must be a number of seconds")?,
            queue_max_depth: match env::var("QUEUE_MAX_DEPTH") {
                Ok(raw) => Some(raw.parse().context("QUEUE_MAX_DEPTH must be a number")?),
                Err(_) => None,
            },
        })
    }
}

impl Default for Config {
    /// Defaults mirroring `from_env` with no variables set.
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            env: Environment::Development,
            api_prefix: "/v1".to_string(),
            redis_url: "redis://localhost:6379/0".to_string(),
            redis_max_connections: 100,
            rate_limit_enabled: true,
            worker_enabled: true,
            worker_poll_interval: 0.5,
            queue_max_depth: None,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}
