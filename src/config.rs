//! Run configuration, built once in `main` and passed to every stage

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{default_endpoints, Endpoint};

pub const DEFAULT_DATA_DIR: &str = "data/api";
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Settings shared by all stages of a run
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for page directories and merged files
    pub data_dir: PathBuf,
    pub page_size: u64,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Extra attempts for a failed page-count request
    pub search_retries: u32,
    pub endpoints: Vec<Endpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(60),
            search_retries: 2,
            endpoints: default_endpoints(),
        }
    }
}

impl Config {
    /// Restrict the run to the endpoints whose labels are given
    /// (case-insensitive). An empty filter keeps every endpoint.
    pub fn select_endpoints(&mut self, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        for label in labels {
            if !self.endpoints.iter().any(|e| e.label.eq_ignore_ascii_case(label)) {
                let known: Vec<&str> = self.endpoints.iter().map(|e| e.label).collect();
                bail!("Unknown endpoint '{}'. Known endpoints: {}", label, known.join(", "));
            }
        }
        self.endpoints
            .retain(|e| labels.iter().any(|l| e.label.eq_ignore_ascii_case(l)));
        Ok(())
    }
}

/// OAuth client credentials and API location
#[derive(Clone)]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub api_base: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ApiCredentials {
    pub fn from_env() -> Result<Self> {
        let mut api_base = required_env("API_BASE")?;
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Ok(Self {
            client_id: required_env("CLIENT_ID")?,
            client_secret: required_env("CLIENT_SECRET")?,
            token_url: required_env("TOKEN_URL")?,
            api_base,
        })
    }
}

/// SQLite database path from `DATABASE_URL`, with any `sqlite://` prefix removed
pub fn database_path_from_env() -> Result<PathBuf> {
    let url = required_env("DATABASE_URL")?;
    Ok(database_path(&url))
}

fn database_path(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("{} environment variable must be set", name))?;
    if value.trim().is_empty() {
        bail!("{} environment variable is empty", name);
    }
    Ok(value)
}
