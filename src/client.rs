//! Bearer-authenticated access to the paginated collection endpoints

use reqwest::blocking::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::Endpoint;

pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status code {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Body(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status(code) => Some(*code),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            FetchError::Body(_) => None,
        }
    }
}

/// Something that can report record counts and serve pages of records
pub trait PageSource {
    /// Total record count from the endpoint's `/count` companion, if it has one
    fn count(&self, endpoint: &Endpoint) -> Option<u64>;

    /// Fetch one zero-based page of at most `limit` records
    fn fetch_page(&self, endpoint: &Endpoint, page: u64, limit: u64)
        -> Result<Vec<Record>, FetchError>;
}

pub struct ApiClient {
    client: Client,
    api_base: String,
    token: String,
}

impl ApiClient {
    pub fn new(client: Client, api_base: &str, token: String) -> Self {
        Self {
            client,
            api_base: api_base.to_string(),
            token,
        }
    }

    /// Blocking HTTP client used for both token exchange and data requests
    pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(concat!("practice-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
    }

    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json()?)
    }
}

impl PageSource for ApiClient {
    fn count(&self, endpoint: &Endpoint) -> Option<u64> {
        let url = format!("{}/count", endpoint.url(&self.api_base));
        match self.get_json(&url, &[]) {
            Ok(body) => parse_count(&body),
            Err(e) => {
                debug!(endpoint = endpoint.label, error = %e, "count request failed");
                None
            }
        }
    }

    fn fetch_page(
        &self,
        endpoint: &Endpoint,
        page: u64,
        limit: u64,
    ) -> Result<Vec<Record>, FetchError> {
        let query = [
            ("_page", page.to_string()),
            ("_limit", limit.to_string()),
            ("_fields", endpoint.fields.as_query()),
        ];
        let body = self.get_json(&endpoint.url(&self.api_base), &query)?;
        extract_records(body, endpoint.records_key)
    }
}

/// Read `response.count` as a number or numeric string
pub fn parse_count(body: &Value) -> Option<u64> {
    match body.get("response")?.get("count")? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pull the record array out of a page body: `response` or `response.<key>`
pub fn extract_records(body: Value, records_key: Option<&str>) -> Result<Vec<Record>, FetchError> {
    let Value::Object(mut root) = body else {
        return Err(FetchError::Body("expected a JSON object".to_string()));
    };
    let mut response = root
        .remove("response")
        .ok_or_else(|| FetchError::Body("missing `response` field".to_string()))?;

    if let Some(key) = records_key {
        response = match response {
            Value::Object(mut nested) => nested.remove(key).unwrap_or(Value::Array(Vec::new())),
            _ => return Err(FetchError::Body(format!("missing `response.{}` field", key))),
        };
    }

    match response {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(FetchError::Body(format!(
                    "record {} is not an object: {}",
                    idx, other
                ))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(FetchError::Body("`response` is not an array".to_string())),
    }
}
