//! OAuth2 client-credentials token exchange

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ApiCredentials;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("access token request failed with status code {0}")]
    Status(u16),
    #[error("access token not obtained")]
    MissingToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// `Basic` authorization value for a client id/secret pair
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let encoded = BASE64_STANDARD.encode(format!("{}:{}", client_id, client_secret));
    format!("Basic {}", encoded)
}

/// Exchange the client credentials for a bearer token
pub fn fetch_access_token(client: &Client, creds: &ApiCredentials) -> Result<String, AuthError> {
    let response = client
        .post(&creds.token_url)
        .header(AUTHORIZATION, basic_auth_header(&creds.client_id, &creds.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()?;

    let status = response.status();
    if status.as_u16() != 200 {
        return Err(AuthError::Status(status.as_u16()));
    }

    let body: TokenResponse = response.json()?;
    match body.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MissingToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::testing::{credentials, start_server};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{basic_auth, body_string_contains, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn token_mock(response: ResponseTemplate) -> Mock {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(basic_auth("client", "secret"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(response)
    }

    #[test]
    fn test_basic_auth_header() {
        // "client:secret" in base64
        assert_eq!(basic_auth_header("client", "secret"), "Basic Y2xpZW50OnNlY3JldA==");
    }

    #[test]
    fn test_token_response_without_token() {
        let body: TokenResponse = serde_json::from_str(r#"{"token_type":"bearer"}"#).unwrap();
        assert!(body.access_token.is_none());
    }

    #[test]
    fn test_fetch_access_token() {
        let (_runtime, server) = start_server(vec![token_mock(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-123", "token_type": "bearer"})),
        )]);
        let http = ApiClient::http_client(Duration::from_secs(5)).unwrap();

        let token = fetch_access_token(&http, &credentials(&server)).unwrap();
        assert_eq!(token, "tok-123");
    }

    #[test]
    fn test_fetch_access_token_rejected() {
        let (_runtime, server) = start_server(vec![token_mock(ResponseTemplate::new(401))]);
        let http = ApiClient::http_client(Duration::from_secs(5)).unwrap();

        let err = fetch_access_token(&http, &credentials(&server)).unwrap_err();
        assert!(matches!(err, AuthError::Status(401)));
    }

    #[test]
    fn test_fetch_access_token_missing_token() {
        let (_runtime, server) = start_server(vec![token_mock(
            ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer"})),
        )]);
        let http = ApiClient::http_client(Duration::from_secs(5)).unwrap();

        let err = fetch_access_token(&http, &credentials(&server)).unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
    }
}
