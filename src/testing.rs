//! Shared fixtures for tests that talk to a mock HTTP server

use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer};

use crate::config::ApiCredentials;

/// Start a mock server with the given mocks mounted.
///
/// The server runs on its own thread, so blocking clients can call it from
/// a plain `#[test]` as long as the runtime is kept alive.
pub fn start_server(mocks: Vec<Mock>) -> (Runtime, MockServer) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        for mock in mocks {
            mock.mount(&server).await;
        }
        server
    });
    (runtime, server)
}

pub fn credentials(server: &MockServer) -> ApiCredentials {
    ApiCredentials {
        client_id: "client".into(),
        client_secret: "secret".into(),
        token_url: format!("{}/oauth/token", server.uri()),
        api_base: format!("{}/v1/", server.uri()),
    }
}
