//! Shared fixtures for the integration tests: an in-process HTTP server on
//! an ephemeral port and a few client builders.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use lib_pos::retrieve::ky_http::{ApiClient, ClientOptions};

/// Serves `router` on `127.0.0.1:<ephemeral>` and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{}", addr)
}

/// A base URL nobody listens on.
pub async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

/// Options without retries so failures surface on the first attempt.
pub fn quick_options(timeout_ms: u64) -> ClientOptions {
    ClientOptions {
        timeout: Duration::from_millis(timeout_ms),
        max_retries: 0,
        ..Default::default()
    }
}

pub fn client(base: &str) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(base, quick_options(2000)).expect("client"))
}
