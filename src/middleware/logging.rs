//! Logging middleware
//!
//! Logs every request on arrival and its status on completion.

use axum::extract::{ConnectInfo, Request};
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use log::{info, warn};
use std::net::SocketAddr;
use std::time::Instant;

/// Log a request and the response it produced
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client = client_label(&request);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    info!(
        "[HTTP] {} {} from {} ({})",
        method, uri, client, user_agent
    );

    let response = next.run(request).await;
    let status = response.status();
    if status.is_server_error() || status.is_client_error() {
        warn!(
            "[HTTP] {} {} -> {} in {:?}",
            method,
            uri.path(),
            status,
            started.elapsed()
        );
    } else {
        info!(
            "[HTTP] {} {} -> {} in {:?}",
            method,
            uri.path(),
            status,
            started.elapsed()
        );
    }

    response
}

fn client_label(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
