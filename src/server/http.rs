// src/server/http.rs

//! The HTTP adapters: the proxy surface taking the target from the `url`
//! query parameter, and the admin purge endpoint.

use super::context::ServerContext;
use crate::core::errors::BundleCacheError;
use crate::core::gateway::MAX_BUNDLE_SIZE;
use crate::core::metrics;
use crate::core::model::{self, Headers, ProxyRequest, ProxyResponse};
use crate::core::state::ProxyState;
use anyhow::Result;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Response headers never copied through: they describe the hop, not the
/// content, and axum recomputes framing itself.
const SKIPPED_RESPONSE_HEADERS: [&str; 4] = [
    "connection",
    "transfer-encoding",
    "content-length",
    "keep-alive",
];

pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/system/admin/cache/cleanup", post(admin_purge))
        .fallback(proxy_handler)
        .with_state(state)
}

/// Serves the proxy listener until a shutdown signal, then drains the
/// background tasks.
pub async fn serve(ctx: ServerContext) -> Result<()> {
    let ServerContext {
        state,
        listener,
        shutdown_tx,
        mut background_tasks,
        ..
    } = ctx;

    let app = router(state);
    let shutdown_for_signal = shutdown_tx.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received.");
            let _ = shutdown_for_signal.send(());
        })
        .await;

    while background_tasks.join_next().await.is_some() {}
    info!("All background tasks drained, exiting.");
    serve_result.map_err(Into::into)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Any-method handler: the request is *the* HTTP transaction to proxy, with
/// the target taken from the `url` query parameter.
async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    metrics::PROXIED_REQUESTS_TOTAL.inc();

    let (parts, body) = request.into_parts();

    let target_url = parts
        .uri
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        });
    let Some(target_url) = target_url else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "url parameter is required",
        );
    };

    let parsed = match Url::parse(&target_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                &format!("invalid url: {e}"),
            );
        }
    };

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    let content_type = model::header_value(&headers, "Content-Type")
        .unwrap_or_default()
        .to_string();

    let body = match axum::body::to_bytes(body, MAX_BUNDLE_SIZE).await {
        Ok(body) => body,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                &format!("failed to read request body: {e}"),
            );
        }
    };

    let proxy_request = ProxyRequest {
        method: parts.method.as_str().to_string(),
        url: parsed.to_string(),
        content_length: body.len() as i64,
        content_type,
        headers,
        body,
    };

    match state.service.handle(&proxy_request).await {
        Ok(response) => into_http_response(response),
        Err(e) => {
            warn!("Proxy request failed for {}: {}", proxy_request.url, e);
            let status = match e {
                BundleCacheError::InvalidRequest(_) | BundleCacheError::InvalidUrl(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            error_response(status, "proxy_failed", &e.to_string())
        }
    }
}

/// Admin surface: purge every cache record, queued reservation and pending
/// mark. Safe to call while traffic is flowing; stragglers from racing
/// workers are reclaimed by the next sweep.
async fn admin_purge(State(state): State<Arc<ProxyState>>) -> Response {
    info!("Admin cache purge requested.");
    let removed = state.purge_all().await;
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "purged_records": removed })),
    )
        .into_response()
}

fn into_http_response(response: ProxyResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);

    for (name, values) in &response.headers {
        if SKIPPED_RESPONSE_HEADERS
            .iter()
            .any(|skipped| name.eq_ignore_ascii_case(skipped))
        {
            continue;
        }
        for value in values {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                builder = builder.header(name, value);
            }
        }
    }
    if !response.content_type.is_empty()
        && model::header_value(&response.headers, "Content-Type").is_none()
    {
        builder = builder.header("Content-Type", response.content_type.as_str());
    }

    match builder.body(Body::from(response.body)) {
        Ok(http_response) => http_response,
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &format!("failed to assemble response: {e}"),
        ),
    }
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "message": message })),
    )
        .into_response()
}
