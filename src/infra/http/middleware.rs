use std::{
    net::{IpAddr, SocketAddr},
    time::Instant,
};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE, HOST, SET_COOKIE},
        uri::{Authority, PathAndQuery, Scheme},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    application::{
        error::ErrorReport,
        layout::{X_FORWARDED_HOST, X_FORWARDED_PROTO},
        tracking::{PROBE_CONTENT_TYPE, TrackingId, probe_script},
    },
    domain::{render_mode::is_visitor_identification_probe, request::RequestSnapshot},
};

use super::HttpState;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Scheme and host the visitor actually used, after forwarded headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalOrigin {
    pub scheme: String,
    pub host: Option<String>,
}

impl ExternalOrigin {
    pub fn is_https(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }
}

/// TCP peer of the connection, when the server exposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddress(pub Option<IpAddr>);

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let detail = report
            .as_ref()
            .and_then(ErrorReport::headline)
            .unwrap_or("no diagnostic available")
            .to_string();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };

        if status.is_server_error() {
            error!(
                target = "pumpkin::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "pumpkin::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    } else {
        debug!(
            target = "pumpkin::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request served",
        );
    }

    response
}

/// Apply `X-Forwarded-Proto`/`X-Forwarded-Host` before anything else looks
/// at the request. The `X-Forwarded-For` chain is only passed upstream when
/// forwarded headers are trusted.
pub async fn normalize_forwarded_headers(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let origin = if state.forwarded_headers {
        let origin = forwarded_origin(request.headers(), request.uri());
        apply_origin(&mut request, &origin);
        origin
    } else {
        ExternalOrigin {
            scheme: request.uri().scheme_str().unwrap_or("http").to_string(),
            host: first_value(request.headers(), HOST.as_str()),
        }
    };

    request.extensions_mut().insert(origin);
    request.extensions_mut().insert(ClientAddress(peer));
    next.run(request).await
}

fn forwarded_origin(headers: &HeaderMap, uri: &Uri) -> ExternalOrigin {
    let scheme = first_value(headers, X_FORWARDED_PROTO)
        .map(|scheme| scheme.to_ascii_lowercase())
        .filter(|scheme| scheme == "http" || scheme == "https")
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());
    let host = first_value(headers, X_FORWARDED_HOST).or_else(|| first_value(headers, HOST.as_str()));

    ExternalOrigin { scheme, host }
}

fn apply_origin(request: &mut Request<Body>, origin: &ExternalOrigin) {
    let Some(host) = origin.host.as_deref() else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(host) {
        request.headers_mut().insert(HOST, value);
    }

    let scheme = Scheme::try_from(origin.scheme.as_str());
    let authority = Authority::try_from(host);
    if let (Ok(scheme), Ok(authority)) = (scheme, authority) {
        let mut parts = request.uri().clone().into_parts();
        parts.scheme = Some(scheme);
        parts.authority = Some(authority);
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        if let Ok(uri) = Uri::from_parts(parts) {
            *request.uri_mut() = uri;
        }
    }
}

/// First entry of a comma separated header.
fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Verify or mint the tracking cookie and answer visitor identification probes.
pub async fn track_visitors(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let snapshot = RequestSnapshot::new(
        request.method().clone(),
        request.uri(),
        request.headers(),
    );
    let tracking = TrackingId::from_request(&snapshot);
    let secure = request
        .extensions()
        .get::<ExternalOrigin>()
        .is_some_and(ExternalOrigin::is_https);

    let mut response = if is_visitor_identification_probe(&snapshot) {
        debug!(
            target = "pumpkin::http::tracking",
            path = snapshot.path(),
            "Answering visitor identification probe"
        );
        probe_response(&state)
    } else {
        request.extensions_mut().insert(tracking.clone());
        next.run(request).await
    };

    if let Some(cookie) = tracking.set_cookie_header(secure) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

pub(super) fn probe_response(state: &HttpState) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, PROBE_CONTENT_TYPE),
            (CACHE_CONTROL, "no-store"),
        ],
        probe_script(&state.instance_uri),
    )
        .into_response()
}
