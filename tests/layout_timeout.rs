use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE, header::HOST},
    routing::get,
};
use pumpkin::{
    application::{
        layout::{HandlerRegistry, LayoutClient},
        page::PageService,
        render::{ComponentRegistry, ComponentRenderer},
    },
    config::Settings,
    infra::{
        http::{HttpState, build_router},
        layout_http::ReqwestLayoutTransport,
    },
};
use tower::ServiceExt;

const LAYOUT: &str = r#"{"name":"home","components":[{"name":"Hero","fields":{"title":"Welcome"}}]}"#;

async fn layout_service(delay: Duration) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub layout service");
    let addr = listener.local_addr().expect("stub address");
    let router = Router::new().route(
        "/layout",
        get(move || async move {
            tokio::time::sleep(delay).await;
            ([(CONTENT_TYPE, "application/json")], LAYOUT)
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("stub layout service");
    });
    addr
}

fn app(addr: SocketAddr, sitecore_extra: &str) -> Router {
    let settings = Settings::from_toml(&format!(
        r#"
        [sitecore]
        api_key = "key"
        layout_service_uri = "http://{addr}/layout"
        default_site_name = "website"
        {sitecore_extra}
        "#
    ))
    .expect("valid settings");

    let registry = HandlerRegistry::from_settings(&settings.sitecore).expect("valid registry");
    let transport = Arc::new(
        ReqwestLayoutTransport::new(settings.sitecore.max_layout_bytes).expect("http client"),
    );
    let client = LayoutClient::new(
        registry,
        transport,
        LayoutClient::process_defaults(&settings.sitecore),
    );
    let pages = PageService::new(
        client,
        ComponentRenderer::new(ComponentRegistry::standard()),
    );
    build_router(HttpState::new(&settings, pages))
}

fn home() -> Request<Body> {
    Request::builder()
        .uri("/")
        .header(HOST, "www.example.test")
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn slow_layout_service_times_out_with_gateway_timeout() {
    let addr = layout_service(Duration::from_millis(200)).await;

    let started = Instant::now();
    let response = app(addr, "layout_timeout_ms = 50")
        .oneshot(home())
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(
        started.elapsed() < Duration::from_millis(190),
        "request waited for the slow upstream: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn layout_service_within_the_timeout_renders() {
    let addr = layout_service(Duration::from_millis(10)).await;

    let response = app(addr, "layout_timeout_ms = 2000")
        .oneshot(home())
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_layout_document_is_rejected() {
    let addr = layout_service(Duration::from_millis(0)).await;

    let response = app(addr, "max_layout_bytes = 32")
        .oneshot(home())
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
