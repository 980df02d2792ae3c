use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use metrics_util::debugging::DebuggingRecorder;
use pumpkin::{
    application::layout::{
        ForwardedContext, HandlerRegistration, HandlerRegistry, LayoutClient, LayoutTransport,
        OutboundLayoutRequest, TransportError, TransportResponse,
    },
    cache::LayoutCache,
    config::CacheSettings,
    domain::{layout::LayoutRequestOptions, request::RequestSnapshot},
};
use url::Url;

struct CountingTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl LayoutTransport for CountingTransport {
    async fn send(
        &self,
        request: OutboundLayoutRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.query_param("item").as_deref() == Some("/broken") {
            return Ok(TransportResponse {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: Bytes::from_static(b"down"),
            });
        }
        Ok(TransportResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(br#"{"components":[]}"#),
        })
    }
}

#[tokio::test]
async fn layout_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let uri = Url::parse("https://cm.example.test/layout").expect("url");
    let registry = HandlerRegistry::builder()
        .add_http_handler(HandlerRegistration::new(
            "default",
            uri,
            Duration::from_secs(1),
        ))
        .as_default_handler()
        .build()
        .expect("registry");
    let transport = Arc::new(CountingTransport {
        calls: AtomicUsize::new(0),
    });
    let cache = Arc::new(LayoutCache::new(&CacheSettings {
        enabled: true,
        capacity: NonZeroUsize::new(1).expect("non-zero"),
        ttl: Duration::from_secs(60),
    }));
    let client = LayoutClient::new(registry, transport.clone(), LayoutRequestOptions::new())
        .with_cache(cache);
    let forwarded = ForwardedContext::from_request(&RequestSnapshot::get("/"), None, None, None);

    for path in ["/one", "/one", "/two"] {
        client
            .fetch(None, &LayoutRequestOptions::new().path(path), &forwarded)
            .await
            .expect("layout document");
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    let failed = client
        .fetch(None, &LayoutRequestOptions::new().path("/broken"), &forwarded)
        .await;
    assert!(failed.is_err());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "pumpkin_layout_cache_hit_total",
        "pumpkin_layout_cache_miss_total",
        "pumpkin_layout_cache_evict_total",
        "pumpkin_layout_fetch_ms",
        "pumpkin_layout_fetch_error_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
