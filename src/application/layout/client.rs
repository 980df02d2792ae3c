use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use metrics::{counter, histogram};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    cache::{LayoutCache, LayoutCacheKey},
    config::SitecoreSettings,
    domain::layout::{LayoutDocument, LayoutRequestOptions},
};

use super::{
    error::LayoutError,
    forwarded::ForwardedContext,
    registry::{HandlerRegistration, HandlerRegistry},
    transport::{LayoutTransport, OutboundLayoutRequest, TransportError, TransportResponse},
};

pub const METRIC_FETCH_MS: &str = "pumpkin_layout_fetch_ms";
pub const METRIC_FETCH_ERROR: &str = "pumpkin_layout_fetch_error_total";
const DETAIL_LIMIT: usize = 256;

/// Fetches layout documents from the registered layout service handlers.
#[derive(Clone)]
pub struct LayoutClient {
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn LayoutTransport>,
    process_defaults: LayoutRequestOptions,
    cache: Option<Arc<LayoutCache>>,
}

impl LayoutClient {
    pub fn new(
        registry: HandlerRegistry,
        transport: Arc<dyn LayoutTransport>,
        process_defaults: LayoutRequestOptions,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            transport,
            process_defaults,
            cache: None,
        }
    }

    /// Process-wide defaults: the default site name and the API key.
    pub fn process_defaults(settings: &SitecoreSettings) -> LayoutRequestOptions {
        let mut defaults = LayoutRequestOptions::new().api_key(settings.api_key.clone());
        defaults.site_name = settings.default_site_name.clone();
        defaults
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<LayoutCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Handler defaults, then process defaults, then `overrides`.
    pub fn effective_options(
        &self,
        handler: &HandlerRegistration,
        overrides: &LayoutRequestOptions,
    ) -> LayoutRequestOptions {
        handler
            .defaults
            .merged_with(&self.process_defaults)
            .merged_with(overrides)
    }

    pub async fn fetch(
        &self,
        handler: Option<&str>,
        overrides: &LayoutRequestOptions,
        forwarded: &ForwardedContext,
    ) -> Result<LayoutDocument, LayoutError> {
        let registration = self.registry.resolve(handler).ok_or_else(|| {
            let name = handler.unwrap_or_default().to_string();
            counter!(METRIC_FETCH_ERROR, "kind" => "unknown_handler").increment(1);
            warn!(
                target = "pumpkin::layout",
                handler = %name,
                "Unknown layout handler requested"
            );
            LayoutError::UnknownHandler(name)
        })?;

        let options = self.effective_options(registration, overrides);
        let query = options.query_pairs();
        let cache_key = match (&self.cache, options.is_edit_mode()) {
            (Some(_), false) => Some(LayoutCacheKey::new(&registration.name, &query)),
            _ => None,
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(document) = cache.get(key)
        {
            return Ok(document);
        }

        let mut url = registration.uri.clone();
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        let request = OutboundLayoutRequest {
            handler: registration.name.clone(),
            url,
            headers: forwarded.headers(options.is_edit_mode()),
        };

        let started_at = Instant::now();
        let outcome = match timeout(registration.timeout, self.transport.send(request)).await {
            Err(_) => Err(LayoutError::Timeout {
                handler: registration.name.clone(),
                timeout: registration.timeout,
            }),
            Ok(Err(err @ TransportError::TooLarge { .. })) => {
                Err(LayoutError::Malformed(err.to_string()))
            }
            Ok(Err(err)) => Err(LayoutError::Upstream5xx {
                status: StatusCode::BAD_GATEWAY,
                detail: err.to_string(),
            }),
            Ok(Ok(response)) => interpret(response),
        };
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_FETCH_MS, "handler" => registration.name.clone()).record(elapsed_ms);

        match outcome {
            Ok(document) => {
                debug!(
                    target = "pumpkin::layout",
                    handler = %registration.name,
                    path = options.effective_path(),
                    site = options.site_name.as_deref().unwrap_or_default(),
                    locale = options.locale.as_deref().unwrap_or_default(),
                    edit_mode = options.is_edit_mode(),
                    components = document.component_count(),
                    elapsed_ms,
                    "Layout document fetched"
                );
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    cache.put(key, document.clone());
                }
                Ok(document)
            }
            Err(err) => {
                counter!(METRIC_FETCH_ERROR, "kind" => err.kind()).increment(1);
                warn!(
                    target = "pumpkin::layout",
                    handler = %registration.name,
                    path = options.effective_path(),
                    kind = err.kind(),
                    error = %err,
                    elapsed_ms,
                    "Layout fetch failed"
                );
                Err(err)
            }
        }
    }
}

fn interpret(response: TransportResponse) -> Result<LayoutDocument, LayoutError> {
    let TransportResponse { status, body } = response;
    if status.is_success() {
        return LayoutDocument::from_slice(&body)
            .map_err(|err| LayoutError::Malformed(err.to_string()));
    }

    let detail = String::from_utf8_lossy(&body[..body.len().min(DETAIL_LIMIT)]).into_owned();
    if status.is_client_error() {
        Err(LayoutError::Upstream4xx { status, detail })
    } else {
        Err(LayoutError::Upstream5xx { status, detail })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use url::Url;

    use super::*;
    use crate::config::CacheSettings;

    #[derive(Default)]
    struct RecordingTransport {
        status: Option<StatusCode>,
        body: &'static str,
        delay: Option<Duration>,
        calls: Mutex<Vec<OutboundLayoutRequest>>,
    }

    impl RecordingTransport {
        fn answering(body: &'static str) -> Self {
            Self {
                body,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<OutboundLayoutRequest> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl LayoutTransport for RecordingTransport {
        async fn send(
            &self,
            request: OutboundLayoutRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.lock().expect("calls lock").push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(TransportResponse {
                status: self.status.unwrap_or(StatusCode::OK),
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    const HOME: &str = r#"{"components":[{"name":"Hero","fields":{"title":"Welcome"}}]}"#;

    fn registry(timeout: Duration) -> HandlerRegistry {
        let uri = Url::parse("https://cm.example.test/sitecore/api/layout/render/jss")
            .expect("valid url");
        HandlerRegistry::builder()
            .add_http_handler(
                HandlerRegistration::new("default", uri.clone(), timeout).with_defaults(
                    LayoutRequestOptions::new().site_name("A").locale("en"),
                ),
            )
            .as_default_handler()
            .add_http_handler(HandlerRegistration::new("preview", uri, timeout))
            .build()
            .expect("valid registry")
    }

    fn client(transport: Arc<RecordingTransport>, timeout: Duration) -> LayoutClient {
        LayoutClient::new(
            registry(timeout),
            transport,
            LayoutRequestOptions::new().api_key("K"),
        )
    }

    #[tokio::test]
    async fn call_overrides_win_over_handler_defaults() {
        let transport = Arc::new(RecordingTransport::answering(HOME));
        let client = client(transport.clone(), Duration::from_secs(1));

        let document = client
            .fetch(
                None,
                &LayoutRequestOptions::new().locale("fr"),
                &ForwardedContext::default(),
            )
            .await
            .expect("fetch succeeds");
        assert_eq!(document.component_count(), 1);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.query_param("sc_site").as_deref(), Some("A"));
        assert_eq!(call.query_param("sc_lang").as_deref(), Some("fr"));
        assert_eq!(call.query_param("sc_apikey").as_deref(), Some("K"));
        assert_eq!(call.query_param("item").as_deref(), Some("/"));
        assert_eq!(call.query_param("sc_mode"), None);
    }

    #[tokio::test]
    async fn unknown_handler_never_reaches_the_transport() {
        let transport = Arc::new(RecordingTransport::answering(HOME));
        let client = client(transport.clone(), Duration::from_secs(1));

        let result = client
            .fetch(
                Some("nope"),
                &LayoutRequestOptions::new(),
                &ForwardedContext::default(),
            )
            .await;

        assert!(matches!(result, Err(LayoutError::UnknownHandler(name)) if name == "nope"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn slow_upstream_resolves_as_timeout() {
        let transport = Arc::new(RecordingTransport {
            body: HOME,
            delay: Some(Duration::from_millis(200)),
            ..RecordingTransport::default()
        });
        let client = client(transport, Duration::from_millis(50));

        let started = Instant::now();
        let result = client
            .fetch(None, &LayoutRequestOptions::new(), &ForwardedContext::default())
            .await;

        assert!(matches!(result, Err(LayoutError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn upstream_statuses_are_classified() {
        for (status, expect_4xx) in [
            (StatusCode::NOT_FOUND, true),
            (StatusCode::SERVICE_UNAVAILABLE, false),
        ] {
            let transport = Arc::new(RecordingTransport {
                status: Some(status),
                body: "nope",
                ..RecordingTransport::default()
            });
            let result = client(transport, Duration::from_secs(1))
                .fetch(None, &LayoutRequestOptions::new(), &ForwardedContext::default())
                .await;

            match result {
                Err(LayoutError::Upstream4xx { status: got, .. }) if expect_4xx => {
                    assert_eq!(got, status)
                }
                Err(LayoutError::Upstream5xx { status: got, .. }) if !expect_4xx => {
                    assert_eq!(got, status)
                }
                other => panic!("unexpected outcome for {status}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_whole() {
        let transport = Arc::new(RecordingTransport::answering(r#"{"name":"no components"}"#));
        let result = client(transport, Duration::from_secs(1))
            .fetch(None, &LayoutRequestOptions::new(), &ForwardedContext::default())
            .await;

        assert!(matches!(result, Err(LayoutError::Malformed(_))));
    }

    struct OversizedTransport;

    #[async_trait]
    impl LayoutTransport for OversizedTransport {
        async fn send(
            &self,
            _request: OutboundLayoutRequest,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::TooLarge { limit: 16 })
        }
    }

    #[tokio::test]
    async fn oversized_body_counts_as_malformed() {
        let client = LayoutClient::new(
            registry(Duration::from_secs(1)),
            Arc::new(OversizedTransport),
            LayoutRequestOptions::new(),
        );
        let result = client
            .fetch(None, &LayoutRequestOptions::new(), &ForwardedContext::default())
            .await;

        assert!(matches!(result, Err(LayoutError::Malformed(detail)) if detail.contains("16 bytes")));
    }

    #[tokio::test]
    async fn cache_serves_repeat_fetches_but_not_edit_mode() {
        let transport = Arc::new(RecordingTransport::answering(HOME));
        let cache = Arc::new(LayoutCache::new(&CacheSettings {
            enabled: true,
            capacity: NonZeroUsize::new(8).expect("non-zero"),
            ttl: Duration::from_secs(60),
        }));
        let client = client(transport.clone(), Duration::from_secs(1)).with_cache(cache);
        let forwarded = ForwardedContext::default();

        for _ in 0..2 {
            client
                .fetch(None, &LayoutRequestOptions::new(), &forwarded)
                .await
                .expect("fetch succeeds");
        }
        assert_eq!(transport.calls().len(), 1);

        let edit = LayoutRequestOptions::new().edit_mode(true);
        for _ in 0..2 {
            client
                .fetch(None, &edit, &forwarded)
                .await
                .expect("fetch succeeds");
        }
        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].query_param("sc_mode").as_deref(), Some("edit"));
    }
}
