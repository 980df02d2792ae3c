use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Extensions, Method, Request, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{any, get, post},
};
use tracing::debug;
use url::Url;

use crate::{
    application::{
        editor::EditorService,
        error::ErrorReport,
        layout::ForwardedContext,
        page::{PageError, PageRequest, PageService},
        site::{SiteResolutionError, SiteResolver},
        tracking::TrackingId,
    },
    config::{RuntimeEnvironment, Settings},
    domain::{
        render_mode::{EditorSignature, RenderMode, classify},
        request::RequestSnapshot,
        site::SiteContext,
    },
    presentation::views::{ErrorTemplate, render_error_page, render_template_response},
};

use super::{
    editor,
    middleware::{
        ClientAddress, ExternalOrigin, log_responses, normalize_forwarded_headers,
        probe_response, set_request_context, track_visitors,
    },
};

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub environment: RuntimeEnvironment,
    pub resolver: Arc<SiteResolver>,
    pub pages: Arc<PageService>,
    pub editor: Arc<EditorService>,
    pub editor_signature: Arc<EditorSignature>,
    pub instance_uri: Url,
    pub forwarded_headers: bool,
}

impl HttpState {
    pub fn new(settings: &Settings, pages: PageService) -> Self {
        Self {
            environment: settings.environment,
            resolver: Arc::new(SiteResolver::from_settings(&settings.sitecore)),
            pages: Arc::new(pages),
            editor: Arc::new(EditorService::from_settings(settings)),
            editor_signature: Arc::new(EditorSignature {
                enabled: settings.sitecore.enable_experience_editor,
                endpoint: settings.experience_editor.endpoint.clone(),
            }),
            instance_uri: settings.sitecore.instance_uri.clone(),
            forwarded_headers: settings.forwarded_headers.enabled,
        }
    }
}

/// Middleware runs outermost first: request context, response logging,
/// forwarded headers, tracking and probe, then routing.
pub fn build_router(state: HttpState) -> Router {
    let mut router = Router::new()
        .route("/error", any(error_route))
        .route("/_health", get(health));

    // Only POST reaches the editor; other methods render like any other path.
    if state.editor_signature.enabled {
        router = router.route(
            &state.editor_signature.endpoint,
            post(editor::render_for_editor).fallback(dispatch),
        );
    }

    router
        .fallback(dispatch)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), track_visitors))
        .layer(middleware::from_fn_with_state(
            state,
            normalize_forwarded_headers,
        ))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn error_route() -> Response {
    fixed_error_page()
}

/// The `/error` output. Rendered without any layout data.
pub(super) fn fixed_error_page() -> Response {
    render_template_response(ErrorTemplate::generic(), StatusCode::INTERNAL_SERVER_ERROR)
}

async fn dispatch(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let snapshot = RequestSnapshot::new(
        request.method().clone(),
        request.uri(),
        request.headers(),
    );
    let site = state.resolver.resolve(&snapshot);
    let mode = classify(&snapshot, &state.editor_signature, site.is_ok());
    debug!(
        target = "pumpkin::http::dispatch",
        method = %snapshot.method(),
        path = snapshot.path(),
        mode = mode.as_str(),
        site = site.as_ref().map(SiteContext::site_name).unwrap_or_default(),
        "Classified request"
    );

    let site = match (mode, site) {
        (RenderMode::VisitorIdentificationProbe, _) => return probe_response(&state),
        (RenderMode::ExperienceEditor, _) => {
            return editor::render_for_editor(State(state), request).await;
        }
        (_, Err(err)) => return site_failure(&err),
        (RenderMode::Error, Ok(_)) => return fixed_error_page(),
        (RenderMode::Normal, Ok(site)) => site,
    };

    if !matches!(*snapshot.method(), Method::GET | Method::HEAD) {
        let report = ErrorReport::from_message(
            SOURCE,
            StatusCode::NOT_FOUND,
            format!("{} is not served for page routes", snapshot.method()),
        );
        return error_page(&state, StatusCode::NOT_FOUND, report);
    }

    let forwarded = forwarded_context(&state, &snapshot, request.extensions());

    if let Some((locale, path)) = state.resolver.split_locale_prefix(snapshot.path()) {
        let localized = state
            .pages
            .render(PageRequest {
                site: &site,
                path,
                locale,
                handler: None,
                edit_mode: false,
                forwarded: &forwarded,
            })
            .await;
        match localized {
            Ok(html) => return Html(html).into_response(),
            Err(err) if err.is_not_found() => {
                debug!(
                    target = "pumpkin::http::dispatch",
                    path = snapshot.path(),
                    locale,
                    "Localized route declined; falling back to catch-all"
                );
            }
            Err(err) => return page_failure(&state, &err),
        }
    }

    let generic = state
        .pages
        .render(PageRequest {
            site: &site,
            path: snapshot.path(),
            locale: site.locale(),
            handler: None,
            edit_mode: false,
            forwarded: &forwarded,
        })
        .await;
    match generic {
        Ok(html) => Html(html).into_response(),
        Err(err) => page_failure(&state, &err),
    }
}

pub(super) fn forwarded_context(
    state: &HttpState,
    snapshot: &RequestSnapshot,
    extensions: &Extensions,
) -> ForwardedContext {
    let scheme = extensions
        .get::<ExternalOrigin>()
        .map(|origin| origin.scheme.as_str());
    let peer = extensions
        .get::<ClientAddress>()
        .and_then(|ClientAddress(addr)| *addr);
    let tracking = extensions.get::<TrackingId>().map(TrackingId::as_str);
    let context = ForwardedContext::from_request(snapshot, scheme, peer, tracking);
    if state.forwarded_headers {
        context
    } else {
        context.without_inbound_chain()
    }
}

/// Resolver failures always answer with the `/error` output.
pub(super) fn site_failure(err: &SiteResolutionError) -> Response {
    let mut response = fixed_error_page();
    ErrorReport::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, err).attach(&mut response);
    response
}

pub(super) fn page_failure(state: &HttpState, err: &PageError) -> Response {
    let status = err.status();
    error_page(state, status, ErrorReport::from_error(SOURCE, status, err))
}

/// Error page; development adds the diagnostic chain.
pub(super) fn error_page(state: &HttpState, status: StatusCode, report: ErrorReport) -> Response {
    let mut template = ErrorTemplate::for_status(status);
    if state.environment.is_development() {
        template = template.with_diagnostics(report.messages.clone());
    }
    render_error_page(template, status, report)
}
