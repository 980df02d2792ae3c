use axum::{
    Json,
    body::{Body, to_bytes},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::{
    application::{
        editor::{EditorError, EditorRequest},
        error::ErrorReport,
        page::PageRequest,
    },
    domain::request::RequestSnapshot,
};

use super::{
    HttpState,
    public::{error_page, forwarded_context, page_failure, site_failure},
};

const SOURCE: &str = "infra::http::editor";
const EDITOR_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub(super) async fn render_for_editor(
    State(state): State<HttpState>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, EDITOR_BODY_LIMIT).await {
        Ok(body) => body,
        Err(err) => {
            let report = ErrorReport::from_error(SOURCE, StatusCode::BAD_REQUEST, &err);
            return error_page(&state, StatusCode::BAD_REQUEST, report);
        }
    };

    let editor_request = match EditorRequest::parse(&body) {
        Ok(request) => request,
        Err(err) => return editor_failure(&state, &err),
    };
    if let Err(err) = state.editor.authorize(&editor_request) {
        return editor_failure(&state, &err);
    }

    let snapshot = RequestSnapshot::new(parts.method.clone(), &parts.uri, &parts.headers);
    let site = match state.resolver.resolve(&snapshot) {
        Ok(site) => site,
        Err(err) => return site_failure(&err),
    };

    let rendered = match editor_request.layout.as_ref() {
        Some(document) => state
            .pages
            .render_document(&site, site.locale(), document, true),
        None => {
            let forwarded = forwarded_context(&state, &snapshot, &parts.extensions);
            state
                .pages
                .render(PageRequest {
                    site: &site,
                    path: &editor_request.path,
                    locale: site.locale(),
                    handler: None,
                    edit_mode: true,
                    forwarded: &forwarded,
                })
                .await
        }
    };
    let html = match rendered {
        Ok(html) => html,
        Err(err) => return page_failure(&state, &err),
    };

    match state.editor.respond(&html) {
        Ok(response) => {
            info!(
                target = "pumpkin::http::editor",
                path = %editor_request.path,
                site = site.site_name(),
                embedded_layout = editor_request.layout.is_some(),
                "Rendered page for the experience editor"
            );
            Json(response).into_response()
        }
        Err(err) => editor_failure(&state, &err),
    }
}

fn editor_failure(state: &HttpState, err: &EditorError) -> Response {
    let status = match err {
        EditorError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        EditorError::Unauthorized => StatusCode::UNAUTHORIZED,
        EditorError::Rewrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_page(state, status, ErrorReport::from_error(SOURCE, status, err))
}
