use axum::http::Method;

use super::request::RequestSnapshot;

/// Well-known path the visitor identification script is requested from.
pub const VISITOR_IDENTIFICATION_PATH: &str = "/layouts/system/VisitorIdentification.js";

/// How a request is going to be answered. Selected once, before any layout fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Normal,
    ExperienceEditor,
    VisitorIdentificationProbe,
    Error,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Normal => "normal",
            RenderMode::ExperienceEditor => "experience_editor",
            RenderMode::VisitorIdentificationProbe => "visitor_identification_probe",
            RenderMode::Error => "error",
        }
    }
}

/// Request signature of the experience editor render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSignature {
    pub enabled: bool,
    pub endpoint: String,
}

impl EditorSignature {
    pub fn matches(&self, request: &RequestSnapshot) -> bool {
        self.enabled
            && request.method() == Method::POST
            && request.path().trim_end_matches('/') == self.endpoint.trim_end_matches('/')
    }
}

pub fn is_visitor_identification_probe(request: &RequestSnapshot) -> bool {
    (request.method() == Method::GET || request.method() == Method::HEAD)
        && request
            .path()
            .eq_ignore_ascii_case(VISITOR_IDENTIFICATION_PATH)
}

/// Classify a request. The first matching rule wins.
pub fn classify(
    request: &RequestSnapshot,
    editor: &EditorSignature,
    site_resolved: bool,
) -> RenderMode {
    if is_visitor_identification_probe(request) {
        RenderMode::VisitorIdentificationProbe
    } else if editor.matches(request) {
        RenderMode::ExperienceEditor
    } else if !site_resolved {
        RenderMode::Error
    } else {
        RenderMode::Normal
    }
}
