use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::ErrorReport;

const SOURCE: &str = "presentation::views";
const ERROR_PAGE_TITLE: &str = "Something went wrong";
const ERROR_PAGE_MESSAGE: &str =
    "We could not render this page right now. Please try again in a moment.";
const NOT_FOUND_TITLE: &str = "Page not found";
const NOT_FOUND_MESSAGE: &str = "The page you requested does not exist.";
const FALLBACK_LANG: &str = "en";

#[derive(Debug, Error)]
#[error("failed to render template `{template}`")]
pub struct TemplateRenderError {
    template: &'static str,
    #[source]
    error: askama::Error,
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, TemplateRenderError> {
    template
        .render()
        .map(Html)
        .map_err(|error| TemplateRenderError {
            template: std::any::type_name::<T>(),
            error,
        })
}

/// A failing template degrades to a plain-text 500.
pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let mut response = (status, "Internal Server Error").into_response();
            ErrorReport::from_error(SOURCE, status, &err).attach(&mut response);
            response
        }
    }
}

/// Full page around the rendered component tree.
#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub title: String,
    pub lang: String,
    pub site_name: String,
    pub edit_mode: bool,
    pub body: String,
}

/// The fixed error page. It never depends on a layout document.
#[derive(Debug, Clone, Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub lang: String,
    pub status: u16,
    pub heading: String,
    pub message: String,
    pub diagnostics: Vec<String>,
}

impl ErrorTemplate {
    /// What `/error` serves.
    pub fn generic() -> Self {
        Self::for_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn for_status(status: StatusCode) -> Self {
        let (heading, message) = if status == StatusCode::NOT_FOUND {
            (NOT_FOUND_TITLE, NOT_FOUND_MESSAGE)
        } else {
            (ERROR_PAGE_TITLE, ERROR_PAGE_MESSAGE)
        };

        Self {
            title: heading.to_string(),
            lang: FALLBACK_LANG.to_string(),
            status: status.as_u16(),
            heading: heading.to_string(),
            message: message.to_string(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Render the error page with `status` and attach `report` for the response logger.
pub fn render_error_page(
    template: ErrorTemplate,
    status: StatusCode,
    report: ErrorReport,
) -> Response {
    let mut response = render_template_response(template, status);
    report.attach(&mut response);
    response
}
