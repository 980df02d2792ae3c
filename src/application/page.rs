use askama::Template;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::application::{
    layout::{ForwardedContext, LayoutClient, LayoutError},
    render::{ComponentRenderer, RenderError},
};
use crate::domain::{layout::LayoutDocument, layout::LayoutRequestOptions, site::SiteContext};
use crate::presentation::views::PageTemplate;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to render page shell")]
    Shell(#[source] askama::Error),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::Layout(err) => err.response_status(),
            PageError::Render(_) | PageError::Shell(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PageError::Layout(err) if err.is_not_found())
    }
}

/// One page request worth of input.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub site: &'a SiteContext,
    pub path: &'a str,
    pub locale: &'a str,
    pub handler: Option<&'a str>,
    pub edit_mode: bool,
    pub forwarded: &'a ForwardedContext,
}

/// Fetches a layout document and renders it into a full HTML page.
#[derive(Clone)]
pub struct PageService {
    client: LayoutClient,
    renderer: ComponentRenderer,
}

impl PageService {
    pub fn new(client: LayoutClient, renderer: ComponentRenderer) -> Self {
        Self { client, renderer }
    }

    pub fn client(&self) -> &LayoutClient {
        &self.client
    }

    pub async fn render(&self, request: PageRequest<'_>) -> Result<String, PageError> {
        let overrides = LayoutRequestOptions::new()
            .path(request.path)
            .site_name(request.site.site_name())
            .locale(request.locale)
            .api_key(request.site.api_key())
            .edit_mode(request.edit_mode);

        let document = self
            .client
            .fetch(request.handler, &overrides, request.forwarded)
            .await?;

        self.render_document(request.site, request.locale, &document, request.edit_mode)
    }

    /// Render an already fetched document; no network access.
    pub fn render_document(
        &self,
        site: &SiteContext,
        locale: &str,
        document: &LayoutDocument,
        edit_mode: bool,
    ) -> Result<String, PageError> {
        let rendered = self.renderer.render_document(document)?;
        debug!(
            target = "pumpkin::render",
            site = site.site_name(),
            locale,
            components = rendered.component_count,
            fallbacks = rendered.fallback_count,
            edit_mode,
            "Rendered layout document"
        );

        PageTemplate {
            title: rendered
                .name
                .clone()
                .unwrap_or_else(|| site.site_name().to_string()),
            lang: locale.to_string(),
            site_name: site.site_name().to_string(),
            edit_mode,
            body: rendered.body,
        }
        .render()
        .map_err(PageError::Shell)
    }
}
