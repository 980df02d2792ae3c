//! Experience editor render calls.
//!
//! The editor posts the item path and, usually, the layout data it wants
//! rendered. The answer is the rendered page as JSON with every relative
//! `href`/`src` made absolute against the public rendering host URL.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

use crate::{config::Settings, domain::layout::LayoutDocument};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("invalid editor payload: {0}")]
    InvalidPayload(String),
    #[error("editing secret is missing or does not match")]
    Unauthorized,
    #[error("failed to rewrite editor markup: {0}")]
    Rewrite(String),
}

/// A parsed editor render call.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorRequest {
    pub path: String,
    pub layout: Option<LayoutDocument>,
    pub secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawEditorPayload {
    id: Option<String>,
    args: Vec<Value>,
    function_name: Option<String>,
    module_name: Option<String>,
    jss_editing_secret: Option<String>,
    path: Option<String>,
    layout_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EditorResponse {
    pub html: String,
}

impl EditorRequest {
    /// Accepts `{ args: [path, layout, viewBag], jssEditingSecret }` as well as
    /// the shorter `{ path, layoutData }`.
    pub fn parse(body: &[u8]) -> Result<Self, EditorError> {
        let raw: RawEditorPayload = serde_json::from_slice(body)
            .map_err(|err| EditorError::InvalidPayload(err.to_string()))?;

        let mut args = raw.args.into_iter();
        let path_arg = args.next();
        let layout_arg = args.next();

        let path = match (raw.path, path_arg) {
            (Some(path), _) => path,
            (None, Some(Value::String(path))) => path,
            (None, Some(other)) => {
                return Err(EditorError::InvalidPayload(format!(
                    "expected the item path as first argument, got `{other}`"
                )));
            }
            (None, None) => {
                return Err(EditorError::InvalidPayload("item path is missing".to_string()));
            }
        };

        let layout = raw
            .layout_data
            .or(layout_arg)
            .map(parse_layout_value)
            .transpose()?
            .flatten();

        tracing::debug!(
            target = "pumpkin::editor",
            id = raw.id.as_deref().unwrap_or_default(),
            path = %path,
            function = raw.function_name.as_deref().unwrap_or_default(),
            module = raw.module_name.as_deref().unwrap_or_default(),
            embedded_layout = layout.is_some(),
            "Parsed editor render call"
        );

        Ok(Self {
            path,
            layout,
            secret: raw.jss_editing_secret,
        })
    }
}

/// The layout argument may be a JSON object or a string holding JSON.
fn parse_layout_value(value: Value) -> Result<Option<LayoutDocument>, EditorError> {
    let value = match value {
        Value::Null => return Ok(None),
        Value::String(raw) if raw.trim().is_empty() => return Ok(None),
        Value::String(raw) => serde_json::from_str::<Value>(&raw)
            .map_err(|err| EditorError::InvalidPayload(format!("layout data: {err}")))?,
        other => other,
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| EditorError::InvalidPayload(format!("layout data: {err}")))
}

/// Editor settings needed at request time.
#[derive(Debug, Clone)]
pub struct EditorService {
    secret: Option<String>,
    rendering_host_uri: Option<Url>,
}

impl EditorService {
    pub fn new(secret: Option<String>, rendering_host_uri: Option<Url>) -> Self {
        Self {
            secret,
            rendering_host_uri,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.experience_editor.editing_secret.clone(),
            settings.sitecore.rendering_host_uri.clone(),
        )
    }

    /// Passes when no secret is configured.
    pub fn authorize(&self, request: &EditorRequest) -> Result<(), EditorError> {
        let Some(expected) = self.secret.as_deref() else {
            return Ok(());
        };
        let given = request.secret.as_deref().unwrap_or_default();
        if expected.as_bytes().ct_eq(given.as_bytes()).unwrap_u8() == 0 {
            return Err(EditorError::Unauthorized);
        }
        Ok(())
    }

    pub fn respond(&self, html: &str) -> Result<EditorResponse, EditorError> {
        let html = match &self.rendering_host_uri {
            Some(base) => absolutize_urls(html, base)?,
            None => html.to_string(),
        };
        Ok(EditorResponse { html })
    }
}

/// Rewrite relative `href`/`src` attributes against `base`.
pub fn absolutize_urls(html: &str, base: &Url) -> Result<String, EditorError> {
    let rewritten = Rc::new(RefCell::new(0usize));

    let output = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("a[href], area[href], link[href]", {
                    let base = base.clone();
                    let rewritten = Rc::clone(&rewritten);
                    move |el| {
                        if let Some(absolute) =
                            el.get_attribute("href").and_then(|value| absolute_url(&base, &value))
                        {
                            el.set_attribute("href", &absolute)?;
                            *rewritten.borrow_mut() += 1;
                        }
                        Ok(())
                    }
                }),
                element!("img[src], script[src], iframe[src], source[src]", {
                    let base = base.clone();
                    let rewritten = Rc::clone(&rewritten);
                    move |el| {
                        if let Some(absolute) =
                            el.get_attribute("src").and_then(|value| absolute_url(&base, &value))
                        {
                            el.set_attribute("src", &absolute)?;
                            *rewritten.borrow_mut() += 1;
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| EditorError::Rewrite(err.to_string()))?;

    tracing::trace!(
        target = "pumpkin::editor",
        rewritten = *rewritten.borrow(),
        "Absolutized editor markup"
    );
    Ok(output)
}

fn absolute_url(base: &Url, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
        return None;
    }
    // Anything with a scheme (http:, mailto:, data:) is left alone.
    if Url::parse(trimmed).is_ok() {
        return None;
    }
    base.join(trimmed).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_args_payload_with_string_layout() {
        let body = br#"{
            "id": "pumpkin",
            "args": ["/about", "{\"components\":[{\"name\":\"Hero\",\"fields\":{\"title\":\"Hi\"}}]}", "{}"],
            "functionName": "renderView",
            "moduleName": "server.bundle",
            "jssEditingSecret": "s3cret"
        }"#;
        let request = EditorRequest::parse(body).expect("parses");

        assert_eq!(request.path, "/about");
        assert_eq!(request.secret.as_deref(), Some("s3cret"));
        assert_eq!(
            request.layout.map(|layout| layout.component_count()),
            Some(1)
        );
    }

    #[test]
    fn parses_short_payload_without_layout() {
        let request = EditorRequest::parse(br#"{"path":"/news"}"#).expect("parses");
        assert_eq!(request.path, "/news");
        assert!(request.layout.is_none());
    }

    #[test]
    fn missing_path_is_invalid() {
        assert!(matches!(
            EditorRequest::parse(br#"{"args":[]}"#),
            Err(EditorError::InvalidPayload(_))
        ));
    }

    #[test]
    fn secret_is_enforced_when_configured() {
        let request = EditorRequest::parse(br#"{"path":"/"}"#).expect("parses");
        assert!(EditorService::new(None, None).authorize(&request).is_ok());
        assert!(matches!(
            EditorService::new(Some("x".to_string()), None).authorize(&request),
            Err(EditorError::Unauthorized)
        ));
    }

    #[test]
    fn secret_comparison_requires_an_exact_match() {
        let service = EditorService::new(Some("s3cret".to_string()), None);
        let with_secret = |secret: &str| EditorRequest {
            path: "/".to_string(),
            layout: None,
            secret: Some(secret.to_string()),
        };

        assert!(service.authorize(&with_secret("s3cret")).is_ok());
        assert!(matches!(
            service.authorize(&with_secret("s3creT")),
            Err(EditorError::Unauthorized)
        ));
        assert!(matches!(
            service.authorize(&with_secret("s3cret-and-more")),
            Err(EditorError::Unauthorized)
        ));
        assert!(matches!(
            service.authorize(&with_secret("")),
            Err(EditorError::Unauthorized)
        ));
    }

    #[test]
    fn relative_urls_become_absolute() {
        let base = Url::parse("https://render.example.test/").expect("url");
        let html = r##"<a href="/about">a</a><img src="media/logo.png"><a href="#top">t</a><a href="mailto:x@example.test">m</a><script src="https://cdn.example.test/x.js"></script>"##;
        let output = absolutize_urls(html, &base).expect("rewrites");

        assert!(output.contains(r#"href="https://render.example.test/about""#));
        assert!(output.contains(r#"src="https://render.example.test/media/logo.png""#));
        assert!(output.contains(r##"href="#top""##));
        assert!(output.contains(r#"href="mailto:x@example.test""#));
        assert!(output.contains(r#"src="https://cdn.example.test/x.js""#));
    }
}
