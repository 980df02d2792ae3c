//! Immutable view of an inbound request.
//!
//! The site resolver and the render mode selector only ever look at this
//! snapshot, which keeps both of them testable without an HTTP stack.

use axum::http::{
    HeaderMap, Method, Uri,
    header::{COOKIE, HOST},
};
use url::form_urlencoded;

#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    path: String,
    host: Option<String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
}

impl RequestSnapshot {
    pub fn new(method: Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let query = uri
            .query()
            .map(|raw| {
                form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let host = headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|authority| authority.to_string()));

        Self {
            method,
            path: uri.path().to_string(),
            host,
            query,
            headers: headers.clone(),
        }
    }

    /// Convenience constructor for `GET` snapshots, mostly used by tests.
    pub fn get(uri: &str) -> Self {
        let uri = uri.parse::<Uri>().unwrap_or_default();
        Self::new(Method::GET, &uri, &HeaderMap::new())
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.append(name, value);
        }
        if name.eq_ignore_ascii_case(HOST.as_str()) {
            self.host = Some(value.to_string());
        }
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host without port, lowercased.
    pub fn host(&self) -> Option<String> {
        self.host.as_deref().map(|host| {
            let without_port = match host.rsplit_once(':') {
                Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
                _ => host,
            };
            without_port.to_ascii_lowercase()
        })
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn cookies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| raw.split(';'))
            .filter_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                Some((key.trim(), value.trim()))
            })
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
