use std::net::IpAddr;

use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{ACCEPT_LANGUAGE, AUTHORIZATION, COOKIE, USER_AGENT},
};

use crate::{application::tracking::TRACKING_COOKIE, domain::request::RequestSnapshot};

pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

const EDITOR_AUTH_COOKIE: &str = ".ASPXAUTH";
const EDITOR_COOKIE_PREFIX: &str = "sc_";

/// Visitor details passed through to the layout service.
///
/// Editor cookies and the `Authorization` header are captured for every
/// request but only sent for edit-mode fetches.
#[derive(Debug, Clone, Default)]
pub struct ForwardedContext {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub forwarded_for: Option<String>,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub tracking_id: Option<String>,
    pub editor_cookies: Vec<(String, String)>,
    pub authorization: Option<String>,
}

impl ForwardedContext {
    pub fn from_request(
        request: &RequestSnapshot,
        scheme: Option<&str>,
        client_ip: Option<IpAddr>,
        tracking_id: Option<&str>,
    ) -> Self {
        let editor_cookies = request
            .cookies()
            .filter(|(name, _)| is_editor_cookie(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Self {
            scheme: scheme.map(str::to_string),
            host: request.header("host").map(str::to_string),
            forwarded_for: request.header(X_FORWARDED_FOR).map(str::to_string),
            client_ip,
            user_agent: request.header(USER_AGENT.as_str()).map(str::to_string),
            accept_language: request.header(ACCEPT_LANGUAGE.as_str()).map(str::to_string),
            tracking_id: tracking_id
                .map(str::to_string)
                .or_else(|| request.cookie(TRACKING_COOKIE).map(str::to_string)),
            editor_cookies,
            authorization: request.header(AUTHORIZATION.as_str()).map(str::to_string),
        }
    }

    /// Drops the inbound `X-Forwarded-For` chain; the client could have set it.
    #[must_use]
    pub fn without_inbound_chain(mut self) -> Self {
        self.forwarded_for = None;
        self
    }

    /// Headers for the outbound layout request.
    pub fn headers(&self, edit_mode: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        insert(&mut headers, HeaderName::from_static(X_FORWARDED_PROTO), self.scheme.as_deref());
        insert(&mut headers, HeaderName::from_static(X_FORWARDED_HOST), self.host.as_deref());

        let forwarded_for = match (&self.forwarded_for, self.client_ip) {
            (Some(chain), Some(ip)) => Some(format!("{chain}, {ip}")),
            (Some(chain), None) => Some(chain.clone()),
            (None, Some(ip)) => Some(ip.to_string()),
            (None, None) => None,
        };
        insert(&mut headers, HeaderName::from_static(X_FORWARDED_FOR), forwarded_for.as_deref());
        insert(&mut headers, USER_AGENT, self.user_agent.as_deref());
        insert(&mut headers, ACCEPT_LANGUAGE, self.accept_language.as_deref());

        let mut cookies: Vec<String> = self
            .tracking_id
            .iter()
            .map(|id| format!("{TRACKING_COOKIE}={id}"))
            .collect();
        if edit_mode {
            cookies.extend(
                self.editor_cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}")),
            );
            insert(&mut headers, AUTHORIZATION, self.authorization.as_deref());
        }
        if !cookies.is_empty() {
            insert(&mut headers, COOKIE, Some(&cookies.join("; ")));
        }

        headers
    }
}

fn is_editor_cookie(name: &str) -> bool {
    name != TRACKING_COOKIE
        && (name.eq_ignore_ascii_case(EDITOR_AUTH_COOKIE) || name.starts_with(EDITOR_COOKIE_PREFIX))
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    if let Some(value) = value.and_then(|value| HeaderValue::from_str(value).ok()) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestSnapshot {
        RequestSnapshot::get("/about")
            .with_header("host", "www.example.test")
            .with_header("user-agent", "pumpkin-test")
            .with_header("x-forwarded-for", "203.0.113.7")
            .with_header(
                "cookie",
                "SC_ANALYTICS_GLOBAL_COOKIE=0123456789abcdef0123456789abcdef; sc_date=1; .ASPXAUTH=token; theme=dark",
            )
            .with_header("authorization", "Bearer abc")
    }

    #[test]
    fn normal_fetch_forwards_visitor_headers_only() {
        let context = ForwardedContext::from_request(
            &request(),
            Some("https"),
            Some("10.0.0.5".parse().expect("ip")),
            None,
        );
        let headers = context.headers(false);

        assert_eq!(headers.get(X_FORWARDED_PROTO).map(|v| v.as_bytes()), Some(&b"https"[..]));
        assert_eq!(
            headers.get(X_FORWARDED_HOST).map(|v| v.as_bytes()),
            Some(&b"www.example.test"[..])
        );
        assert_eq!(
            headers.get(X_FORWARDED_FOR).map(|v| v.as_bytes()),
            Some(&b"203.0.113.7, 10.0.0.5"[..])
        );
        assert_eq!(
            headers.get(COOKIE).map(|v| v.as_bytes()),
            Some(&b"SC_ANALYTICS_GLOBAL_COOKIE=0123456789abcdef0123456789abcdef"[..])
        );
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn untrusted_chain_is_replaced_by_the_peer() {
        let context = ForwardedContext::from_request(
            &request(),
            None,
            Some("10.0.0.5".parse().expect("ip")),
            None,
        )
        .without_inbound_chain();
        let headers = context.headers(false);

        assert_eq!(
            headers.get(X_FORWARDED_FOR).map(|v| v.as_bytes()),
            Some(&b"10.0.0.5"[..])
        );
    }

    #[test]
    fn edit_fetch_adds_editor_cookies_and_authorization() {
        let context = ForwardedContext::from_request(&request(), None, None, Some("ffff"));
        let headers = context.headers(true);

        let cookie = headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("cookie header");
        assert!(cookie.starts_with("SC_ANALYTICS_GLOBAL_COOKIE=ffff"));
        assert!(cookie.contains("sc_date=1"));
        assert!(cookie.contains(".ASPXAUTH=token"));
        assert!(!cookie.contains("theme"));
        assert!(headers.get(AUTHORIZATION).is_some());
    }
}
