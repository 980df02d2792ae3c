//! Tracking cookie and visitor identification probe.

use axum::http::HeaderValue;
use url::Url;
use uuid::Uuid;

use crate::domain::{render_mode::VISITOR_IDENTIFICATION_PATH, request::RequestSnapshot};

pub const TRACKING_COOKIE: &str = "SC_ANALYTICS_GLOBAL_COOKIE";
pub const PROBE_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

const TRACKING_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365;
const TRACKING_ID_LEN: usize = 32;

/// Tracking identifier of the current visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingId {
    /// A valid identifier arrived with the request.
    Existing(String),
    /// The request had none (or a malformed one); a new one was minted.
    Minted(String),
}

impl TrackingId {
    pub fn from_request(request: &RequestSnapshot) -> Self {
        match request.cookie(TRACKING_COOKIE) {
            Some(value) if is_valid_tracking_id(value) => TrackingId::Existing(value.to_string()),
            _ => TrackingId::Minted(mint_tracking_id()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TrackingId::Existing(value) | TrackingId::Minted(value) => value,
        }
    }

    pub fn is_minted(&self) -> bool {
        matches!(self, TrackingId::Minted(_))
    }

    /// `Set-Cookie` value for a freshly minted identifier.
    pub fn set_cookie_header(&self, secure: bool) -> Option<HeaderValue> {
        let TrackingId::Minted(value) = self else {
            return None;
        };
        let mut cookie = format!(
            "{TRACKING_COOKIE}={value}; Path=/; Max-Age={TRACKING_COOKIE_MAX_AGE_SECS}; HttpOnly; SameSite=Lax"
        );
        if secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

pub fn mint_tracking_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 32 hex characters, optionally followed by a `|flag` suffix.
pub fn is_valid_tracking_id(value: &str) -> bool {
    let id = value.split_once('|').map_or(value, |(id, _)| id);
    id.len() == TRACKING_ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Script answered to visitor identification probes.
pub fn probe_script(instance_uri: &Url) -> String {
    let instance = instance_uri.as_str().trim_end_matches('/');
    let instance = serde_json::Value::String(instance.to_string());
    let beacon = serde_json::Value::String(
        VISITOR_IDENTIFICATION_PATH.replace(".js", ".aspx"),
    );
    format!(
        "(function(w){{w.pumpkinVisitorIdentification={{instance:{instance},beacon:{beacon}}};}})(window);\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_cookie_is_kept() {
        let request = RequestSnapshot::get("/").with_header(
            "cookie",
            "SC_ANALYTICS_GLOBAL_COOKIE=0123456789ABCDEF0123456789abcdef|False",
        );
        let id = TrackingId::from_request(&request);

        assert!(!id.is_minted());
        assert_eq!(id.as_str(), "0123456789ABCDEF0123456789abcdef|False");
        assert!(id.set_cookie_header(true).is_none());
    }

    #[test]
    fn malformed_cookie_is_replaced() {
        let request =
            RequestSnapshot::get("/").with_header("cookie", "SC_ANALYTICS_GLOBAL_COOKIE=zzz");
        let id = TrackingId::from_request(&request);

        assert!(id.is_minted());
        assert!(is_valid_tracking_id(id.as_str()));
        let header = id.set_cookie_header(true).expect("cookie header");
        let header = header.to_str().expect("ascii");
        assert!(header.starts_with("SC_ANALYTICS_GLOBAL_COOKIE="));
        assert!(header.ends_with("; Secure"));
    }

    #[test]
    fn probe_script_names_the_instance() {
        let script = probe_script(&Url::parse("https://cm.example.test/").expect("url"));
        assert!(script.contains(r#"instance:"https://cm.example.test""#));
        assert!(script.contains("VisitorIdentification.aspx"));
    }
}
