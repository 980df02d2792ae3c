//! Site and locale resolution.

use axum::http::header::ACCEPT_LANGUAGE;
use thiserror::Error;
use url::Url;

use crate::{
    config::{SiteBinding, SitecoreSettings},
    domain::{request::RequestSnapshot, site::SiteContext},
};

pub const SITE_OVERRIDE_PARAM: &str = "sc_site";
pub const LOCALE_OVERRIDE_PARAM: &str = "sc_lang";
pub const CULTURE_COOKIE: &str = ".AspNetCore.Culture";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteResolutionError {
    #[error("no site is bound to host `{host}` and no default site is configured")]
    NoSiteMatch { host: String },
    #[error("requested site `{0}` is not configured")]
    UnknownSite(String),
    #[error("resolved site context is invalid: {0}")]
    InvalidContext(String),
}

/// Maps requests to a [`SiteContext`]. Built once at startup.
#[derive(Debug, Clone)]
pub struct SiteResolver {
    default_site: Option<String>,
    sites: Vec<SiteBinding>,
    api_key: String,
    instance_uri: Url,
    default_locale: String,
    supported_locales: Vec<String>,
}

impl SiteResolver {
    pub fn from_settings(settings: &SitecoreSettings) -> Self {
        Self {
            default_site: settings.default_site_name.clone(),
            sites: settings.sites.clone(),
            api_key: settings.api_key.clone(),
            instance_uri: settings.instance_uri.clone(),
            default_locale: settings.default_locale.clone(),
            supported_locales: settings.supported_locales.clone(),
        }
    }

    pub fn resolve(&self, request: &RequestSnapshot) -> Result<SiteContext, SiteResolutionError> {
        let (site_name, binding) = self.resolve_site(request)?;
        let locale = self.negotiate_locale(request, binding);
        let api_key = binding
            .and_then(|site| site.api_key.clone())
            .unwrap_or_else(|| self.api_key.clone());

        SiteContext::new(site_name, locale, api_key, self.instance_uri.clone())
            .map_err(|err| SiteResolutionError::InvalidContext(err.to_string()))
    }

    /// Site name plus its binding, when the site has one.
    fn resolve_site(
        &self,
        request: &RequestSnapshot,
    ) -> Result<(String, Option<&SiteBinding>), SiteResolutionError> {
        if let Some(requested) = request.query_param(SITE_OVERRIDE_PARAM) {
            if let Some(site) = self.site_named(requested) {
                return Ok((site.name.clone(), Some(site)));
            }
            if let Some(default) = self
                .default_site
                .as_deref()
                .filter(|default| default.eq_ignore_ascii_case(requested))
            {
                return Ok((default.to_string(), None));
            }
            return Err(SiteResolutionError::UnknownSite(requested.to_string()));
        }

        if let Some(host) = request.host()
            && let Some(site) = self
                .sites
                .iter()
                .find(|site| site.hosts.iter().any(|bound| host_matches(bound, &host)))
        {
            return Ok((site.name.clone(), Some(site)));
        }

        if let Some(default) = &self.default_site {
            return Ok((default.clone(), self.site_named(default)));
        }

        Err(SiteResolutionError::NoSiteMatch {
            host: request.host().unwrap_or_default(),
        })
    }

    fn site_named(&self, name: &str) -> Option<&SiteBinding> {
        self.sites
            .iter()
            .find(|site| site.name.eq_ignore_ascii_case(name))
    }

    /// Canonical spelling of `candidate` if it is a supported locale.
    pub fn supported_locale(&self, candidate: &str) -> Option<&str> {
        self.supported_locales
            .iter()
            .find(|locale| locale.eq_ignore_ascii_case(candidate.trim()))
            .map(String::as_str)
    }

    /// Split a leading locale segment off `path`: `/fr/about` → `("fr", "/about")`.
    pub fn split_locale_prefix<'a>(&self, path: &'a str) -> Option<(&str, &'a str)> {
        let trimmed = path.strip_prefix('/')?;
        let (segment, rest) = match trimmed.find('/') {
            Some(index) => (&trimmed[..index], &trimmed[index..]),
            None => (trimmed, "/"),
        };
        let locale = self.supported_locale(segment)?;
        Some((locale, rest))
    }

    fn negotiate_locale(&self, request: &RequestSnapshot, site: Option<&SiteBinding>) -> String {
        let from_query = request
            .query_param(LOCALE_OVERRIDE_PARAM)
            .and_then(|value| self.supported_locale(value));
        let from_route = || {
            self.split_locale_prefix(request.path())
                .map(|(locale, _)| locale)
        };
        let from_cookie = || {
            request
                .cookie(CULTURE_COOKIE)
                .and_then(parse_culture_cookie)
                .and_then(|value| self.supported_locale(&value))
        };
        let from_header = || {
            request
                .header(ACCEPT_LANGUAGE.as_str())
                .and_then(|value| self.best_accept_language(value))
        };
        let site_default = || {
            site.and_then(|binding| binding.default_locale.as_deref())
                .and_then(|value| self.supported_locale(value))
        };

        from_query
            .or_else(from_route)
            .or_else(from_cookie)
            .or_else(from_header)
            .or_else(site_default)
            .unwrap_or(self.default_locale.as_str())
            .to_string()
    }

    fn best_accept_language(&self, header: &str) -> Option<&str> {
        let mut candidates: Vec<(&str, f32)> = header
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = parts
                    .find_map(|param| param.trim().strip_prefix("q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0).then_some((tag, quality))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        candidates.into_iter().find_map(|(tag, _)| {
            self.supported_locale(tag).or_else(|| {
                let primary = primary_subtag(tag);
                self.supported_locales
                    .iter()
                    .find(|locale| primary_subtag(locale).eq_ignore_ascii_case(primary))
                    .map(String::as_str)
            })
        })
    }
}

fn host_matches(bound: &str, host: &str) -> bool {
    match bound.strip_prefix("*.") {
        Some(suffix) => host
            .strip_suffix(suffix)
            .is_some_and(|prefix| prefix.ends_with('.')),
        None => bound.eq_ignore_ascii_case(host),
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Culture cookie value: `c=fr-FR|uic=fr-FR`, possibly percent-encoded.
fn parse_culture_cookie(raw: &str) -> Option<String> {
    let decoded = raw
        .replace("%3D", "=")
        .replace("%3d", "=")
        .replace("%7C", "|")
        .replace("%7c", "|");
    decoded
        .split('|')
        .find_map(|part| part.strip_prefix("uic=").or_else(|| part.strip_prefix("c=")))
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}
