use url::Url;

use super::error::DomainError;

/// Site and locale a single request renders for.
///
/// Built once per request by the site resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    site_name: String,
    locale: String,
    api_key: String,
    instance_uri: Url,
}

impl SiteContext {
    pub fn new(
        site_name: impl Into<String>,
        locale: impl Into<String>,
        api_key: impl Into<String>,
        instance_uri: Url,
    ) -> Result<Self, DomainError> {
        let site_name = site_name.into();
        let locale = locale.into();
        let api_key = api_key.into();
        if site_name.trim().is_empty() {
            return Err(DomainError::Empty("site name"));
        }
        if locale.trim().is_empty() {
            return Err(DomainError::Empty("locale"));
        }
        if locale.contains(char::is_whitespace) {
            return Err(DomainError::Malformed {
                field: "locale",
                value: locale,
            });
        }
        if api_key.trim().is_empty() {
            return Err(DomainError::Empty("api key"));
        }
        Ok(Self {
            site_name,
            locale,
            api_key,
            instance_uri,
        })
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn instance_uri(&self) -> &Url {
        &self.instance_uri
    }
}
