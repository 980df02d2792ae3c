use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::{config::SitecoreSettings, domain::layout::LayoutRequestOptions};

/// A named layout service endpoint with its own request defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRegistration {
    pub name: String,
    pub uri: Url,
    pub defaults: LayoutRequestOptions,
    pub timeout: Duration,
}

impl HandlerRegistration {
    pub fn new(name: impl Into<String>, uri: Url, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            uri,
            defaults: LayoutRequestOptions::default(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: LayoutRequestOptions) -> Self {
        self.defaults = defaults;
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerRegistryError {
    #[error("no layout handlers are registered")]
    Empty,
    #[error("layout handler `{0}` is registered more than once")]
    Duplicate(String),
    #[error("no default layout handler is registered")]
    NoDefault,
    #[error("more than one default layout handler: {0:?}")]
    MultipleDefaults(Vec<String>),
}

/// Read-only table of layout handlers with exactly one default.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<HandlerRegistration>,
    default_index: usize,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn from_settings(settings: &SitecoreSettings) -> Result<Self, HandlerRegistryError> {
        let mut builder = Self::builder();
        for handler in &settings.handlers {
            let mut defaults = LayoutRequestOptions::new();
            defaults.site_name = handler.site_name.clone();
            defaults.locale = handler.locale.clone();

            builder = builder.add_http_handler(
                HandlerRegistration::new(handler.name.clone(), handler.uri.clone(), handler.timeout)
                    .with_defaults(defaults),
            );
            if handler.default {
                builder = builder.as_default_handler();
            }
        }
        builder.build()
    }

    /// `None` or a blank name selects the default handler.
    pub fn resolve(&self, name: Option<&str>) -> Option<&HandlerRegistration> {
        match name.map(str::trim).filter(|name| !name.is_empty()) {
            None => Some(self.default_handler()),
            Some(name) => self
                .handlers
                .iter()
                .find(|handler| handler.name.eq_ignore_ascii_case(name)),
        }
    }

    pub fn default_handler(&self) -> &HandlerRegistration {
        &self.handlers[self.default_index]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|handler| handler.name.as_str())
    }
}

#[derive(Debug, Default)]
pub struct HandlerRegistryBuilder {
    entries: Vec<(HandlerRegistration, bool)>,
}

impl HandlerRegistryBuilder {
    #[must_use]
    pub fn add_http_handler(mut self, registration: HandlerRegistration) -> Self {
        self.entries.push((registration, false));
        self
    }

    /// Mark the most recently added handler as the default.
    #[must_use]
    pub fn as_default_handler(mut self) -> Self {
        if let Some((_, is_default)) = self.entries.last_mut() {
            *is_default = true;
        }
        self
    }

    pub fn build(self) -> Result<HandlerRegistry, HandlerRegistryError> {
        if self.entries.is_empty() {
            return Err(HandlerRegistryError::Empty);
        }

        for (index, (registration, _)) in self.entries.iter().enumerate() {
            let duplicate = self.entries[..index]
                .iter()
                .any(|(earlier, _)| earlier.name.eq_ignore_ascii_case(&registration.name));
            if duplicate {
                return Err(HandlerRegistryError::Duplicate(registration.name.clone()));
            }
        }

        let defaults: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, is_default))| *is_default)
            .map(|(index, _)| index)
            .collect();
        let default_index = match defaults.as_slice() {
            [] => return Err(HandlerRegistryError::NoDefault),
            [index] => *index,
            many => {
                return Err(HandlerRegistryError::MultipleDefaults(
                    many.iter()
                        .map(|index| self.entries[*index].0.name.clone())
                        .collect(),
                ));
            }
        };

        Ok(HandlerRegistry {
            handlers: self
                .entries
                .into_iter()
                .map(|(registration, _)| registration)
                .collect(),
            default_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(name: &str) -> HandlerRegistration {
        HandlerRegistration::new(
            name,
            Url::parse("https://cm.example.test/layout").expect("valid url"),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn resolves_default_and_named_handlers() {
        let registry = HandlerRegistry::builder()
            .add_http_handler(handler("default"))
            .as_default_handler()
            .add_http_handler(handler("Preview"))
            .build()
            .expect("valid registry");

        assert_eq!(registry.resolve(None).map(|h| h.name.as_str()), Some("default"));
        assert_eq!(registry.resolve(Some(" ")).map(|h| h.name.as_str()), Some("default"));
        assert_eq!(
            registry.resolve(Some("preview")).map(|h| h.name.as_str()),
            Some("Preview")
        );
        assert!(registry.resolve(Some("missing")).is_none());
    }

    #[test]
    fn requires_exactly_one_default() {
        let none = HandlerRegistry::builder()
            .add_http_handler(handler("a"))
            .build();
        assert_eq!(none.err(), Some(HandlerRegistryError::NoDefault));

        let two = HandlerRegistry::builder()
            .add_http_handler(handler("a"))
            .as_default_handler()
            .add_http_handler(handler("b"))
            .as_default_handler()
            .build();
        assert_eq!(
            two.err(),
            Some(HandlerRegistryError::MultipleDefaults(vec![
                "a".to_string(),
                "b".to_string()
            ]))
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = HandlerRegistry::builder()
            .add_http_handler(handler("default"))
            .as_default_handler()
            .add_http_handler(handler("DEFAULT"))
            .build();
        assert_eq!(
            result.err(),
            Some(HandlerRegistryError::Duplicate("DEFAULT".to_string()))
        );
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert_eq!(
            HandlerRegistry::builder().build().err(),
            Some(HandlerRegistryError::Empty)
        );
    }
}
