//! Layout request options and the layout document returned by the layout service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ITEM_PARAM: &str = "item";
pub const SITE_PARAM: &str = "sc_site";
pub const LANGUAGE_PARAM: &str = "sc_lang";
pub const API_KEY_PARAM: &str = "sc_apikey";
pub const MODE_PARAM: &str = "sc_mode";
pub const EDIT_MODE_VALUE: &str = "edit";

const DEFAULT_PATH: &str = "/";

/// One layer of layout request options.
///
/// Handler defaults, process-wide defaults and per-call overrides all use this
/// type; [`LayoutRequestOptions::merged_with`] stacks them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutRequestOptions {
    pub path: Option<String>,
    pub site_name: Option<String>,
    pub locale: Option<String>,
    pub edit_mode: Option<bool>,
    pub api_key: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

impl LayoutRequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = Some(site_name.into());
        self
    }

    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn edit_mode(mut self, edit_mode: bool) -> Self {
        self.edit_mode = Some(edit_mode);
        self
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Stack `overrides` on top of `self`. A key set in `overrides` wins.
    #[must_use]
    pub fn merged_with(&self, overrides: &LayoutRequestOptions) -> LayoutRequestOptions {
        let mut parameters = self.parameters.clone();
        parameters.extend(
            overrides
                .parameters
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        LayoutRequestOptions {
            path: overrides.path.clone().or_else(|| self.path.clone()),
            site_name: overrides.site_name.clone().or_else(|| self.site_name.clone()),
            locale: overrides.locale.clone().or_else(|| self.locale.clone()),
            edit_mode: overrides.edit_mode.or(self.edit_mode),
            api_key: overrides.api_key.clone().or_else(|| self.api_key.clone()),
            parameters,
        }
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode.unwrap_or(false)
    }

    pub fn effective_path(&self) -> &str {
        self.path
            .as_deref()
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_PATH)
    }

    /// Query pairs sent to the layout service.
    ///
    /// Typed fields take precedence over free-form parameters of the same name.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(ITEM_PARAM.to_string(), self.effective_path().to_string())];
        if let Some(site) = &self.site_name {
            pairs.push((SITE_PARAM.to_string(), site.clone()));
        }
        if let Some(locale) = &self.locale {
            pairs.push((LANGUAGE_PARAM.to_string(), locale.clone()));
        }
        if let Some(key) = &self.api_key {
            pairs.push((API_KEY_PARAM.to_string(), key.clone()));
        }
        if self.is_edit_mode() {
            pairs.push((MODE_PARAM.to_string(), EDIT_MODE_VALUE.to_string()));
        }

        let reserved = [
            ITEM_PARAM,
            SITE_PARAM,
            LANGUAGE_PARAM,
            API_KEY_PARAM,
            MODE_PARAM,
        ];
        pairs.extend(
            self.parameters
                .iter()
                .filter(|(key, _)| !reserved.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        pairs
    }
}

/// Page structure returned by the layout service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub context_rendering: bool,
    pub components: Vec<ComponentNode>,
}

impl LayoutDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Number of components in the tree, children included.
    pub fn component_count(&self) -> usize {
        fn count(nodes: &[ComponentNode]) -> usize {
            nodes.iter().map(|node| 1 + count(&node.children)).sum()
        }
        count(&self.components)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    #[serde(alias = "componentName")]
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<ComponentNode>,
}

impl ComponentNode {
    /// Field map with `{ "value": ... }` wrappers removed.
    pub fn plain_fields(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), unwrap_field(value).clone()))
            .collect()
    }

    pub fn field_text(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(unwrap_field).and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
    }
}

fn unwrap_field(value: &Value) -> &Value {
    match value {
        Value::Object(map) if map.len() <= 2 && map.contains_key("value") => {
            map.get("value").unwrap_or(value)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_lower_layers() {
        let handler = LayoutRequestOptions::new().site_name("A").locale("en");
        let process = LayoutRequestOptions::new().api_key("K");
        let call = LayoutRequestOptions::new().locale("fr");

        let effective = handler.merged_with(&process).merged_with(&call);

        assert_eq!(effective.site_name.as_deref(), Some("A"));
        assert_eq!(effective.locale.as_deref(), Some("fr"));
        assert_eq!(effective.api_key.as_deref(), Some("K"));
    }

    #[test]
    fn unset_override_keeps_lower_value() {
        let base = LayoutRequestOptions::new().edit_mode(true).parameter("x", "1");
        let merged = base.merged_with(&LayoutRequestOptions::new().parameter("y", "2"));
        assert!(merged.is_edit_mode());
        assert_eq!(merged.parameters.len(), 2);
    }

    #[test]
    fn query_pairs_default_path_and_skip_reserved_parameters() {
        let options = LayoutRequestOptions::new()
            .site_name("Default")
            .edit_mode(true)
            .parameter("sc_site", "Other")
            .parameter("tracking", "off");
        let pairs = options.query_pairs();

        assert_eq!(pairs[0], ("item".to_string(), "/".to_string()));
        assert!(pairs.contains(&("sc_site".to_string(), "Default".to_string())));
        assert!(!pairs.contains(&("sc_site".to_string(), "Other".to_string())));
        assert!(pairs.contains(&("sc_mode".to_string(), "edit".to_string())));
        assert!(pairs.contains(&("tracking".to_string(), "off".to_string())));
    }

    #[test]
    fn document_requires_components_envelope() {
        assert!(LayoutDocument::from_json(r#"{"name":"home"}"#).is_err());
    }

    #[test]
    fn document_accepts_component_name_alias_and_wrapped_fields() {
        let document = LayoutDocument::from_json(
            r#"{"components":[{"componentName":"Hero","fields":{"title":{"value":"Welcome"}},
                "children":[{"name":"Text"}]}]}"#,
        )
        .expect("valid document");

        let hero = &document.components[0];
        assert_eq!(hero.name, "Hero");
        assert_eq!(hero.field_text("title").as_deref(), Some("Welcome"));
        assert_eq!(document.component_count(), 2);
        assert!(!document.context_rendering);
    }
}
