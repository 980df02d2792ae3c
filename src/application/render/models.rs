use askama::Template;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A typed view model bound to a component name.
///
/// The model is deserialized from the component's plain field map and then
/// rendered through its own template.
pub trait ComponentModel: DeserializeOwned + Template {
    const MODEL: &'static str;
}

#[derive(Debug, Clone, Deserialize, Template)]
#[template(path = "components/hero.html")]
pub struct HeroModel {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
}

impl ComponentModel for HeroModel {
    const MODEL: &'static str = "hero";
}

/// Rich text block; the `text` field is trusted markup from the CMS.
#[derive(Debug, Clone, Deserialize, Template)]
#[template(path = "components/rich_text.html")]
pub struct RichTextModel {
    #[serde(default)]
    pub text: String,
}

impl ComponentModel for RichTextModel {
    const MODEL: &'static str = "rich_text";
}
