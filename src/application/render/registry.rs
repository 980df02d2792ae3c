use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::domain::layout::ComponentNode;

use super::models::ComponentModel;

/// Static templates that only need the component's name and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialView {
    /// Lists the component's plain fields.
    Fields,
    /// Placeholder for components without a binding.
    NotFound,
}

/// Dynamic views that lay out the component's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewComponent {
    Container,
}

#[derive(Debug, Error)]
pub(crate) enum ModelRenderError {
    #[error("fields do not match model `{model}`: {source}")]
    Fields {
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Template(#[from] askama::Error),
}

type ModelRenderFn = fn(&ComponentNode) -> Result<String, ModelRenderError>;

/// A [`ComponentModel`] erased to a render function.
#[derive(Clone, Copy)]
pub struct ModelBinding {
    model: &'static str,
    render: ModelRenderFn,
}

impl ModelBinding {
    pub fn of<M: ComponentModel>() -> Self {
        Self {
            model: M::MODEL,
            render: render_model::<M>,
        }
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub(crate) fn render(&self, node: &ComponentNode) -> Result<String, ModelRenderError> {
        (self.render)(node)
    }
}

impl fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBinding")
            .field("model", &self.model)
            .finish()
    }
}

impl PartialEq for ModelBinding {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
    }
}

fn render_model<M: ComponentModel>(node: &ComponentNode) -> Result<String, ModelRenderError> {
    let model: M = serde_json::from_value(Value::Object(node.plain_fields())).map_err(|source| {
        ModelRenderError::Fields {
            model: M::MODEL,
            source,
        }
    })?;
    Ok(model.render()?)
}

/// How a component name is turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentBinding {
    Partial(PartialView),
    ViewComponent(ViewComponent),
    ModelBound(ModelBinding),
}

impl ComponentBinding {
    pub fn kind(&self) -> &'static str {
        match self {
            ComponentBinding::Partial(_) => "partial",
            ComponentBinding::ViewComponent(_) => "view_component",
            ComponentBinding::ModelBound(_) => "model_bound",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no component binding registered for `{0}`")]
pub struct ComponentBindingMissing(pub String);

/// Component name to binding table, read-only once built.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    bindings: HashMap<String, ComponentBinding>,
    fallback: ComponentBinding,
}

impl ComponentRegistry {
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// Bindings used by the rendering host out of the box.
    pub fn standard() -> Self {
        Self::builder()
            .add_partial_view("ContentBlock")
            .add_view_component("Container")
            .add_model_bound_view::<super::HeroModel>("Hero")
            .add_model_bound_view::<super::RichTextModel>("RichText")
            .add_default_partial_view()
            .build()
    }

    pub fn lookup(&self, name: &str) -> Result<ComponentBinding, ComponentBindingMissing> {
        self.bindings
            .get(name)
            .copied()
            .ok_or_else(|| ComponentBindingMissing(name.to_string()))
    }

    pub fn fallback(&self) -> ComponentBinding {
        self.fallback
    }
}

#[derive(Debug)]
pub struct ComponentRegistryBuilder {
    bindings: HashMap<String, ComponentBinding>,
    fallback: ComponentBinding,
}

impl Default for ComponentRegistryBuilder {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
            fallback: ComponentBinding::Partial(PartialView::NotFound),
        }
    }
}

impl ComponentRegistryBuilder {
    #[must_use]
    pub fn add_partial_view(self, name: impl Into<String>) -> Self {
        self.bind(name, ComponentBinding::Partial(PartialView::Fields))
    }

    #[must_use]
    pub fn add_view_component(self, name: impl Into<String>) -> Self {
        self.bind(name, ComponentBinding::ViewComponent(ViewComponent::Container))
    }

    #[must_use]
    pub fn add_model_bound_view<M: ComponentModel>(self, name: impl Into<String>) -> Self {
        self.bind(name, ComponentBinding::ModelBound(ModelBinding::of::<M>()))
    }

    /// Use the "not found" partial as the fallback binding.
    #[must_use]
    pub fn add_default_partial_view(self) -> Self {
        self.fallback(ComponentBinding::Partial(PartialView::NotFound))
    }

    #[must_use]
    pub fn fallback(mut self, binding: ComponentBinding) -> Self {
        self.fallback = binding;
        self
    }

    /// Later registrations for the same name replace earlier ones.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, binding: ComponentBinding) -> Self {
        self.bindings.insert(name.into(), binding);
        self
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            bindings: self.bindings,
            fallback: self.fallback,
        }
    }
}
