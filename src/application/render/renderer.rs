use std::sync::Arc;

use askama::Template;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::layout::{ComponentNode, LayoutDocument};

use super::registry::{
    ComponentBinding, ComponentRegistry, ModelRenderError, PartialView, ViewComponent,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render component `{component}`")]
    Template {
        component: String,
        #[source]
        source: askama::Error,
    },
    #[error("fields of component `{component}` do not fit model `{model}`")]
    Model {
        component: String,
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// HTML for the component tree plus what the page shell needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub name: Option<String>,
    pub body: String,
    pub component_count: usize,
    pub fallback_count: usize,
}

#[derive(Template)]
#[template(path = "components/component.html")]
struct FieldsPartial<'a> {
    name: &'a str,
    fields: Vec<(String, String)>,
    children_html: &'a str,
}

#[derive(Template)]
#[template(path = "components/not_found.html")]
struct NotFoundPartial<'a> {
    name: &'a str,
    children_html: &'a str,
}

#[derive(Template)]
#[template(path = "components/view_component.html")]
struct ContainerView<'a> {
    name: &'a str,
    children_html: &'a str,
    child_count: usize,
}

/// Renders layout documents through a [`ComponentRegistry`].
#[derive(Debug, Clone)]
pub struct ComponentRenderer {
    registry: Arc<ComponentRegistry>,
}

impl ComponentRenderer {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Every component in the tree produces markup; unbound names go through
    /// the fallback binding.
    pub fn render_document(
        &self,
        document: &LayoutDocument,
    ) -> Result<RenderedDocument, RenderError> {
        let mut fallback_count = 0;
        let mut body = String::new();
        for node in &document.components {
            body.push_str(&self.render_node(node, &mut fallback_count)?);
        }

        Ok(RenderedDocument {
            name: document.name.clone(),
            body,
            component_count: document.component_count(),
            fallback_count,
        })
    }

    fn render_node(
        &self,
        node: &ComponentNode,
        fallback_count: &mut usize,
    ) -> Result<String, RenderError> {
        let mut children_html = String::new();
        for child in &node.children {
            children_html.push_str(&self.render_node(child, fallback_count)?);
        }

        let binding = match self.registry.lookup(&node.name) {
            Ok(binding) => binding,
            Err(missing) => {
                debug!(
                    target = "pumpkin::render",
                    component = %node.name,
                    error = %missing,
                    "Rendering component through fallback binding"
                );
                *fallback_count += 1;
                self.registry.fallback()
            }
        };

        match self.render_binding(binding, node, &children_html) {
            Ok(html) => Ok(html),
            Err(ModelRenderError::Fields { model, source }) => {
                warn!(
                    target = "pumpkin::render",
                    component = %node.name,
                    model,
                    error = %source,
                    "Component fields do not fit the bound model; using fallback binding"
                );
                *fallback_count += 1;
                self.render_binding(self.registry.fallback(), node, &children_html)
                    .map_err(|err| component_error(node, err))
            }
            Err(err) => Err(component_error(node, err)),
        }
    }

    fn render_binding(
        &self,
        binding: ComponentBinding,
        node: &ComponentNode,
        children_html: &str,
    ) -> Result<String, ModelRenderError> {
        let html = match binding {
            ComponentBinding::Partial(PartialView::Fields) => FieldsPartial {
                name: &node.name,
                fields: field_pairs(node),
                children_html,
            }
            .render()?,
            ComponentBinding::Partial(PartialView::NotFound) => NotFoundPartial {
                name: &node.name,
                children_html,
            }
            .render()?,
            ComponentBinding::ViewComponent(ViewComponent::Container) => ContainerView {
                name: &node.name,
                children_html,
                child_count: node.children.len(),
            }
            .render()?,
            ComponentBinding::ModelBound(model) => {
                let mut html = model.render(node)?;
                html.push_str(children_html);
                html
            }
        };
        Ok(html)
    }
}

fn field_pairs(node: &ComponentNode) -> Vec<(String, String)> {
    node.fields
        .keys()
        .filter_map(|key| node.field_text(key).map(|text| (key.clone(), text)))
        .collect()
}

fn component_error(node: &ComponentNode, err: ModelRenderError) -> RenderError {
    let component = node.name.clone();
    match err {
        ModelRenderError::Template(source) => RenderError::Template { component, source },
        ModelRenderError::Fields { model, source } => RenderError::Model {
            component,
            model,
            source,
        },
    }
}
