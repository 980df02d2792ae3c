//! Component rendering.
//!
//! A layout document is rendered by walking its component tree and looking up
//! each component name in a [`ComponentRegistry`]. The registry is a closed
//! table of bindings (static partial, view component, typed model view) with
//! one fallback binding for names nobody registered.

mod models;
mod registry;
mod renderer;

pub use models::{ComponentModel, HeroModel, RichTextModel};
pub use registry::{
    ComponentBinding, ComponentBindingMissing, ComponentRegistry, ComponentRegistryBuilder,
    ModelBinding, PartialView, ViewComponent,
};
pub use renderer::{ComponentRenderer, RenderError, RenderedDocument};
