//! Application services: site resolution, layout fetching and rendering.

pub mod editor;
pub mod error;
pub mod layout;
pub mod page;
pub mod render;
pub mod site;
pub mod tracking;
