pub mod error;
pub mod layout;
pub mod render_mode;
pub mod request;
pub mod site;
