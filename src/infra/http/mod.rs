mod editor;
mod middleware;
mod public;

pub use middleware::{ClientAddress, ExternalOrigin, RequestContext};
pub use public::{HttpState, build_router};
