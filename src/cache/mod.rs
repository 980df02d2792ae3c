//! Layout document cache.
//!
//! An optional in-memory LRU keyed by handler and effective query, with a
//! time-to-live per entry. Edit-mode requests never touch it.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 256
//! ttl_seconds = 30
//! ```

mod keys;
mod store;

pub use keys::LayoutCacheKey;
pub use store::{
    LayoutCache, METRIC_LAYOUT_CACHE_EVICT, METRIC_LAYOUT_CACHE_HIT, METRIC_LAYOUT_CACHE_MISS,
};
