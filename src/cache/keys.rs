//! Cache key for layout documents.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Handler name plus the exact query sent upstream.
///
/// Two requests share an entry only when they would produce the same wire request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutCacheKey {
    handler: String,
    query: Vec<(String, String)>,
}

impl LayoutCacheKey {
    pub fn new(handler: &str, query: &[(String, String)]) -> Self {
        Self {
            handler: handler.to_ascii_lowercase(),
            query: query.to_vec(),
        }
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Short fingerprint for logs; the query carries the API key.
    pub fn fingerprint(&self) -> u64 {
        hash_value(self)
    }
}

/// Hash any hashable value with the std hasher.
fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(locale: &str) -> Vec<(String, String)> {
        vec![
            ("item".to_string(), "/".to_string()),
            ("sc_lang".to_string(), locale.to_string()),
        ]
    }

    #[test]
    fn handler_name_is_case_insensitive() {
        let a = LayoutCacheKey::new("Default", &query("en"));
        let b = LayoutCacheKey::new("default", &query("en"));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn query_differences_produce_distinct_keys() {
        let en = LayoutCacheKey::new("default", &query("en"));
        let fr = LayoutCacheKey::new("default", &query("fr"));
        assert_ne!(en, fr);
    }
}
