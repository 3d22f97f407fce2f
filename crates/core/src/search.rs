//! Search result and metadata filter types shared across the engine.

use crate::metadata::Metadata;

/// A single search hit: a store slot index and its distance to the query.
///
/// Results are always returned sorted ascending by distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Stable slot index into the vector store.
    pub index: usize,
    /// Distance to the query under the collection metric (lower is closer).
    pub distance: f32,
}

/// Exact-match metadata predicate: a slot matches iff its metadata contains
/// the `(key, value)` entry. An empty key means "no filter".
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub key: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// True when no filtering was requested.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Evaluate the predicate against a metadata record.
    pub fn matches(&self, meta: &Metadata) -> bool {
        if self.is_empty() {
            return true;
        }
        meta.get(&self.key) == Some(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let f = MetadataFilter::default();
        assert!(f.is_empty());
        assert!(f.matches(&Metadata::new()));
        assert!(f.matches(&meta(&[("a", "b")])));
    }

    #[test]
    fn test_exact_match() {
        let f = MetadataFilter::new("cluster", "2");
        assert!(f.matches(&meta(&[("cluster", "2"), ("lang", "en")])));
        assert!(!f.matches(&meta(&[("cluster", "1")])));
        assert!(!f.matches(&meta(&[("lang", "en")])));
    }
}
