//! Registrable-domain memoization over the Public Suffix List.
//!
//! `psl` lookups dominate URL normalization cost on a hot parse, and the
//! same hosts repeat heavily inside one WAT file. Each parser owns its own
//! cache, so no synchronization is involved and dropping the parser bounds
//! the memory of a long run.

use std::collections::HashMap;

/// Per-worker host → registrable-domain memo. Hosts with no registrable
/// domain are cached as `None` so repeated garbage hosts stay cheap.
#[derive(Debug, Default)]
pub struct DomainCache {
    map: HashMap<String, Option<String>>,
}

impl DomainCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The public-suffix-plus-one portion of `host`, or `None` when the host
    /// has no registrable domain.
    pub fn registrable(&mut self, host: &str) -> Option<String> {
        if let Some(cached) = self.map.get(host) {
            return cached.clone();
        }
        let computed = psl::domain_str(host).map(str::to_string);
        self.map.insert(host.to_string(), computed.clone());
        computed
    }

    /// Number of memoized hosts.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_simple_domains() {
        let mut cache = DomainCache::new();
        assert_eq!(
            cache.registrable("www.example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(
            cache.registrable("example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn resolves_multi_part_suffixes() {
        let mut cache = DomainCache::new();
        assert_eq!(
            cache.registrable("sub.example.co.uk"),
            Some("example.co.uk".to_string())
        );
    }

    #[test]
    fn caches_misses() {
        let mut cache = DomainCache::new();
        assert_eq!(cache.registrable("localhost"), None);
        assert_eq!(cache.registrable("localhost"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let mut cache = DomainCache::new();
        cache.registrable("www.example.com");
        cache.registrable("www.example.com");
        cache.registrable("other.example.com");
        assert_eq!(cache.len(), 2);
    }
}
