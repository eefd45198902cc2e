//! Bounded per-session cache of loaded resources.

use std::num::NonZeroUsize;

use lru::LruCache;
use remount_core::ResourcePath;

use crate::node::RemoteNode;

/// A cached lookup result.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Present(RemoteNode),
    /// Confirmed absent.
    Missing,
}

impl CacheEntry {
    pub fn node(&self) -> Option<&RemoteNode> {
        match self {
            CacheEntry::Present(node) => Some(node),
            CacheEntry::Missing => None,
        }
    }
}

/// Least-recently-used map from local path to lookup result.
///
/// Negative entries count toward the capacity like any other.
pub struct ResolverCache {
    entries: LruCache<ResourcePath, CacheEntry>,
}

impl ResolverCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a path, marking it most recently used.
    pub fn get(&mut self, path: &ResourcePath) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Look up a path without touching its recency.
    pub fn peek(&self, path: &ResourcePath) -> Option<&CacheEntry> {
        self.entries.peek(path)
    }

    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.entries.contains(path)
    }

    /// Insert an entry, returning the path evicted to make room, if any.
    pub fn insert(&mut self, path: ResourcePath, entry: CacheEntry) -> Option<ResourcePath> {
        match self.entries.push(path.clone(), entry) {
            Some((evicted, _)) if evicted != path => Some(evicted),
            _ => None,
        }
    }

    /// Mutable access to a cached node, without touching its recency.
    pub fn node_mut(&mut self, path: &ResourcePath) -> Option<&mut RemoteNode> {
        match self.entries.peek_mut(path) {
            Some(CacheEntry::Present(node)) => Some(node),
            _ => None,
        }
    }

    /// Forget everything below `path` and remember `path` itself as missing.
    pub fn discard(&mut self, path: &ResourcePath) {
        let below: Vec<ResourcePath> = self
            .entries
            .iter()
            .map(|(p, _)| p)
            .filter(|p| p.is_descendant_of(path))
            .cloned()
            .collect();
        for p in below {
            self.entries.pop(&p);
        }
        self.entries.put(path.clone(), CacheEntry::Missing);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for ResolverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ResourceKind;
    use remount_core::{rpath, PropertyMap};

    fn cache(capacity: usize) -> ResolverCache {
        ResolverCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn present(path: &str) -> CacheEntry {
        CacheEntry::Present(RemoteNode::new(
            rpath!(path),
            ResourceKind::Unknown,
            PropertyMap::new(),
        ))
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = cache(2);
        cache.insert(rpath!("/a"), present("/a"));
        cache.insert(rpath!("/b"), CacheEntry::Missing);

        // Touch /a so /b becomes the eviction candidate.
        assert!(cache.get(&rpath!("/a")).is_some());

        let evicted = cache.insert(rpath!("/c"), present("/c"));
        assert_eq!(evicted, Some(rpath!("/b")));
        assert!(cache.contains(&rpath!("/a")));
        assert!(!cache.contains(&rpath!("/b")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replacing_an_entry_is_not_an_eviction() {
        let mut cache = cache(1);
        cache.insert(rpath!("/a"), CacheEntry::Missing);
        assert_eq!(cache.insert(rpath!("/a"), present("/a")), None);
        assert!(cache.peek(&rpath!("/a")).unwrap().node().is_some());
    }

    #[test]
    fn discard_drops_descendants() {
        let mut cache = cache(10);
        for p in ["/a", "/a/b", "/a/b/c", "/ab", "/z"] {
            cache.insert(rpath!(p), present(p));
        }

        cache.discard(&rpath!("/a"));

        assert_eq!(cache.peek(&rpath!("/a")), Some(&CacheEntry::Missing));
        assert!(!cache.contains(&rpath!("/a/b")));
        assert!(!cache.contains(&rpath!("/a/b/c")));
        assert!(cache.contains(&rpath!("/ab")));
        assert!(cache.contains(&rpath!("/z")));
    }

    #[test]
    fn node_mut_updates_in_place() {
        let mut cache = cache(2);
        cache.insert(rpath!("/a"), present("/a"));
        cache
            .node_mut(&rpath!("/a"))
            .unwrap()
            .set_children(crate::node::Children::empty());
        assert!(cache.peek(&rpath!("/a")).unwrap().node().unwrap().children().is_resolved());
        assert!(cache.node_mut(&rpath!("/missing")).is_none());
    }
}
