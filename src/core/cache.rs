//! Canonical package instances
//!
//! Repeated discovery calls build fresh `Package` records. The cache maps each of
//! them to one canonical shared instance per view so tags set by the operation
//! layer survive the next listing cycle.

use crate::core::identity::PackageHash;
use crate::core::types::Package;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type PackageMap = RwLock<HashMap<PackageHash, Arc<Package>>>;

#[derive(Debug, Default)]
pub struct PackageCache {
    available: PackageMap,
    upgradable: PackageMap,
    installed: PackageMap,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical instance in the "available" view, keyed by identity hash
    pub fn get_available(&self, package: Package) -> Arc<Package> {
        let key = package.hash();
        canonicalize(&self.available, key, package)
    }

    /// Canonical instance in the "upgradable" view, keyed by identity hash
    pub fn get_upgradable(&self, package: Package) -> Arc<Package> {
        let key = package.hash();
        canonicalize(&self.upgradable, key, package)
    }

    /// Canonical instance in the "installed" view, keyed by versioned hash
    pub fn get_installed(&self, package: Package) -> Arc<Package> {
        let key = package.versioned_hash();
        canonicalize(&self.installed, key, package)
    }

    pub fn get_available_or_none(&self, package: &Package) -> Option<Arc<Package>> {
        lookup(&self.available, package.hash())
    }

    pub fn get_upgradable_or_none(&self, package: &Package) -> Option<Arc<Package>> {
        lookup(&self.upgradable, package.hash())
    }

    pub fn get_installed_or_none(&self, package: &Package) -> Option<Arc<Package>> {
        lookup(&self.installed, package.versioned_hash())
    }

    /// True if an installed package with the same identity already carries the
    /// version `other` would upgrade to.
    pub fn newer_version_is_installed(&self, other: &Package) -> bool {
        let target = other.new_version_as_float();
        let installed = self.installed.read().unwrap_or_else(PoisonError::into_inner);
        installed
            .values()
            .any(|found| found.is_equivalent_to(other) && found.version_as_float() == target)
    }

    pub fn clear(&self) {
        for map in [&self.available, &self.upgradable, &self.installed] {
            map.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

fn canonicalize(map: &PackageMap, key: PackageHash, package: Package) -> Arc<Package> {
    let mut guard = map.write().unwrap_or_else(PoisonError::into_inner);
    guard.entry(key).or_insert_with(|| Arc::new(package)).clone()
}

fn lookup(map: &PackageMap, key: PackageHash) -> Option<Arc<Package>> {
    map.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PackageTag;
    use std::thread;

    #[test]
    fn test_repeated_discovery_returns_same_instance() {
        let cache = PackageCache::new();
        let first = cache.get_available(Package::new("Foo", "foo", "1.0", "npm", "Npm"));
        first.set_tag(PackageTag::OnQueue);

        let second = cache.get_available(Package::new("Foo", "foo", "1.0", "npm", "Npm"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.tag(), PackageTag::OnQueue);
    }

    #[test]
    fn test_three_update_results_collapse_to_one() {
        let cache = PackageCache::new();
        let results: Vec<_> = (0..3)
            .map(|_| {
                cache.get_upgradable(
                    Package::new("Foo", "foo", "1.0", "npm", "Npm").with_new_version("2.0"),
                )
            })
            .collect();

        assert!(results.iter().all(|p| Arc::ptr_eq(p, &results[0])));
        assert!(cache.get_upgradable_or_none(&results[0]).is_some());
    }

    #[test]
    fn test_installed_view_uses_versioned_hash() {
        let cache = PackageCache::new();
        let v1 = cache.get_installed(Package::new("Foo", "foo", "1.0", "npm", "Npm"));
        let v2 = cache.get_installed(Package::new("Foo", "foo", "2.0", "npm", "Npm"));
        assert!(!Arc::ptr_eq(&v1, &v2));
    }

    #[test]
    fn test_newer_version_is_installed() {
        let cache = PackageCache::new();
        cache.get_installed(Package::new("Foo", "foo", "2.0", "npm", "Npm"));

        let upgrade = Package::new("Foo", "foo", "1.0", "npm", "Npm").with_new_version("2.0");
        assert!(cache.newer_version_is_installed(&upgrade));

        let other = Package::new("Bar", "bar", "1.0", "npm", "Npm").with_new_version("2.0");
        assert!(!cache.newer_version_is_installed(&other));
    }

    #[test]
    fn test_concurrent_canonicalization_converges() {
        let cache = Arc::new(PackageCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.get_available(Package::new("Foo", "foo", "1.0", "npm", "Npm"))
                })
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(instances.iter().all(|p| Arc::ptr_eq(p, &instances[0])));
    }
}
