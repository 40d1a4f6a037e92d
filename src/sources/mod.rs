//! Source (repository) registry
//!
//! Each manager owns one registry of named sources. Looking up an unknown name
//! creates a placeholder entry; the placeholder URL is upgraded once discovery
//! or a later `add` supplies the real one. A real URL is never replaced.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// URL carried by sources whose real location is not known yet
pub const PLACEHOLDER_SOURCE_URL: &str = "https://unipkg.invalid/placeholder/";

#[derive(Debug, Serialize)]
pub struct ManagerSource {
    pub manager: String,
    pub name: String,
    #[serde(serialize_with = "serialize_url")]
    url: RwLock<String>,
    pub package_count: Option<u64>,
    pub update_date: Option<String>,
}

fn serialize_url<S: serde::Serializer>(
    url: &RwLock<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&url.read().unwrap_or_else(PoisonError::into_inner))
}

impl ManagerSource {
    pub fn new(manager: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            name: name.into(),
            url: RwLock::new(url.into()),
            package_count: None,
            update_date: None,
        }
    }

    pub fn placeholder(manager: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(manager, name, PLACEHOLDER_SOURCE_URL)
    }

    pub fn with_metadata(mut self, package_count: Option<u64>, update_date: Option<String>) -> Self {
        self.package_count = package_count;
        self.update_date = update_date;
        self
    }

    pub fn url(&self) -> String {
        self.url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_placeholder(&self) -> bool {
        *self.url.read().unwrap_or_else(PoisonError::into_inner) == PLACEHOLDER_SOURCE_URL
    }

    /// Replace a placeholder URL. Returns false (and changes nothing) if the
    /// current URL is already a real one.
    pub fn upgrade_url(&self, url: &str) -> bool {
        let mut current = self.url.write().unwrap_or_else(PoisonError::into_inner);
        if *current != PLACEHOLDER_SOURCE_URL {
            return false;
        }
        *current = url.to_string();
        true
    }
}

impl Clone for ManagerSource {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            name: self.name.clone(),
            url: RwLock::new(self.url()),
            package_count: self.package_count,
            update_date: self.update_date.clone(),
        }
    }
}

impl PartialEq for ManagerSource {
    fn eq(&self, other: &Self) -> bool {
        self.manager == other.manager && self.name == other.name && self.url() == other.url()
    }
}

impl fmt::Display for ManagerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url())
    }
}

/// Thread-safe per-manager registry of sources, in insertion order
#[derive(Debug)]
pub struct SourceRegistry {
    manager: String,
    sources: RwLock<Vec<Arc<ManagerSource>>>,
}

impl SourceRegistry {
    pub fn new(manager: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// Existing source, or a freshly inserted placeholder
    pub fn get_or_default(&self, name: &str) -> Arc<ManagerSource> {
        if let Some(found) = self.get_if_exists(name) {
            return found;
        }

        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        // Another task may have inserted it between the two locks
        if let Some(found) = sources.iter().find(|s| s.name == name) {
            return Arc::clone(found);
        }
        let created = Arc::new(ManagerSource::placeholder(self.manager.clone(), name));
        sources.push(Arc::clone(&created));
        created
    }

    pub fn get_if_exists(&self, name: &str) -> Option<Arc<ManagerSource>> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Insert `source`, or upgrade the URL of an existing placeholder entry
    /// with the same name. An existing entry with a real URL is kept as is.
    pub fn add(&self, source: ManagerSource) -> Arc<ManagerSource> {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sources.iter().find(|s| s.name == source.name) {
            if existing.is_placeholder() {
                existing.upgrade_url(&source.url());
            }
            return Arc::clone(existing);
        }
        let added = Arc::new(source);
        sources.push(Arc::clone(&added));
        added
    }

    pub fn list_all(&self) -> Vec<Arc<ManagerSource>> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        let before = sources.len();
        sources.retain(|s| s.name != name);
        sources.len() != before
    }

    pub fn reset(&self) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.sources.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
