use crate::core::identity::{self, PackageHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Installation scope a package lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PackageScope {
    #[default]
    Local,
    Global,
    User,
    Machine,
}

impl PackageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageScope::Local => "Local",
            PackageScope::Global => "Global",
            PackageScope::User => "User",
            PackageScope::Machine => "Machine",
        }
    }
}

impl fmt::Display for PackageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackageScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(PackageScope::Local),
            "global" => Ok(PackageScope::Global),
            "user" => Ok(PackageScope::User),
            "machine" => Ok(PackageScope::Machine),
            other => Err(format!(
                "Unknown scope '{}'. Valid: local, global, user, machine",
                other
            )),
        }
    }
}

/// Processing state of a package as seen by the orchestration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageTag {
    #[default]
    Default,
    AlreadyInstalled,
    IsUpgradable,
    Pinned,
    OnQueue,
    BeingProcessed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Install,
    Update,
    Uninstall,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Install => "install",
            OperationType::Update => "update",
            OperationType::Uninstall => "uninstall",
        };
        f.write_str(s)
    }
}

/// Per-package overrides applied on top of the install options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverriddenOptions {
    pub scope: Option<PackageScope>,
    pub run_as_admin: Option<bool>,
}

/// A package record produced by a manager adapter.
///
/// Identity fields are immutable. The processing tag and option overrides
/// are interior-mutable so the canonical instance held by the cache can be
/// shared between listing views and the operation queue.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub id: String,
    pub version: String,
    pub new_version: Option<String>,
    pub source: String,
    pub manager: String,
    pub scope: PackageScope,
    tag: RwLock<PackageTag>,
    overrides: RwLock<OverriddenOptions>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
        manager: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            version: version.into(),
            new_version: None,
            source: source.into(),
            manager: manager.into(),
            scope: PackageScope::Local,
            tag: RwLock::new(PackageTag::Default),
            overrides: RwLock::new(OverriddenOptions::default()),
        }
    }

    pub fn with_new_version(mut self, new_version: impl Into<String>) -> Self {
        self.new_version = Some(new_version.into());
        self
    }

    pub fn with_scope(mut self, scope: PackageScope) -> Self {
        self.scope = scope;
        self
    }

    /// Identity of the package: (manager, source, id)
    pub fn hash(&self) -> PackageHash {
        identity::identity_hash(&self.manager, &self.source, &self.id)
    }

    /// Exact-state identity: (manager, source, id, version, new version)
    pub fn versioned_hash(&self) -> PackageHash {
        identity::versioned_hash(
            &self.manager,
            &self.source,
            &self.id,
            &self.version,
            self.new_version.as_deref(),
        )
    }

    pub fn is_equivalent_to(&self, other: &Package) -> bool {
        self.hash() == other.hash()
    }

    pub fn is_upgradable(&self) -> bool {
        self.new_version.is_some()
    }

    pub fn version_as_float(&self) -> f64 {
        version_as_float(&self.version)
    }

    pub fn new_version_as_float(&self) -> f64 {
        self.new_version
            .as_deref()
            .map(version_as_float)
            .unwrap_or(-1.0)
    }

    pub fn tag(&self) -> PackageTag {
        *self.tag.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_tag(&self, tag: PackageTag) {
        *self.tag.write().unwrap_or_else(PoisonError::into_inner) = tag;
    }

    pub fn overrides(&self) -> OverriddenOptions {
        *self.overrides.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_overrides(&self, overrides: OverriddenOptions) {
        *self.overrides.write().unwrap_or_else(PoisonError::into_inner) = overrides;
    }
}

impl Clone for Package {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            id: self.id.clone(),
            version: self.version.clone(),
            new_version: self.new_version.clone(),
            source: self.source.clone(),
            manager: self.manager.clone(),
            scope: self.scope,
            tag: RwLock::new(self.tag()),
            overrides: RwLock::new(self.overrides()),
        }
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Package {}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.new_version {
            Some(new) => write!(f, "{}:{} {} -> {}", self.manager, self.id, self.version, new),
            None => write!(f, "{}:{} {}", self.manager, self.id, self.version),
        }
    }
}

/// Keep digits and the first dot only, then parse. Unparsable input yields -1.
pub fn version_as_float(version: &str) -> f64 {
    let mut cleaned = String::with_capacity(version.len());
    let mut dot_seen = false;
    for c in version.chars() {
        if c.is_ascii_digit() {
            cleaned.push(c);
        } else if c == '.' && !dot_seen {
            cleaned.push(c);
            dot_seen = true;
        }
    }
    cleaned.parse::<f64>().unwrap_or(-1.0)
}

/// Turn a package identifier into a display name (`foo-bar_baz` -> `Foo Bar Baz`)
pub fn format_as_name(id: &str) -> String {
    id.split(['-', '_', '.'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_as_float_keeps_first_dot() {
        assert_eq!(version_as_float("1.2.3"), 1.23);
        assert_eq!(version_as_float("v10.4"), 10.4);
        assert_eq!(version_as_float("2.0-beta"), 2.0);
        assert_eq!(version_as_float("latest"), -1.0);
    }

    #[test]
    fn test_format_as_name() {
        assert_eq!(format_as_name("foo-bar_baz"), "Foo Bar Baz");
        assert_eq!(format_as_name("ripgrep"), "Ripgrep");
    }

    #[test]
    fn test_clone_keeps_tag_and_overrides() {
        let pkg = Package::new("Foo", "foo", "1.0", "npm", "Npm");
        pkg.set_tag(PackageTag::OnQueue);
        pkg.set_overrides(OverriddenOptions {
            scope: Some(PackageScope::Global),
            run_as_admin: Some(true),
        });

        let copy = pkg.clone();
        assert_eq!(copy.tag(), PackageTag::OnQueue);
        assert_eq!(copy.overrides().scope, Some(PackageScope::Global));
        assert_eq!(copy, pkg);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("GLOBAL".parse::<PackageScope>(), Ok(PackageScope::Global));
        assert!("system".parse::<PackageScope>().is_err());
    }

    #[test]
    fn test_upgradable_only_with_new_version() {
        let pkg = Package::new("Foo", "foo", "1.0", "npm", "Npm");
        assert!(!pkg.is_upgradable());
        assert!(pkg.with_new_version("1.1").is_upgradable());
    }
}
