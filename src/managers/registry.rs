//! # Manager Registry
//!
//! Manager adapters are registered as factory functions producing a
//! [`ManagerDefinition`]. The registry turns definitions into
//! [`PackageManager`] instances bound to one set of [`EngineServices`] and
//! initializes them concurrently.
//!
//! ## Adding a New Manager
//!
//! 1. Create `src/managers/adapters/<manager>.rs` exposing `NAME` and `definition()`
//! 2. Implement its listing and operation providers (and a source provider if
//!    it supports custom sources)
//! 3. Register it in `ManagerRegistry::register_defaults()`

use crate::error::{EngineError, Result};
use crate::managers::adapters::{cargo, chocolatey, dotnet, npm, pip, powershell7, scoop};
use crate::managers::engine::{EngineServices, ManagerDefinition, PackageManager};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Factory function for creating manager definitions
pub type ManagerFactory = Box<dyn Fn() -> Result<ManagerDefinition> + Send + Sync>;

struct Registration {
    name: String,
    aliases: Vec<String>,
    factory: ManagerFactory,
}

/// Ordered set of known manager factories
pub struct ManagerRegistry {
    registrations: Vec<Registration>,
}

impl ManagerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Register a manager; a later registration with the same name replaces it
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<ManagerDefinition> + Send + Sync + 'static,
    {
        self.registrations.retain(|r| r.name != name);
        self.registrations.push(Registration {
            name: name.to_string(),
            aliases: Vec::new(),
            factory: Box::new(factory),
        });
    }

    /// Extra lookup name for an already registered manager
    pub fn alias(&mut self, alias: &str, name: &str) {
        if let Some(registration) = self.registrations.iter_mut().find(|r| r.name == name) {
            registration.aliases.push(alias.to_string());
        }
    }

    pub fn registered_managers(&self) -> Vec<String> {
        self.registrations.iter().map(|r| r.name.clone()).collect()
    }

    pub fn has_manager(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }

    /// Canonical name for `query`, matched case-insensitively against names and aliases
    pub fn resolve_name(&self, query: &str) -> Option<&str> {
        let wanted = normalize(query);
        self.registrations
            .iter()
            .find(|r| {
                normalize(&r.name) == wanted || r.aliases.iter().any(|a| normalize(a) == wanted)
            })
            .map(|r| r.name.as_str())
    }

    pub fn create_definition(&self, name: &str) -> Result<ManagerDefinition> {
        let canonical = self
            .resolve_name(name)
            .ok_or_else(|| EngineError::ManagerNotFound(name.to_string()))?;
        let registration = self
            .registrations
            .iter()
            .find(|r| r.name == canonical)
            .ok_or_else(|| EngineError::ManagerNotFound(name.to_string()))?;
        (registration.factory)()
    }

    pub fn create_manager(&self, name: &str, services: &EngineServices) -> Result<PackageManager> {
        Ok(PackageManager::new(
            self.create_definition(name)?,
            services.clone(),
        ))
    }

    /// Every registered manager, uninitialized, in registration order
    pub fn create_all(&self, services: &EngineServices) -> Result<Vec<Arc<PackageManager>>> {
        self.registrations
            .iter()
            .map(|r| {
                let definition = (r.factory)()?;
                Ok(Arc::new(PackageManager::new(definition, services.clone())))
            })
            .collect()
    }

    /// Register all built-in managers
    pub fn register_defaults(&mut self) {
        self.register(npm::NAME, npm::definition);
        self.register(pip::NAME, pip::definition);
        self.register(cargo::NAME, cargo::definition);
        self.register(chocolatey::NAME, chocolatey::definition);
        self.alias("choco", chocolatey::NAME);
        self.register(scoop::NAME, scoop::definition);
        self.register(dotnet::NAME, dotnet::definition);
        self.alias("dotnet", dotnet::NAME);
        self.register(powershell7::NAME, powershell7::definition);
        self.alias("pwsh", powershell7::NAME);
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Initialize every manager concurrently. Contract violations are logged and
/// the offending managers dropped; the rest are returned in their original order.
pub async fn initialize_all(managers: Vec<Arc<PackageManager>>) -> Vec<Arc<PackageManager>> {
    let mut tasks = JoinSet::new();
    for (index, manager) in managers.iter().enumerate() {
        let manager = Arc::clone(manager);
        tasks.spawn(async move { (index, manager.initialize().await) });
    }

    let mut rejected = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((index, Err(e))) => {
                log::error!("Manager {} could not be initialized: {}", managers[index].name(), e);
                rejected.push(index);
            }
            Err(e) => log::error!("Manager initialization task failed: {}", e),
        }
    }

    managers
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !rejected.contains(index))
        .map(|(_, manager)| manager)
        .collect()
}

/// Find a loaded manager by name or display name, case-insensitively
pub fn find_manager<'a>(managers: &'a [Arc<PackageManager>], name: &str) -> Option<&'a Arc<PackageManager>> {
    let wanted = normalize(name);
    managers
        .iter()
        .find(|m| normalize(m.name()) == wanted || normalize(m.display_name()) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_registry_registration() {
        let registry = ManagerRegistry::default();
        assert_eq!(
            registry.registered_managers(),
            vec!["Npm", "Pip", "Cargo", "Chocolatey", "Scoop", ".NET Tool", "PowerShell7"]
        );
    }

    #[test]
    fn test_lookup_ignores_case_and_punctuation() {
        let registry = ManagerRegistry::default();
        assert_eq!(registry.resolve_name("npm"), Some("Npm"));
        assert_eq!(registry.resolve_name("CHOCO"), Some("Chocolatey"));
        assert_eq!(registry.resolve_name("dotnet"), Some(".NET Tool"));
        assert_eq!(registry.resolve_name(".net tool"), Some(".NET Tool"));
        assert!(!registry.has_manager("apt"));
    }

    #[test]
    fn test_every_default_definition_is_well_formed() {
        let registry = ManagerRegistry::default();
        let services = EngineServices::new(Arc::new(Settings::in_memory()));
        for name in registry.registered_managers() {
            let manager = registry.create_manager(&name, &services).unwrap();
            assert_eq!(manager.name(), name);
            assert!(
                manager.ensure_properly_constructed().is_ok(),
                "{} violates its contract",
                name
            );
        }
    }

    #[test]
    fn test_unknown_manager_is_an_error() {
        let registry = ManagerRegistry::new();
        let services = EngineServices::new(Arc::new(Settings::in_memory()));
        assert!(matches!(
            registry.create_manager("Npm", &services),
            Err(EngineError::ManagerNotFound(_))
        ));
    }

    #[test]
    fn test_register_replaces_existing_name() {
        let mut registry = ManagerRegistry::new();
        registry.register(npm::NAME, npm::definition);
        registry.register(npm::NAME, npm::definition);
        assert_eq!(registry.registered_managers().len(), 1);
    }

    #[test]
    fn test_find_loaded_manager() {
        let registry = ManagerRegistry::default();
        let services = EngineServices::new(Arc::new(Settings::in_memory()));
        let managers = registry.create_all(&services).unwrap();
        assert_eq!(find_manager(&managers, "powershell7").map(|m| m.name()), Some("PowerShell7"));
        assert_eq!(find_manager(&managers, "PowerShell 7.x").map(|m| m.name()), Some("PowerShell7"));
        assert!(find_manager(&managers, "winget").is_none());
    }
}
