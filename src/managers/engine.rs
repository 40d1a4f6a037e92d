//! The per-manager orchestration engine
//!
//! Every adapter plugs into [`PackageManager`], which owns the manager's
//! status and capabilities and drives listing calls with a bounded wait and a
//! single fast-repair retry. Listing operations never fail: the worst case is
//! an empty result plus a logged fault, which callers must read as "no data
//! available now" rather than "zero packages".

use crate::config::{SettingsStore, keys};
use crate::core::cache::PackageCache;
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageTag};
use crate::core::verdict::OperationVerdict;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventBus, ManagerInitialized};
use crate::managers::traits::{
    ListingProvider, ManagerContext, OperationProvider, SourceProvider, source_verdict,
};
use crate::managers::types::{ManagerCapabilities, ManagerProperties, ManagerState, ManagerStatus};
use crate::process::{LoggableTaskType, ManagerLogger, ProcessCommand, ProcessHarness};
use crate::sources::{ManagerSource, SourceRegistry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default wait budget for listing tasks, in seconds
pub const PACKAGE_LISTING_TASK_TIMEOUT: u64 = 60;

/// First attempt plus one retry after fast repair
const LISTING_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct EngineTimeouts {
    pub listing: Duration,
    pub refresh: Duration,
    pub source_discovery: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            listing: Duration::from_secs(PACKAGE_LISTING_TASK_TIMEOUT),
            refresh: Duration::from_secs(PACKAGE_LISTING_TASK_TIMEOUT),
            source_discovery: Duration::from_secs(PACKAGE_LISTING_TASK_TIMEOUT),
        }
    }
}

/// Collaborators shared by every manager
#[derive(Clone)]
pub struct EngineServices {
    pub settings: Arc<dyn SettingsStore>,
    pub cache: Arc<PackageCache>,
    pub events: EventBus,
    pub timeouts: EngineTimeouts,
}

impl EngineServices {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            cache: Arc::new(PackageCache::new()),
            events: EventBus::new(),
            timeouts: EngineTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: EngineTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Static parts of a manager, produced by an adapter factory
pub struct ManagerDefinition {
    pub properties: ManagerProperties,
    pub capabilities: ManagerCapabilities,
    pub listing: Arc<dyn ListingProvider>,
    pub operations: Arc<dyn OperationProvider>,
    pub sources: Option<Arc<dyn SourceProvider>>,
}

pub struct PackageManager {
    properties: ManagerProperties,
    capabilities: ManagerCapabilities,
    listing: Arc<dyn ListingProvider>,
    operations: Arc<dyn OperationProvider>,
    source_provider: Option<Arc<dyn SourceProvider>>,
    sources: Arc<SourceRegistry>,
    harness: ProcessHarness,
    services: EngineServices,
    status: RwLock<ManagerStatus>,
    state: RwLock<ManagerState>,
}

impl PackageManager {
    pub fn new(definition: ManagerDefinition, services: EngineServices) -> Self {
        let name = definition.properties.name.clone();
        let logger = Arc::new(ManagerLogger::new(name.clone()));
        Self {
            properties: definition.properties,
            capabilities: definition.capabilities,
            listing: definition.listing,
            operations: definition.operations,
            source_provider: definition.sources,
            sources: Arc::new(SourceRegistry::new(name)),
            harness: ProcessHarness::new(logger),
            services,
            status: RwLock::new(ManagerStatus::default()),
            state: RwLock::new(ManagerState::Uninitialized),
        }
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn display_name(&self) -> &str {
        &self.properties.display_name
    }

    pub fn properties(&self) -> &ManagerProperties {
        &self.properties
    }

    pub fn capabilities(&self) -> &ManagerCapabilities {
        &self.capabilities
    }

    pub fn status(&self) -> ManagerStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ManagerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn logger(&self) -> &Arc<ManagerLogger> {
        self.harness.logger()
    }

    pub fn source_registry(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    pub fn cache(&self) -> &Arc<PackageCache> {
        &self.services.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.services.events
    }

    pub fn operations(&self) -> &Arc<dyn OperationProvider> {
        &self.operations
    }

    pub fn is_enabled(&self) -> bool {
        !self
            .services
            .settings
            .get_dictionary_item(keys::DISABLED_MANAGERS, self.name())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ManagerState::Ready && self.is_enabled()
    }

    /// Snapshot handed to providers
    pub fn context(&self) -> Arc<ManagerContext> {
        Arc::new(ManagerContext {
            properties: self.properties.clone(),
            capabilities: self.capabilities,
            status: self.status(),
            sources: Arc::clone(&self.sources),
            harness: self.harness.clone(),
        })
    }

    fn set_state(&self, state: ManagerState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn set_status(&self, status: ManagerStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Detect adapters assembled with capabilities they cannot honor
    pub fn ensure_properly_constructed(&self) -> Result<()> {
        if self.properties.name.trim().is_empty() {
            return Err(EngineError::ContractViolation(
                "a manager was constructed without a name".to_string(),
            ));
        }
        if self.properties.executable_names.is_empty() {
            return Err(EngineError::ContractViolation(format!(
                "Manager {} does not declare any executable",
                self.name()
            )));
        }
        if self.capabilities.supports_custom_sources {
            if self.source_provider.is_none() {
                return Err(EngineError::ContractViolation(format!(
                    "Manager {} has been declared as supporting custom sources but has no source provider",
                    self.name()
                )));
            }
            if self.properties.default_source.is_none() {
                return Err(EngineError::ContractViolation(format!(
                    "Manager {} supports custom sources but declares no default source",
                    self.name()
                )));
            }
        }
        if self.capabilities.supports_custom_package_versions
            && !self.listing.supports_package_versions()
        {
            return Err(EngineError::ContractViolation(format!(
                "Manager {} declares custom package versions but its listing provider cannot list them",
                self.name()
            )));
        }
        Ok(())
    }

    /// Resolve the executable, load the version and discover sources.
    ///
    /// Only contract violations are returned as errors; a missing executable or
    /// a disabled manager are ordinary end states.
    pub async fn initialize(&self) -> Result<()> {
        self.set_state(ManagerState::Initializing);

        if let Err(e) = self.ensure_properly_constructed() {
            self.set_state(ManagerState::Uninitialized);
            return Err(e);
        }

        self.sources.reset();
        self.register_static_sources();

        if !self.is_enabled() {
            log::info!("{} is not enabled", self.name());
            self.set_status(ManagerStatus {
                found: false,
                executable_path: None,
                version: format!("{} is disabled", self.display_name()),
            });
            self.finish_initialization(ManagerState::Disabled);
            return Ok(());
        }

        let Some(executable) = self.resolve_executable() else {
            log::warn!("{} was not found on the system!", self.name());
            self.set_status(ManagerStatus {
                found: false,
                executable_path: None,
                version: format!("{} was not found", self.display_name()),
            });
            self.finish_initialization(ManagerState::ReadyButUnavailable);
            return Ok(());
        };

        log::info!(
            "{} is enabled and was found on {}",
            self.name(),
            executable.display()
        );
        self.set_status(ManagerStatus {
            found: true,
            executable_path: Some(executable),
            version: String::new(),
        });

        let version = self.load_version().await;
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .version = version;
        self.log_manager_info();

        if self.capabilities.supports_custom_sources {
            self.discover_sources().await;
        }

        self.finish_initialization(ManagerState::Ready);
        Ok(())
    }

    fn finish_initialization(&self, state: ManagerState) {
        self.set_state(state);
        let status = self.status();
        self.services
            .events
            .publish(EngineEvent::ManagerInitialized(ManagerInitialized {
                manager: self.name().to_string(),
                state,
                version: status.version,
                executable: status
                    .executable_path
                    .map(|p| p.display().to_string()),
            }));
    }

    fn register_static_sources(&self) {
        if let Some(default) = &self.properties.default_source {
            self.sources.add(default.clone());
        }
        for source in &self.properties.known_sources {
            self.sources.add(source.clone());
        }
    }

    /// Candidate executables in probe order
    pub fn find_candidate_executables(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        for name in &self.properties.executable_names {
            let path = Path::new(name);
            if path.is_absolute() {
                if path.is_file() {
                    candidates.push(path.to_path_buf());
                }
                continue;
            }
            if let Ok(found) = which::which_all(name) {
                candidates.extend(found);
            }
        }

        let mut seen = HashSet::new();
        candidates.retain(|p| seen.insert(p.clone()));
        candidates
    }

    fn resolve_executable(&self) -> Option<PathBuf> {
        let candidates = self.find_candidate_executables();
        let first = candidates.first()?.clone();

        if !self.services.settings.get(keys::ALLOW_CUSTOM_MANAGER_PATHS) {
            return Some(first);
        }

        let selection = self
            .services
            .settings
            .get_dictionary_item(keys::MANAGER_PATHS, self.name())
            .filter(|s| !s.is_empty());
        let Some(selection) = selection else {
            return Some(first);
        };

        let selected = PathBuf::from(&selection);
        if !selected.is_file() {
            log::error!(
                "The selected executable path {} for manager {} does not exist, the default one will be used...",
                selection,
                self.name()
            );
            return Some(first);
        }

        if candidates.iter().any(|c| c == &selected) {
            Some(selected)
        } else {
            log::error!(
                "The selected executable path {} for manager {} was not found among the candidates ({}), the default will be used...",
                selection,
                self.name(),
                candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Some(first)
        }
    }

    async fn load_version(&self) -> String {
        // Version arguments go to the bare executable, without call arguments
        let ctx = self.context();
        let command = ProcessCommand::new(LoggableTaskType::LoadManagerVersion, ctx.executable())
            .args(self.properties.version_args.clone());
        let output = ctx.harness.run(command).await;
        let version = output
            .stdout
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string();
        if version.is_empty() {
            log::warn!("Could not read the version of {}", self.name());
        }
        version
    }

    fn log_manager_info(&self) {
        let status = self.status();
        log::info!(
            "Manager loaded: {} (aka {}) | executable: \"{}\" | call arguments: \"{}\" | version: {}",
            self.display_name(),
            self.name(),
            status
                .executable_path
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.properties.executable_call_args.join(" "),
            status.version
        );
    }

    /// Bounded source discovery. On any fault the statically known sources stay.
    async fn discover_sources(&self) {
        let Some(provider) = self.source_provider.clone() else {
            return;
        };
        let ctx = self.context();
        let handle = tokio::spawn(async move { provider.load_sources(&ctx).await });

        match self
            .bounded_wait(handle, self.services.timeouts.source_discovery, "ListSources")
            .await
        {
            Ok(found) => {
                self.sources.reset();
                let count = found.len();
                for source in found {
                    self.sources.add(source);
                }
                self.register_static_sources();
                log::debug!("Loaded {} sources for manager {}", count, self.name());
            }
            Err(e) => {
                log::error!(
                    "Error finding sources for manager {}, keeping known sources: {}",
                    self.name(),
                    e
                );
            }
        }
    }

    /// Wait for a spawned task within `budget`. When the budget elapses the task
    /// is aborted (its child process is killed on drop) unless the user
    /// disabled listing timeouts, in which case the wait continues unbounded.
    async fn bounded_wait<T>(
        &self,
        mut handle: JoinHandle<Result<T>>,
        budget: Duration,
        task: &str,
    ) -> Result<T> {
        match tokio::time::timeout(budget, &mut handle).await {
            Ok(joined) => flatten_join(joined),
            Err(_) => {
                if self
                    .services
                    .settings
                    .get(keys::DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS)
                {
                    log::warn!(
                        "Task {} for manager {} exceeded {}s, waiting because timeouts are disabled",
                        task,
                        self.name(),
                        budget.as_secs()
                    );
                    flatten_join(handle.await)
                } else {
                    handle.abort();
                    Err(EngineError::ListingTimeout {
                        manager: self.name().to_string(),
                        task: task.to_string(),
                        seconds: budget.as_secs(),
                    })
                }
            }
        }
    }

    /// Run a listing call with the bounded wait, one fast repair and one retry.
    /// `None` means both attempts faulted.
    async fn listing_with_retry<F>(&self, task: &str, spawn: F) -> Option<Vec<Package>>
    where
        F: Fn() -> JoinHandle<Result<Vec<Package>>>,
    {
        for attempt in 0..LISTING_ATTEMPTS {
            match self
                .bounded_wait(spawn(), self.services.timeouts.listing, task)
                .await
            {
                Ok(packages) => return Some(packages),
                Err(e) if attempt + 1 < LISTING_ATTEMPTS => {
                    log::warn!("Error in {} for manager {}: {}", task, self.name(), e);
                    log::warn!(
                        "Since this was the first attempt, {} fast repair will run and the procedure will be restarted",
                        self.name()
                    );
                    self.attempt_fast_repair().await;
                }
                Err(e) => {
                    log::error!(
                        "Error in {} for manager {} on the second attempt: {}",
                        task,
                        self.name(),
                        e
                    );
                }
            }
        }
        None
    }

    fn not_ready(&self, what: &str) -> bool {
        if self.is_ready() {
            return false;
        }
        log::warn!(
            "Manager {} is not ready ({}), {} returns nothing",
            self.name(),
            self.state(),
            what
        );
        true
    }

    /// Search for packages. Fail-safe.
    pub async fn find_packages(&self, query: &str) -> Vec<Arc<Package>> {
        if self.not_ready("find_packages") {
            return Vec::new();
        }

        let found = self
            .listing_with_retry("FindPackages", || {
                let listing = Arc::clone(&self.listing);
                let ctx = self.context();
                let query = query.to_string();
                tokio::spawn(async move { listing.find_packages(&ctx, &query).await })
            })
            .await
            .unwrap_or_default();

        let packages = dedup(
            found
                .into_iter()
                .map(|p| self.services.cache.get_available(p)),
        );
        log::info!(
            "Found {} available packages from {} with the query {}",
            packages.len(),
            self.name(),
            query
        );
        packages
    }

    /// Upgradable packages, after a bounded index refresh. Fail-safe.
    pub async fn get_available_updates(&self) -> Vec<Arc<Package>> {
        if self.not_ready("get_available_updates") {
            return Vec::new();
        }

        self.refresh_package_indexes().await;

        let found = self
            .listing_with_retry("ListUpdates", || {
                let listing = Arc::clone(&self.listing);
                let ctx = self.context();
                tokio::spawn(async move { listing.list_upgrades(&ctx).await })
            })
            .await
            .unwrap_or_default();

        let cache = &self.services.cache;
        let packages = dedup(found.into_iter().filter_map(|p| {
            if cache.newer_version_is_installed(&p) {
                log::debug!("Skipping {} since the new version is already installed", p);
                return None;
            }
            Some(cache.get_upgradable(p))
        }));
        for package in &packages {
            if package.tag() == PackageTag::Default {
                package.set_tag(PackageTag::IsUpgradable);
            }
        }
        log::info!(
            "Found {} available updates from {}",
            packages.len(),
            self.name()
        );
        packages
    }

    /// Installed packages. Fail-safe.
    pub async fn get_installed_packages(&self) -> Vec<Arc<Package>> {
        if self.not_ready("get_installed_packages") {
            return Vec::new();
        }

        let found = self
            .listing_with_retry("ListInstalledPackages", || {
                let listing = Arc::clone(&self.listing);
                let ctx = self.context();
                tokio::spawn(async move { listing.list_installed(&ctx).await })
            })
            .await
            .unwrap_or_default();

        let packages: Vec<_> = found
            .into_iter()
            .map(|p| self.services.cache.get_installed(p))
            .collect();
        log::info!(
            "Found {} installed packages from {}",
            packages.len(),
            self.name()
        );
        packages
    }

    /// Published versions of `package`, newest first when the provider knows. Fail-safe.
    pub async fn get_package_versions(&self, package: &Package) -> Vec<String> {
        if !self.capabilities.supports_custom_package_versions
            || self.not_ready("get_package_versions")
        {
            return Vec::new();
        }

        let listing = Arc::clone(&self.listing);
        let ctx = self.context();
        let package = package.clone();
        let handle = tokio::spawn(async move { listing.package_versions(&ctx, &package).await });
        match self
            .bounded_wait(handle, self.services.timeouts.listing, "LoadPackageVersions")
            .await
        {
            Ok(versions) => versions,
            Err(e) => {
                log::error!("Error loading versions for manager {}: {}", self.name(), e);
                Vec::new()
            }
        }
    }

    /// Index refresh bounded by its own timeout; faults are logged only
    pub async fn refresh_package_indexes(&self) {
        let listing = Arc::clone(&self.listing);
        let ctx = self.context();
        let handle = tokio::spawn(async move { listing.refresh_package_indexes(&ctx).await });
        if let Err(e) = self
            .bounded_wait(handle, self.services.timeouts.refresh, "RefreshIndexes")
            .await
        {
            log::warn!("Index refresh for manager {} failed: {}", self.name(), e);
        }
    }

    pub async fn attempt_fast_repair(&self) {
        let ctx = self.context();
        self.listing.attempt_fast_repair(&ctx).await;
    }

    pub fn operation_args(
        &self,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        self.operations
            .operation_args(&self.properties, package, options, operation)
    }

    pub fn operation_verdict(
        &self,
        package: &Package,
        options: &mut InstallOptions,
        operation: OperationType,
        exit_code: i32,
        output: &[String],
    ) -> OperationVerdict {
        self.operations
            .operation_verdict(package, options, operation, exit_code, output)
    }

    /// Sources currently known to this manager
    pub fn sources(&self) -> Vec<Arc<ManagerSource>> {
        self.sources.list_all()
    }

    pub fn source_or_default(&self, name: &str) -> Arc<ManagerSource> {
        self.sources.get_or_default(name)
    }

    pub async fn add_source(&self, source: ManagerSource) -> Result<OperationVerdict> {
        self.source_operation(source, true).await
    }

    pub async fn remove_source(&self, source: ManagerSource) -> Result<OperationVerdict> {
        self.source_operation(source, false).await
    }

    async fn source_operation(&self, source: ManagerSource, adding: bool) -> Result<OperationVerdict> {
        let Some(provider) = self.source_provider.clone() else {
            return Err(EngineError::Other(format!(
                "Manager {} does not support custom sources",
                self.name()
            )));
        };
        if !self.is_ready() {
            return Err(EngineError::ManagerNotFound(self.name().to_string()));
        }

        let (task, args) = if adding {
            (LoggableTaskType::AddSource, provider.add_source_args(&source))
        } else {
            (LoggableTaskType::RemoveSource, provider.remove_source_args(&source))
        };
        let output = self.context().run(task, args).await;
        let verdict = source_verdict(
            provider.as_ref(),
            &source,
            adding,
            output.exit_code,
            &output.all_lines(),
        );

        if verdict == OperationVerdict::Succeeded {
            if adding {
                self.sources.add(source);
            } else {
                self.sources.remove(&source.name);
            }
        }
        Ok(verdict)
    }
}

fn flatten_join<T>(
    joined: std::result::Result<Result<T>, tokio::task::JoinError>,
) -> Result<T> {
    joined.map_err(|e| EngineError::Other(format!("listing task did not complete: {}", e)))?
}

/// Keep the first occurrence of each identity hash
fn dedup(packages: impl Iterator<Item = Arc<Package>>) -> Vec<Arc<Package>> {
    let mut seen = HashSet::new();
    packages.filter(|p| seen.insert(p.hash())).collect()
}
