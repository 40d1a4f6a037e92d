//! Provider traits a manager is composed from
//!
//! A manager is assembled from a listing provider, an operation provider and
//! (optionally) a source provider. Providers are stateless; everything they
//! need at call time comes from the `ManagerContext` snapshot the engine hands
//! them.

use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package};
use crate::core::verdict::{OperationVerdict, is_elevator_cancel};
use crate::error::Result;
use crate::managers::types::{ManagerCapabilities, ManagerProperties, ManagerStatus};
use crate::process::{LoggableTaskType, ManagerLogger, ProcessCommand, ProcessHarness, ProcessOutput};
use crate::sources::{ManagerSource, SourceRegistry};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Call-time view of a manager handed to its providers
#[derive(Debug, Clone)]
pub struct ManagerContext {
    pub properties: ManagerProperties,
    pub capabilities: ManagerCapabilities,
    pub status: ManagerStatus,
    pub sources: Arc<SourceRegistry>,
    pub harness: ProcessHarness,
}

impl ManagerContext {
    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn logger(&self) -> &Arc<ManagerLogger> {
        self.harness.logger()
    }

    /// Resolved executable, or the first declared name before resolution
    pub fn executable(&self) -> PathBuf {
        match &self.status.executable_path {
            Some(path) => path.clone(),
            None => self
                .properties
                .executable_names
                .first()
                .cloned()
                .unwrap_or_default()
                .into(),
        }
    }

    /// Command for the resolved executable with the manager's call arguments
    pub fn command(&self, task: LoggableTaskType) -> ProcessCommand {
        ProcessCommand::new(task, self.executable())
            .args(self.properties.executable_call_args.clone())
    }

    pub async fn run<I, S>(&self, task: LoggableTaskType, args: I) -> ProcessOutput
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.harness.run(self.command(task).args(args)).await
    }

    pub fn source_or_default(&self, name: &str) -> Arc<ManagerSource> {
        self.sources.get_or_default(name)
    }

    pub fn default_source(&self) -> Arc<ManagerSource> {
        self.sources
            .get_or_default(self.properties.default_source_name())
    }
}

/// Discovery: search, installed and upgradable listings
#[async_trait]
pub trait ListingProvider: Send + Sync {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>>;

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>>;

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>>;

    /// Refresh the manager's package index before listing upgrades
    async fn refresh_package_indexes(&self, _ctx: &ManagerContext) -> Result<()> {
        Ok(())
    }

    /// Best-effort recovery run once before a failed listing is retried
    async fn attempt_fast_repair(&self, ctx: &ManagerContext) {
        log::debug!("Manager {} has not implemented fast repair", ctx.name());
    }

    fn supports_package_versions(&self) -> bool {
        false
    }

    async fn package_versions(
        &self,
        _ctx: &ManagerContext,
        _package: &Package,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Install/update/uninstall argument building and verdict classification
pub trait OperationProvider: Send + Sync {
    /// Pure function from package and options to an argument vector
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String>;

    /// Pure classification of a finished operation. An `AutoRetry` verdict
    /// must leave `options` changed so that the next attempt can succeed.
    fn operation_verdict(
        &self,
        package: &Package,
        options: &mut InstallOptions,
        operation: OperationType,
        exit_code: i32,
        output: &[String],
    ) -> OperationVerdict;

    /// Output signals a checksum/hash mismatch
    fn is_integrity_failure(&self, _output: &[String]) -> bool {
        false
    }

    fn install_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
    ) -> Vec<String> {
        self.operation_args(properties, package, options, OperationType::Install)
    }

    fn update_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
    ) -> Vec<String> {
        self.operation_args(properties, package, options, OperationType::Update)
    }

    fn uninstall_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
    ) -> Vec<String> {
        self.operation_args(properties, package, options, OperationType::Uninstall)
    }
}

/// Custom source discovery and management
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn load_sources(&self, ctx: &ManagerContext) -> Result<Vec<ManagerSource>>;

    fn add_source_args(&self, source: &ManagerSource) -> Vec<String>;

    fn remove_source_args(&self, source: &ManagerSource) -> Vec<String>;

    fn add_source_verdict(
        &self,
        _source: &ManagerSource,
        exit_code: i32,
        _output: &[String],
    ) -> OperationVerdict {
        exit_code_verdict(exit_code)
    }

    fn remove_source_verdict(
        &self,
        _source: &ManagerSource,
        exit_code: i32,
        _output: &[String],
    ) -> OperationVerdict {
        exit_code_verdict(exit_code)
    }
}

/// Verdict for a source operation: elevator cancel first, then the provider
pub fn source_verdict(
    provider: &dyn SourceProvider,
    source: &ManagerSource,
    adding: bool,
    exit_code: i32,
    output: &[String],
) -> OperationVerdict {
    if is_elevator_cancel(exit_code, output) {
        log::warn!("Elevator prompt was canceled, not reporting an error");
        return OperationVerdict::Canceled;
    }
    if adding {
        provider.add_source_verdict(source, exit_code, output)
    } else {
        provider.remove_source_verdict(source, exit_code, output)
    }
}

pub fn exit_code_verdict(exit_code: i32) -> OperationVerdict {
    if exit_code == 0 {
        OperationVerdict::Succeeded
    } else {
        OperationVerdict::Failed
    }
}
