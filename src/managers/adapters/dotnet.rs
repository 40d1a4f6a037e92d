//! .NET tools installed through `dotnet tool`
//!
//! The CLI cannot report available updates, so upgrades are found by
//! comparing each global tool against the newest version on nuget.org.

use super::{strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageScope, format_as_name};
use crate::core::verdict::{OperationVerdict, is_elevator_cancel};
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::feed::{FeedListingProvider, is_newer_version};
use crate::managers::parsing::dashed_table_rows;
use crate::managers::traits::{ListingProvider, ManagerContext, OperationProvider};
use crate::managers::types::{ManagerCapabilities, ManagerProperties};
use crate::process::LoggableTaskType;
use crate::sources::ManagerSource;
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = ".NET Tool";
const DEFAULT_SOURCE: &str = "nuget.org";
const DEFAULT_SOURCE_URL: &str = "https://www.nuget.org/api/v2";

pub fn definition() -> Result<ManagerDefinition> {
    let source = ManagerSource::new(NAME, DEFAULT_SOURCE, DEFAULT_SOURCE_URL);
    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: ".NET Tool".to_string(),
            description: "A repository full of tools and other executables designed with .NET's ecosystem in mind"
                .to_string(),
            executable_names: strings(&["dotnet"]),
            executable_call_args: strings(&["tool"]),
            version_args: strings(&["--version"]),
            install_verb: "install".to_string(),
            update_verb: "update".to_string(),
            uninstall_verb: "uninstall".to_string(),
            known_sources: vec![source.clone()],
            default_source: Some(source),
        },
        capabilities: ManagerCapabilities {
            can_run_as_admin: true,
            supports_custom_versions: true,
            supports_custom_architectures: true,
            supports_custom_scopes: true,
            supports_custom_locations: true,
            supports_custom_package_versions: true,
            ..Default::default()
        },
        listing: Arc::new(DotNetListing {
            feed: FeedListingProvider::new()?,
        }),
        operations: Arc::new(DotNetOperations),
        sources: None,
    })
}

/// `(id, version)` pairs from `dotnet tool list`
pub fn parse_tool_list(stdout: &[String]) -> Vec<(String, String)> {
    dashed_table_rows(stdout, "----")
        .into_iter()
        .filter(|row| row.len() >= 2)
        .map(|row| (row[0].clone(), row[1].clone()))
        .collect()
}

fn architecture_flag(architecture: &str) -> Option<&'static str> {
    match architecture.to_lowercase().as_str() {
        "x86" => Some("x86"),
        "x64" => Some("x64"),
        "arm" | "arm32" => Some("arm32"),
        "arm64" => Some("arm64"),
        _ => None,
    }
}

pub struct DotNetListing {
    feed: FeedListingProvider,
}

impl DotNetListing {
    async fn tools(&self, ctx: &ManagerContext, task: LoggableTaskType, scope: PackageScope) -> Vec<Package> {
        let mut args = vec!["list"];
        if scope == PackageScope::Global {
            args.push("--global");
        }
        let output = ctx.run(task, args).await;
        parse_tool_list(&output.stdout)
            .into_iter()
            .map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
                    .with_scope(scope)
            })
            .collect()
    }
}

#[async_trait]
impl ListingProvider for DotNetListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        self.feed.search(ctx, query).await
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let mut packages = self
            .tools(ctx, LoggableTaskType::ListInstalledPackages, PackageScope::Local)
            .await;
        packages.extend(
            self.tools(ctx, LoggableTaskType::ListInstalledPackages, PackageScope::Global)
                .await,
        );
        Ok(packages)
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let installed = self
            .tools(ctx, LoggableTaskType::ListUpdates, PackageScope::Global)
            .await;

        let mut upgradable = Vec::new();
        for package in installed {
            let versions = self.feed.package_versions(ctx, &package).await?;
            let Some(latest) = versions.into_iter().next() else {
                continue;
            };
            if is_newer_version(&latest, &package.version) {
                upgradable.push(package.with_new_version(latest));
            }
        }
        Ok(upgradable)
    }

    fn supports_package_versions(&self) -> bool {
        true
    }

    async fn package_versions(&self, ctx: &ManagerContext, package: &Package) -> Result<Vec<String>> {
        self.feed.package_versions(ctx, package).await
    }
}

pub struct DotNetOperations;

impl OperationProvider for DotNetOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        let mut args = vec![verb(properties, operation), package.id.clone()];
        args.extend(options.custom_parameters(operation).iter().cloned());

        if !options.custom_install_location.is_empty() {
            args.extend(["--tool-path".to_string(), options.custom_install_location.clone()]);
        }
        if options.effective_scope(package).unwrap_or(package.scope) == PackageScope::Global {
            args.push("--global".to_string());
        }

        if operation != OperationType::Uninstall {
            if let Some(arch) = architecture_flag(&options.architecture) {
                args.extend(["--arch".to_string(), arch.to_string()]);
            }
        }
        if operation == OperationType::Install && !options.version.is_empty() {
            args.extend(["--version".to_string(), options.version.clone()]);
        }
        args
    }

    /// Tools installed globally refuse local operations; retry globally once
    fn operation_verdict(
        &self,
        package: &Package,
        options: &mut InstallOptions,
        _operation: OperationType,
        exit_code: i32,
        output: &[String],
    ) -> OperationVerdict {
        if exit_code == 0 {
            return OperationVerdict::Succeeded;
        }
        if is_elevator_cancel(exit_code, output) {
            return OperationVerdict::Canceled;
        }
        if options.effective_scope(package).unwrap_or(package.scope) != PackageScope::Global {
            options.installation_scope = Some(PackageScope::Global);
            return OperationVerdict::AutoRetry;
        }
        OperationVerdict::Failed
    }
}
