//! Python's package installer, driven through `python -m pip`

use super::{strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageScope, format_as_name};
use crate::core::verdict::{OperationVerdict, output_contains_any};
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::parsing::{dashed_table_rows, is_false_token, split_trimmed};
use crate::managers::traits::{ListingProvider, ManagerContext, OperationProvider};
use crate::managers::types::{ManagerCapabilities, ManagerProperties};
use crate::process::{LoggableTaskType, ProcessCommand};
use crate::sources::ManagerSource;
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "Pip";
const DEFAULT_SOURCE: &str = "pip";
const DEFAULT_SOURCE_URL: &str = "https://pypi.org/";
const SEARCH_HELPER: &str = "parse_pip_search";

const FALSE_IDS: &[&str] = &["", "WARNING:", "[notice]", "Package", "DEPRECATION:"];
const FALSE_VERSIONS: &[&str] = &["", "Ignoring", "invalid"];

const COMMON_FLAGS: &[&str] = &[
    "--no-input",
    "--no-color",
    "--no-python-version-warning",
    "--no-cache",
];

pub fn definition() -> Result<ManagerDefinition> {
    let source = ManagerSource::new(NAME, DEFAULT_SOURCE, DEFAULT_SOURCE_URL);
    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: "Pip".to_string(),
            description: "Python's library manager: Python libraries and related utilities"
                .to_string(),
            executable_names: strings(&["python3", "python"]),
            executable_call_args: strings(&["-m", "pip"]),
            version_args: strings(&["-m", "pip", "--version"]),
            install_verb: "install".to_string(),
            update_verb: "install".to_string(),
            uninstall_verb: "uninstall".to_string(),
            known_sources: vec![source.clone()],
            default_source: Some(source),
        },
        capabilities: ManagerCapabilities {
            can_run_as_admin: true,
            supports_custom_versions: true,
            supports_custom_scopes: true,
            supports_pre_release: true,
            ..Default::default()
        },
        listing: Arc::new(PipListing),
        operations: Arc::new(PipOperations),
        sources: None,
    })
}

fn is_valid_row(id: &str, version: &str) -> bool {
    !is_false_token(FALSE_IDS, id) && !is_false_token(FALSE_VERSIONS, version)
}

/// `(id, version)` pairs from the dashed table printed by `pip list`
pub fn parse_list(stdout: &[String]) -> Vec<(String, String)> {
    dashed_table_rows(stdout, "----")
        .into_iter()
        .filter(|row| row.len() >= 2 && is_valid_row(&row[0], &row[1]))
        .map(|row| (row[0].clone(), row[1].clone()))
        .collect()
}

/// `(id, version, latest)` triples from `pip list --outdated`
pub fn parse_outdated(stdout: &[String]) -> Vec<(String, String, String)> {
    dashed_table_rows(stdout, "----")
        .into_iter()
        .filter(|row| row.len() >= 3 && is_valid_row(&row[0], &row[1]))
        .map(|row| (row[0].clone(), row[1].clone(), row[2].clone()))
        .collect()
}

/// `(id, version)` pairs from the pipe-delimited table of `parse_pip_search`
pub fn parse_search(stdout: &[String]) -> Vec<(String, String)> {
    stdout
        .iter()
        .skip_while(|l| !l.contains("----"))
        .skip(1)
        .map(|l| split_trimmed(l, '|'))
        .filter(|cols| cols.len() >= 2 && is_valid_row(&cols[0], &cols[1]))
        .map(|cols| (cols[0].clone(), cols[1].clone()))
        .collect()
}

pub struct PipListing;

#[async_trait]
impl ListingProvider for PipListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        let Ok(helper) = which::which(SEARCH_HELPER) else {
            log::warn!(
                "{} is not installed, {} search is unavailable (pip install {})",
                SEARCH_HELPER,
                ctx.name(),
                SEARCH_HELPER
            );
            return Ok(Vec::new());
        };

        let command = ProcessCommand::new(LoggableTaskType::FindPackages, helper).args([query]);
        let output = ctx.harness.run(command).await;
        Ok(parse_search(&output.stdout)
            .into_iter()
            .map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
                    .with_scope(PackageScope::Global)
            })
            .collect())
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let output = ctx
            .run(LoggableTaskType::ListInstalledPackages, ["list"])
            .await;
        Ok(parse_list(&output.stdout)
            .into_iter()
            .map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
                    .with_scope(PackageScope::Global)
            })
            .collect())
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let output = ctx
            .run(LoggableTaskType::ListUpdates, ["list", "--outdated"])
            .await;
        Ok(parse_outdated(&output.stdout)
            .into_iter()
            .map(|(id, version, latest)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
                    .with_new_version(latest)
                    .with_scope(PackageScope::Global)
            })
            .collect())
    }
}

pub struct PipOperations;

impl OperationProvider for PipOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        if operation == OperationType::Uninstall {
            let mut args = vec![verb(properties, operation), package.id.clone(), "--yes".to_string()];
            args.extend(strings(COMMON_FLAGS));
            args.extend(options.custom_parameters(operation).iter().cloned());
            return args;
        }

        let target = if options.version.is_empty() {
            package.id.clone()
        } else {
            format!("{}=={}", package.id, options.version)
        };
        let mut args = vec![verb(properties, operation), target];
        args.extend(strings(COMMON_FLAGS));
        args.extend(options.custom_parameters(operation).iter().cloned());

        if operation == OperationType::Update {
            args.push("--upgrade".to_string());
        }
        if options.pre_release {
            args.push("--pre".to_string());
        }
        if options.effective_scope(package) == Some(PackageScope::User) {
            args.push("--user".to_string());
        }
        args
    }

    /// pip asks for `--user` when the system site-packages are not writable
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
        if output_contains_any(output, &["--user"])
            && options.effective_scope(package) != Some(PackageScope::User)
        {
            options.installation_scope = Some(PackageScope::User);
            return OperationVerdict::AutoRetry;
        }
        OperationVerdict::Failed
    }
}
