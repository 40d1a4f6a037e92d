//! Rust's package manager. Installs go through `cargo binstall`, listings
//! through `cargo install-update` (the cargo-update plugin).

use super::{strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, format_as_name};
use crate::core::verdict::{OperationVerdict, output_contains_any};
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::traits::{ListingProvider, ManagerContext, OperationProvider, exit_code_verdict};
use crate::managers::types::{ManagerCapabilities, ManagerProperties};
use crate::process::LoggableTaskType;
use crate::sources::ManagerSource;
use crate::utils::regex_cache::get_cached_regex;
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "Cargo";
const DEFAULT_SOURCE: &str = "crates.io";
const DEFAULT_SOURCE_URL: &str = "https://index.crates.io/";

const SEARCH_LINE: &str = r#"(\w+)\s=\s"(\d+\.\d+\.\d+)"\s*#\s(.*)"#;
const UPDATE_LINE: &str = r"(.+)v(\d+\.\d+\.\d+)\s*v(\d+\.\d+\.\d+)\s*(Yes|No)";

const INTEGRITY_MARKERS: &[&str] = &["checksum mismatch", "signature verification failed"];

pub fn definition() -> Result<ManagerDefinition> {
    let source = ManagerSource::new(NAME, DEFAULT_SOURCE, DEFAULT_SOURCE_URL);
    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: "Cargo".to_string(),
            description: "The Rust package manager: Rust libraries and programs written in Rust"
                .to_string(),
            executable_names: strings(&["cargo"]),
            executable_call_args: Vec::new(),
            version_args: strings(&["--version"]),
            install_verb: "binstall".to_string(),
            update_verb: "binstall".to_string(),
            uninstall_verb: "uninstall".to_string(),
            known_sources: vec![source.clone()],
            default_source: Some(source),
        },
        capabilities: ManagerCapabilities {
            can_run_as_admin: true,
            can_skip_integrity_checks: true,
            supports_custom_versions: true,
            supports_custom_locations: true,
            ..Default::default()
        },
        listing: Arc::new(CargoListing),
        operations: Arc::new(CargoOperations),
        sources: None,
    })
}

/// `(id, version)` pairs from `cargo search`
pub fn parse_search(stdout: &[String]) -> Result<Vec<(String, String)>> {
    let re = get_cached_regex(SEARCH_LINE)?;
    Ok(stdout
        .iter()
        .filter_map(|l| re.captures(l))
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCrate {
    pub id: String,
    pub version: String,
    pub latest: String,
    pub needs_update: bool,
}

/// Rows of `cargo install-update --list`
pub fn parse_update_list(stdout: &[String]) -> Result<Vec<InstalledCrate>> {
    let re = get_cached_regex(UPDATE_LINE)?;
    Ok(stdout
        .iter()
        .filter_map(|l| re.captures(l))
        .map(|c| InstalledCrate {
            id: c[1].trim().to_string(),
            version: c[2].to_string(),
            latest: c[3].to_string(),
            needs_update: &c[4] == "Yes",
        })
        .collect())
}

pub struct CargoListing;

impl CargoListing {
    async fn installed_crates(&self, ctx: &ManagerContext, task: LoggableTaskType) -> Result<Vec<InstalledCrate>> {
        let output = ctx.run(task, ["install-update", "--list"]).await;
        parse_update_list(&output.stdout)
    }
}

#[async_trait]
impl ListingProvider for CargoListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        let output = ctx
            .run(
                LoggableTaskType::FindPackages,
                ["search", "-q", "--color=never", query],
            )
            .await;
        Ok(parse_search(&output.stdout)?
            .into_iter()
            .map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
            })
            .collect())
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        Ok(self
            .installed_crates(ctx, LoggableTaskType::ListInstalledPackages)
            .await?
            .into_iter()
            .map(|c| Package::new(format_as_name(&c.id), c.id, c.version, DEFAULT_SOURCE, ctx.name()))
            .collect())
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        Ok(self
            .installed_crates(ctx, LoggableTaskType::ListUpdates)
            .await?
            .into_iter()
            .filter(|c| c.needs_update)
            .map(|c| {
                Package::new(format_as_name(&c.id), c.id, c.version, DEFAULT_SOURCE, ctx.name())
                    .with_new_version(c.latest)
            })
            .collect())
    }
}

pub struct CargoOperations;

impl OperationProvider for CargoOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        let mut args = vec![verb(properties, operation)];

        if operation == OperationType::Uninstall {
            args.push(package.id.clone());
        } else {
            args.push("--no-confirm".to_string());
            if options.skip_hash_check {
                args.push("--skip-signatures".to_string());
            }
            if !options.version.is_empty() {
                args.extend(["--version".to_string(), options.version.clone()]);
            }
            if !options.custom_install_location.is_empty() {
                args.extend(["--root".to_string(), options.custom_install_location.clone()]);
            }
            args.push(package.id.clone());
        }

        args.extend(options.custom_parameters(operation).iter().cloned());
        args
    }

    fn operation_verdict(
        &self,
        _package: &Package,
        _options: &mut InstallOptions,
        _operation: OperationType,
        exit_code: i32,
        _output: &[String],
    ) -> OperationVerdict {
        exit_code_verdict(exit_code)
    }

    fn is_integrity_failure(&self, output: &[String]) -> bool {
        output_contains_any(output, INTEGRITY_MARKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_search_output() {
        let out = lines(
            "ripgrep = \"14.1.0\"    # ripgrep is a line-oriented search tool\n\
             ... and 120 crates more (use --limit N to see more)\n\
             rg_helper = \"0.2.1\"  # helper\n",
        );
        assert_eq!(
            parse_search(&out).unwrap(),
            vec![
                ("ripgrep".to_string(), "14.1.0".to_string()),
                ("rg_helper".to_string(), "0.2.1".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_list_output() {
        let out = lines(
            "    Polling registry 'https://index.crates.io/'.......\n\
             \n\
             Package         Installed  Latest    Needs update\n\
             ripgrep         v13.0.0    v14.1.0   Yes\n\
             cargo-update    v13.4.0    v13.4.0   No\n",
        );
        let crates = parse_update_list(&out).unwrap();
        assert_eq!(crates.len(), 2);
        assert_eq!(
            crates[0],
            InstalledCrate {
                id: "ripgrep".to_string(),
                version: "13.0.0".to_string(),
                latest: "14.1.0".to_string(),
                needs_update: true,
            }
        );
        assert!(!crates[1].needs_update);
    }

    #[test]
    fn test_binstall_args() {
        let def = definition().unwrap();
        let package = Package::new("Ripgrep", "ripgrep", "13.0.0", DEFAULT_SOURCE, NAME);
        let options = InstallOptions {
            version: "14.1.0".to_string(),
            custom_install_location: "/opt/tools".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CargoOperations.install_args(&def.properties, &package, &options),
            vec!["binstall", "--no-confirm", "--version", "14.1.0", "--root", "/opt/tools", "ripgrep"]
        );
        assert_eq!(
            CargoOperations.uninstall_args(&def.properties, &package, &options),
            vec!["uninstall", "ripgrep"]
        );
    }

    #[test]
    fn test_integrity_failure_detection() {
        let out = vec!["ERROR: signature verification failed for ripgrep".to_string()];
        assert!(CargoOperations.is_integrity_failure(&out));
        assert!(!CargoOperations.is_integrity_failure(&["installed".to_string()]));
    }
}
