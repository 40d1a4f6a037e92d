//! The classic Windows package manager. Search and version listing use the
//! NuGet feed of each configured source.

use super::{strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, format_as_name};
use crate::core::verdict::{OperationVerdict, is_elevator_cancel, output_contains_any};
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::feed::FeedListingProvider;
use crate::managers::parsing::{is_false_token, split_trimmed};
use crate::managers::traits::{
    ListingProvider, ManagerContext, OperationProvider, SourceProvider,
};
use crate::managers::types::{ManagerCapabilities, ManagerProperties};
use crate::process::LoggableTaskType;
use crate::sources::ManagerSource;
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "Chocolatey";
const COMMUNITY: &str = "community";
const COMMUNITY_URL: &str = "https://community.chocolatey.org/api/v2/";
const LEGACY_COMMUNITY_URL: &str = "https://chocolatey.org/api/v2/";

const SUCCESS_CODES: &[i32] = &[0, 3010, 1641, 1614, 1605];

const FALSE_IDS: &[&str] = &[
    "Directory", "", "Did", "Features?", "Validation", "-", "being", "It", "Error", "L'accs",
    "Maximum", "This", "Output is package name", "operable", "Invalid",
];
const FALSE_VERSIONS: &[&str] = &[
    "", "Did", "Features?", "Validation", "-", "being", "It", "Error", "L'accs", "Maximum",
    "This", "packages", "current version", "installed version", "is", "program", "validations",
    "argument", "no",
];

const ELEVATION_MARKERS: &[&str] = &[
    "Run as administrator",
    "The requested operation requires elevation",
    "Access to the path",
    "Access denied",
    "access denied",
    "is denied",
    "WARNING: Unable to create shortcut. Error captured was Unable to save shortcut",
];

const INTEGRITY_MARKERS: &[&str] = &["hashes do not match", "Checksum for"];

pub fn definition() -> Result<ManagerDefinition> {
    let community = ManagerSource::new(NAME, COMMUNITY, COMMUNITY_URL);
    let feed = FeedListingProvider::new()?;
    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: "Chocolatey".to_string(),
            description: "The classic package manager for Windows: general software".to_string(),
            executable_names: strings(&["choco"]),
            executable_call_args: Vec::new(),
            version_args: strings(&["--version"]),
            install_verb: "install".to_string(),
            update_verb: "upgrade".to_string(),
            uninstall_verb: "uninstall".to_string(),
            known_sources: vec![community.clone()],
            default_source: Some(community),
        },
        capabilities: ManagerCapabilities {
            can_run_as_admin: true,
            can_skip_integrity_checks: true,
            can_run_interactively: true,
            supports_custom_versions: true,
            supports_custom_architectures: true,
            supports_custom_sources: true,
            supports_pre_release: true,
            supports_custom_package_versions: true,
            ..Default::default()
        },
        listing: Arc::new(ChocolateyListing { feed }),
        operations: Arc::new(ChocolateyOperations),
        sources: Some(Arc::new(ChocolateySources)),
    })
}

/// `(id, version)` pairs from `choco list`
pub fn parse_installed(stdout: &[String]) -> Vec<(String, String)> {
    stdout
        .iter()
        .filter(|l| !l.starts_with("Chocolatey"))
        .map(|l| split_trimmed(l, ' '))
        .filter(|cols| cols.len() > 1)
        .filter(|cols| !is_false_token(FALSE_IDS, &cols[0]) && !is_false_token(FALSE_VERSIONS, &cols[1]))
        .map(|cols| (cols[0].clone(), cols[1].clone()))
        .collect()
}

/// `(id, version, available)` triples from the pipe-delimited `choco outdated`
pub fn parse_outdated(stdout: &[String]) -> Vec<(String, String, String)> {
    stdout
        .iter()
        .filter(|l| !l.starts_with("Chocolatey"))
        .map(|l| split_trimmed(l, '|'))
        .filter(|cols| cols.len() > 2)
        .filter(|cols| {
            !is_false_token(FALSE_IDS, &cols[0])
                && !is_false_token(FALSE_VERSIONS, &cols[1])
                && cols[1] != cols[2]
        })
        .map(|cols| (cols[0].clone(), cols[1].clone(), cols[2].clone()))
        .collect()
}

/// `(name, url)` pairs from `choco source list`
pub fn parse_sources(stdout: &[String]) -> Vec<(String, String)> {
    stdout
        .iter()
        .filter(|l| l.contains(" - ") && l.contains("| "))
        .filter_map(|l| {
            let head = l.trim().split('|').next()?.trim();
            let (name, rest) = head.split_once(" - ")?;
            let url = rest.trim().split(' ').next()?.trim();
            if url == COMMUNITY_URL || url == LEGACY_COMMUNITY_URL {
                return Some((COMMUNITY.to_string(), COMMUNITY_URL.to_string()));
            }
            Some((name.trim().to_string(), url.to_string()))
        })
        .collect()
}

pub struct ChocolateyListing {
    feed: FeedListingProvider,
}

#[async_trait]
impl ListingProvider for ChocolateyListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        self.feed.search(ctx, query).await
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let output = ctx
            .run(LoggableTaskType::ListInstalledPackages, ["list"])
            .await;
        let source = ctx.default_source();
        Ok(parse_installed(&output.stdout)
            .into_iter()
            .map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, source.name.clone(), ctx.name())
            })
            .collect())
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let output = ctx.run(LoggableTaskType::ListUpdates, ["outdated"]).await;
        let source = ctx.default_source();
        Ok(parse_outdated(&output.stdout)
            .into_iter()
            .map(|(id, version, available)| {
                Package::new(format_as_name(&id), id, version, source.name.clone(), ctx.name())
                    .with_new_version(available)
            })
            .collect())
    }

    fn supports_package_versions(&self) -> bool {
        true
    }

    async fn package_versions(&self, ctx: &ManagerContext, package: &Package) -> Result<Vec<String>> {
        self.feed.package_versions(ctx, package).await
    }
}

pub struct ChocolateyOperations;

impl OperationProvider for ChocolateyOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        let mut args = vec![verb(properties, operation), package.id.clone(), "-y".to_string()];

        if options.interactive_installation {
            args.push("--notsilent".to_string());
        }

        if operation != OperationType::Uninstall {
            args.push("--no-progress".to_string());
            if options.architecture.eq_ignore_ascii_case("x86") {
                args.push("--forcex86".to_string());
            }
            if options.pre_release {
                args.push("--prerelease".to_string());
            }
            if options.skip_hash_check {
                args.extend(strings(&["--ignore-checksums", "--force"]));
            }
            if !options.version.is_empty() {
                args.push(format!("--version={}", options.version));
                args.push("--allow-downgrade".to_string());
            }
        }

        args.extend(options.custom_parameters(operation).iter().cloned());
        args
    }

    fn operation_verdict(
        &self,
        package: &Package,
        options: &mut InstallOptions,
        _operation: OperationType,
        exit_code: i32,
        output: &[String],
    ) -> OperationVerdict {
        if SUCCESS_CODES.contains(&exit_code) {
            return OperationVerdict::Succeeded;
        }
        if is_elevator_cancel(exit_code, output) {
            return OperationVerdict::Canceled;
        }
        if !options.runs_elevated(package) && output_contains_any(output, ELEVATION_MARKERS) {
            options.run_as_administrator = true;
            return OperationVerdict::AutoRetry;
        }
        OperationVerdict::Failed
    }

    fn is_integrity_failure(&self, output: &[String]) -> bool {
        output_contains_any(output, INTEGRITY_MARKERS)
    }
}

pub struct ChocolateySources;

#[async_trait]
impl SourceProvider for ChocolateySources {
    async fn load_sources(&self, ctx: &ManagerContext) -> Result<Vec<ManagerSource>> {
        let output = ctx
            .run(LoggableTaskType::ListSources, ["source", "list"])
            .await;
        Ok(parse_sources(&output.stdout)
            .into_iter()
            .map(|(name, url)| ManagerSource::new(ctx.name(), name, url))
            .collect())
    }

    fn add_source_args(&self, source: &ManagerSource) -> Vec<String> {
        vec![
            "source".to_string(),
            "add".to_string(),
            "--name".to_string(),
            source.name.clone(),
            "--source".to_string(),
            source.url(),
            "-y".to_string(),
        ]
    }

    fn remove_source_args(&self, source: &ManagerSource) -> Vec<String> {
        vec![
            "source".to_string(),
            "remove".to_string(),
            "--name".to_string(),
            source.name.clone(),
            "-y".to_string(),
        ]
    }
}
