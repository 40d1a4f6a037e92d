//! PowerShell 7 modules from PowerShell Gallery style repositories

use super::{strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageScope, format_as_name};
use crate::core::verdict::{OperationVerdict, is_elevator_cancel, output_contains_any};
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::feed::FeedListingProvider;
use crate::managers::parsing::{dashed_table_rows, split_trimmed, table_columns};
use crate::managers::traits::{ListingProvider, ManagerContext, OperationProvider, SourceProvider};
use crate::managers::types::{ManagerCapabilities, ManagerProperties};
use crate::process::{LoggableTaskType, ProcessCommand};
use crate::sources::ManagerSource;
use crate::utils::regex_cache::get_cached_regex;
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "PowerShell7";
const GALLERY: &str = "PSGallery";
const GALLERY_URL: &str = "https://www.powershellgallery.com/api/v2";
const TEST_GALLERY: &str = "PoshTestGallery";
const TEST_GALLERY_URL: &str = "https://www.poshtestgallery.com/api/v2";

const SOURCE_URL: &str = r"https?:\/\/([\w%-]+\.)+[\w%-]+(\/[\w%-]+)+\/?";

const LIST_REPOSITORIES: &str = "Get-PSRepository | Format-Table -Property Name,@{N='SourceLocation';E={If ($_.Uri) {$_.Uri.AbsoluteUri} Else {$_.SourceLocation}}}";

/// Fed on stdin; prints `name|installed|latest|repository` for every
/// module with a newer gallery release
const UPDATE_CHECK_SCRIPT: &str = r#"
function Test-GalleryModuleUpdate {
    param (
        [Parameter(Mandatory,ValueFromPipelineByPropertyName)] [string] $Name,
        [Parameter(Mandatory,ValueFromPipelineByPropertyName)] [version] $Version,
        [Parameter(Mandatory,ValueFromPipelineByPropertyName)] [string] $Repository
    )
    process {
        $URLs = @{}
        @(Get-PSRepository).ForEach({$URLs[$_.Name] = If ($_.Uri) {$_.Uri.AbsoluteUri} Else {$_.SourceLocation}})
        $page = Invoke-WebRequest -Uri ($URLs[$Repository] + "/package/$Name") -UseBasicParsing -Maximum 0 -ea Ignore
        [version]$latest = Split-Path -Path ($page.headers.location -replace "$Name." -replace ".nupkg") -Leaf
        if ($latest -gt $Version) {
            Write-Output ($Name + "|" + $Version.ToString() + "|" + $latest.ToString() + "|" + $Repository)
        }
    }
}
Get-InstalledModule | Test-GalleryModuleUpdate
exit
"#;

pub fn definition() -> Result<ManagerDefinition> {
    let gallery = ManagerSource::new(NAME, GALLERY, GALLERY_URL);
    let test_gallery = ManagerSource::new(NAME, TEST_GALLERY, TEST_GALLERY_URL);
    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: "PowerShell 7.x".to_string(),
            description: "PowerShell's package manager: scripts and modules to extend PowerShell"
                .to_string(),
            executable_names: strings(&["pwsh"]),
            executable_call_args: strings(&["-NoProfile", "-Command"]),
            version_args: strings(&["-Version"]),
            install_verb: "Install-Module".to_string(),
            update_verb: "Update-Module".to_string(),
            uninstall_verb: "Uninstall-Module".to_string(),
            known_sources: vec![gallery.clone(), test_gallery],
            default_source: Some(gallery),
        },
        capabilities: ManagerCapabilities {
            can_run_as_admin: true,
            can_skip_integrity_checks: true,
            supports_custom_versions: true,
            supports_custom_scopes: true,
            supports_custom_sources: true,
            supports_pre_release: true,
            supports_custom_package_versions: true,
            ..Default::default()
        },
        listing: Arc::new(PowerShellListing {
            feed: FeedListingProvider::new()?,
        }),
        operations: Arc::new(PowerShellOperations),
        sources: Some(Arc::new(PowerShellSources)),
    })
}

/// `(id, version, repository)` triples from `Get-InstalledModule`, whose
/// table leads with the version column
pub fn parse_installed_modules(stdout: &[String]) -> Vec<(String, String, String)> {
    dashed_table_rows(stdout, "-----")
        .into_iter()
        .filter(|row| row.len() >= 3)
        .map(|row| (row[1].clone(), row[0].clone(), row[2].clone()))
        .collect()
}

/// `(id, version, latest, repository)` rows printed by the update check.
/// Lines echoed back by the interactive prompt start with `>>`.
pub fn parse_update_check(stdout: &[String]) -> Vec<(String, String, String, String)> {
    stdout
        .iter()
        .filter(|l| !l.trim_start().starts_with(">>"))
        .map(|l| split_trimmed(l, '|'))
        .filter(|cols| cols.len() >= 4)
        .filter(|cols| {
            // Gallery versions are padded to four components
            let (version, latest) = (&cols[1], &cols[2]);
            *latest != format!("{}.0", version) && *latest != format!("{}.0.0", version)
        })
        .map(|cols| (cols[0].clone(), cols[1].clone(), cols[2].clone(), cols[3].clone()))
        .collect()
}

/// `(name, url)` pairs from the repository table
pub fn parse_repositories(stdout: &[String]) -> Result<Vec<(String, String)>> {
    let url_re = get_cached_regex(SOURCE_URL)?;
    Ok(stdout
        .iter()
        .skip_while(|l| !l.contains("----"))
        .skip(1)
        .filter_map(|l| {
            let url = url_re.find(l)?.as_str().to_string();
            let name = table_columns(l).into_iter().next()?;
            Some((name, url))
        })
        .collect())
}

pub struct PowerShellListing {
    feed: FeedListingProvider,
}

#[async_trait]
impl ListingProvider for PowerShellListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        self.feed.search(ctx, query).await
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let output = ctx
            .run(LoggableTaskType::ListInstalledPackages, ["Get-InstalledModule"])
            .await;
        Ok(parse_installed_modules(&output.stdout)
            .into_iter()
            .map(|(id, version, repository)| {
                ctx.source_or_default(&repository);
                Package::new(format_as_name(&id), id, version, repository, ctx.name())
            })
            .collect())
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let command = ProcessCommand::new(LoggableTaskType::ListUpdates, ctx.executable())
            .args(["-NoProfile", "-Command", "-"])
            .stdin(UPDATE_CHECK_SCRIPT);
        let output = ctx.harness.run(command).await;
        Ok(parse_update_check(&output.stdout)
            .into_iter()
            .map(|(id, version, latest, repository)| {
                ctx.source_or_default(&repository);
                Package::new(format_as_name(&id), id, version, repository, ctx.name())
                    .with_new_version(latest)
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

pub struct PowerShellOperations;

impl OperationProvider for PowerShellOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        let mut args = vec![
            verb(properties, operation),
            "-Name".to_string(),
            package.id.clone(),
            "-Confirm:$false".to_string(),
            "-Force".to_string(),
        ];
        args.extend(options.custom_parameters(operation).iter().cloned());

        if operation == OperationType::Uninstall {
            return args;
        }

        if options.pre_release {
            args.push("-AllowPrerelease".to_string());
        }
        let scope = match options.effective_scope(package) {
            Some(PackageScope::Global | PackageScope::Machine) => "AllUsers",
            _ => "CurrentUser",
        };
        args.extend(["-Scope".to_string(), scope.to_string()]);

        if operation == OperationType::Install {
            if options.skip_hash_check {
                args.push("-SkipPublisherCheck".to_string());
            }
            if !options.version.is_empty() {
                args.extend(["-RequiredVersion".to_string(), options.version.clone()]);
            }
        }
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
        if is_elevator_cancel(exit_code, output) {
            return OperationVerdict::Canceled;
        }
        if output_contains_any(output, &["AdminPrivilegesAreRequired"]) && !options.runs_elevated(package) {
            options.run_as_administrator = true;
            return OperationVerdict::AutoRetry;
        }
        if exit_code == 0 {
            OperationVerdict::Succeeded
        } else {
            OperationVerdict::Failed
        }
    }
}

pub struct PowerShellSources;

#[async_trait]
impl SourceProvider for PowerShellSources {
    async fn load_sources(&self, ctx: &ManagerContext) -> Result<Vec<ManagerSource>> {
        let output = ctx.run(LoggableTaskType::ListSources, [LIST_REPOSITORIES]).await;
        Ok(parse_repositories(&output.stdout)?
            .into_iter()
            .map(|(name, url)| ManagerSource::new(ctx.name(), name, url))
            .collect())
    }

    fn add_source_args(&self, source: &ManagerSource) -> Vec<String> {
        let url = source.url();
        if url.trim_end_matches('/') == GALLERY_URL {
            return strings(&["Register-PSRepository", "-Default"]);
        }
        vec![
            "Register-PSRepository".to_string(),
            "-Name".to_string(),
            source.name.clone(),
            "-SourceLocation".to_string(),
            url,
        ]
    }

    fn remove_source_args(&self, source: &ManagerSource) -> Vec<String> {
        vec![
            "Unregister-PSRepository".to_string(),
            "-Name".to_string(),
            source.name.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn package() -> Package {
        Package::new("Pester", "Pester", "5.5.0", GALLERY, NAME)
    }

    #[test]
    fn test_installed_modules_lead_with_version() {
        let out = lines(
            "Version    Name            Repository   Description\n\
             -------    ----            ----------   -----------\n\
             5.5.0      Pester          PSGallery    Pester provides a framework\n\
             2.2.5      PowerShellGet   PSGallery    PowerShell module\n",
        );
        assert_eq!(
            parse_installed_modules(&out),
            vec![
                ("Pester".to_string(), "5.5.0".to_string(), GALLERY.to_string()),
                ("PowerShellGet".to_string(), "2.2.5".to_string(), GALLERY.to_string()),
            ]
        );
    }

    #[test]
    fn test_update_check_skips_padded_versions_and_echo() {
        let out = lines(
            ">> Get-InstalledModule | Test-GalleryModuleUpdate\n\
             Pester|5.5.0|5.6.1|PSGallery\n\
             PSReadLine|2.3|2.3.0.0|PSGallery\n\
             Az|11.0|11.0.0|PSGallery\n",
        );
        assert_eq!(
            parse_update_check(&out),
            vec![(
                "Pester".to_string(),
                "5.5.0".to_string(),
                "5.6.1".to_string(),
                GALLERY.to_string()
            )]
        );
    }

    #[test]
    fn test_repository_table() {
        let out = lines(
            "Name            SourceLocation\n\
             ----            --------------\n\
             PSGallery       https://www.powershellgallery.com/api/v2\n\
             Internal        https://nuget.example.com/feeds/ps/\n\
             Broken          not a url\n",
        );
        assert_eq!(
            parse_repositories(&out).unwrap(),
            vec![
                (GALLERY.to_string(), GALLERY_URL.to_string()),
                ("Internal".to_string(), "https://nuget.example.com/feeds/ps/".to_string()),
            ]
        );
    }

    #[test]
    fn test_install_args() {
        let def = definition().unwrap();
        let options = InstallOptions {
            pre_release: true,
            skip_hash_check: true,
            version: "5.4.0".to_string(),
            installation_scope: Some(PackageScope::Global),
            ..Default::default()
        };
        assert_eq!(
            PowerShellOperations.install_args(&def.properties, &package(), &options),
            vec![
                "Install-Module",
                "-Name",
                "Pester",
                "-Confirm:$false",
                "-Force",
                "-AllowPrerelease",
                "-Scope",
                "AllUsers",
                "-SkipPublisherCheck",
                "-RequiredVersion",
                "5.4.0",
            ]
        );
    }

    #[test]
    fn test_update_and_uninstall_args() {
        let def = definition().unwrap();
        let options = InstallOptions::default();
        assert_eq!(
            PowerShellOperations.update_args(&def.properties, &package(), &options),
            vec!["Update-Module", "-Name", "Pester", "-Confirm:$false", "-Force", "-Scope", "CurrentUser"]
        );
        assert_eq!(
            PowerShellOperations.uninstall_args(&def.properties, &package(), &options),
            vec!["Uninstall-Module", "-Name", "Pester", "-Confirm:$false", "-Force"]
        );
    }

    #[test]
    fn test_admin_privileges_retry_once() {
        let package = package();
        let mut options = InstallOptions::default();
        let output = vec!["Install-Module: AdminPrivilegesAreRequired,Install-Module".to_string()];

        let first = PowerShellOperations.operation_verdict(&package, &mut options, OperationType::Install, 1, &output);
        assert_eq!(first, OperationVerdict::AutoRetry);
        assert!(options.run_as_administrator);

        let second = PowerShellOperations.operation_verdict(&package, &mut options, OperationType::Install, 1, &output);
        assert_eq!(second, OperationVerdict::Failed);
    }

    #[test]
    fn test_gallery_registration_uses_default() {
        let gallery = ManagerSource::new(NAME, GALLERY, GALLERY_URL);
        assert_eq!(
            PowerShellSources.add_source_args(&gallery),
            vec!["Register-PSRepository", "-Default"]
        );
        let custom = ManagerSource::new(NAME, "Internal", "https://nuget.example.com/feeds/ps/");
        assert_eq!(
            PowerShellSources.add_source_args(&custom),
            vec![
                "Register-PSRepository",
                "-Name",
                "Internal",
                "-SourceLocation",
                "https://nuget.example.com/feeds/ps/"
            ]
        );
    }
}
