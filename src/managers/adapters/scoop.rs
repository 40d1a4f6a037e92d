//! Scoop: portable Windows apps organised in git buckets
//!
//! Search prefers the standalone `scoop-search` binary, which is an order of
//! magnitude faster than `scoop search`, and falls back to the latter.

use super::{home_dir, strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageScope, format_as_name};
use crate::core::verdict::{OperationVerdict, is_elevator_cancel, output_contains_any};
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::parsing::{collapse_spaces, dashed_table_rows};
use crate::managers::traits::{ListingProvider, ManagerContext, OperationProvider, SourceProvider};
use crate::managers::types::{ManagerCapabilities, ManagerProperties, SourceCapabilities};
use crate::process::{LoggableTaskType, ProcessCommand};
use crate::sources::ManagerSource;
use crate::utils::regex_cache::get_cached_regex;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const NAME: &str = "Scoop";
const DEFAULT_SOURCE: &str = "main";
const FAST_SEARCH_HELPER: &str = "scoop-search";

/// `scoop update` pulls every bucket; running it more often is wasted work
pub const INDEX_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

const KNOWN_BUCKETS: &[(&str, &str)] = &[
    ("main", "https://github.com/ScoopInstaller/Main"),
    ("extras", "https://github.com/ScoopInstaller/Extras"),
    ("versions", "https://github.com/ScoopInstaller/Versions"),
    ("nirsoft", "https://github.com/kodybrown/scoop-nirsoft"),
    ("sysinternals", "https://github.com/niheaven/scoop-sysinternals"),
    ("php", "https://github.com/ScoopInstaller/PHP"),
    ("nerd-fonts", "https://github.com/matthewjberger/scoop-nerd-fonts"),
    ("nonportable", "https://github.com/ScoopInstaller/Nonportable"),
    ("java", "https://github.com/ScoopInstaller/Java"),
    ("games", "https://github.com/Calinou/scoop-games"),
];

const GLOBAL_HINT: &str = "Try again with the --global (or -g) flag instead";
const ADMIN_HINTS: &[&str] = &[
    "requires admin rights",
    "requires administrator rights",
    "you need admin rights to install global apps",
];

const TIME_SUFFIX: &str = r"(?i)\s[ap]m\b";

pub fn definition() -> Result<ManagerDefinition> {
    let known_sources: Vec<ManagerSource> = KNOWN_BUCKETS
        .iter()
        .map(|(name, url)| ManagerSource::new(NAME, *name, *url))
        .collect();
    let default_source = known_sources.first().cloned();

    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: "Scoop".to_string(),
            description: "Great repository of unknown but useful utilities and other interesting packages"
                .to_string(),
            executable_names: strings(&["scoop"]),
            executable_call_args: Vec::new(),
            version_args: strings(&["--version"]),
            install_verb: "install".to_string(),
            update_verb: "update".to_string(),
            uninstall_verb: "uninstall".to_string(),
            known_sources,
            default_source,
        },
        capabilities: ManagerCapabilities {
            can_run_as_admin: true,
            can_skip_integrity_checks: true,
            supports_custom_architectures: true,
            supports_custom_scopes: true,
            supports_custom_sources: true,
            sources: SourceCapabilities {
                knows_package_count: true,
                knows_update_date: true,
            },
            ..Default::default()
        },
        listing: Arc::new(ScoopListing::default()),
        operations: Arc::new(ScoopOperations),
        sources: Some(Arc::new(ScoopSources)),
    })
}

/// `(id, version, bucket)` triples from `scoop-search`, which groups results
/// under `'bucket' bucket:` headers
pub fn parse_fast_search(stdout: &[String]) -> Vec<(String, String, String)> {
    let mut bucket = DEFAULT_SOURCE.to_string();
    let mut found = Vec::new();

    for line in stdout {
        if let Some(rest) = line.strip_prefix('\'') {
            if let Some((name, _)) = rest.split_once('\'') {
                bucket = name.to_string();
            }
            continue;
        }
        let trimmed = line.trim();
        let Some((id, rest)) = trimmed.split_once(" (") else {
            continue;
        };
        let Some((version, _)) = rest.split_once(')') else {
            continue;
        };
        found.push((id.trim().to_string(), version.to_string(), bucket.clone()));
    }
    found
}

/// `(id, version, bucket)` triples from the table printed by `scoop search`
pub fn parse_search(stdout: &[String]) -> Vec<(String, String, String)> {
    dashed_table_rows(stdout, "---")
        .into_iter()
        .filter(|row| row.len() >= 3)
        .map(|row| (row[0].clone(), row[1].clone(), row[2].clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub id: String,
    pub version: String,
    pub bucket: String,
    pub scope: PackageScope,
}

/// Rows of `scoop list`
pub fn parse_installed(stdout: &[String]) -> Vec<InstalledApp> {
    dashed_table_rows(stdout, "---")
        .into_iter()
        .filter(|row| row.len() >= 3)
        .map(|row| {
            let global = row.join(" ").contains("Global install");
            InstalledApp {
                id: row[0].clone(),
                version: row[1].clone(),
                bucket: row[2].clone(),
                scope: if global {
                    PackageScope::Global
                } else {
                    PackageScope::User
                },
            }
        })
        .collect()
}

/// `(id, installed, latest)` triples from `scoop status`
pub fn parse_status(stdout: &[String]) -> Vec<(String, String, String)> {
    dashed_table_rows(stdout, "---")
        .into_iter()
        .filter(|row| row.len() >= 3)
        .map(|row| (row[0].clone(), row[1].clone(), row[2].clone()))
        .collect()
}

/// Rows of `scoop bucket list`: name, url, last update and manifest count.
/// Local buckets (no remote) are reported at their checkout path.
pub fn parse_buckets(stdout: &[String]) -> Result<Vec<ManagerSource>> {
    let time_suffix = get_cached_regex(TIME_SUFFIX)?;
    let mut buckets = Vec::new();

    for line in stdout.iter().skip_while(|l| !l.contains("---")).skip(1) {
        let cleaned = time_suffix.replace_all(line.trim(), "");
        let columns: Vec<String> = collapse_spaces(&cleaned)
            .split(' ')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if columns.len() < 5 {
            continue;
        }

        let name = columns[0].clone();
        let url = if columns[1].starts_with("http") {
            columns[1].clone()
        } else {
            local_bucket_path(&name)
        };
        let count = columns.last().and_then(|c| c.parse::<u64>().ok());
        let updated = format!("{} {}", columns[2], columns[3]);
        buckets.push(ManagerSource::new(NAME, name, url).with_metadata(count, Some(updated)));
    }
    Ok(buckets)
}

fn local_bucket_path(name: &str) -> String {
    let home = home_dir().unwrap_or_default();
    home.join("scoop")
        .join("buckets")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn architecture_flag(architecture: &str) -> Option<&'static str> {
    match architecture.to_lowercase().as_str() {
        "x64" | "64bit" => Some("64bit"),
        "x86" | "32bit" => Some("32bit"),
        "arm64" => Some("arm64"),
        _ => None,
    }
}

#[derive(Default)]
pub struct ScoopListing {
    last_refresh: Mutex<Option<Instant>>,
}

impl ScoopListing {
    /// Claim the refresh slot; false while the previous refresh is fresh
    fn claim_refresh(&self, now: Instant) -> bool {
        let mut last = self.last_refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|at| now.duration_since(at) < INDEX_REFRESH_INTERVAL) {
            return false;
        }
        *last = Some(now);
        true
    }

    async fn installed_apps(&self, ctx: &ManagerContext, task: LoggableTaskType) -> Vec<InstalledApp> {
        let output = ctx.run(task, ["list"]).await;
        parse_installed(&output.stdout)
    }
}

#[async_trait]
impl ListingProvider for ScoopListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        let found = match which::which(FAST_SEARCH_HELPER) {
            Ok(helper) => {
                let command = ProcessCommand::new(LoggableTaskType::FindPackages, helper).args([query]);
                parse_fast_search(&ctx.harness.run(command).await.stdout)
            }
            Err(_) => {
                log::info!("{} was not found, using scoop search", FAST_SEARCH_HELPER);
                let output = ctx.run(LoggableTaskType::FindPackages, ["search", query]).await;
                parse_search(&output.stdout)
            }
        };

        Ok(found
            .into_iter()
            .map(|(id, version, bucket)| {
                ctx.source_or_default(&bucket);
                Package::new(format_as_name(&id), id, version, bucket, ctx.name())
            })
            .collect())
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        Ok(self
            .installed_apps(ctx, LoggableTaskType::ListInstalledPackages)
            .await
            .into_iter()
            .map(|app| {
                Package::new(format_as_name(&app.id), app.id, app.version, app.bucket, ctx.name())
                    .with_scope(app.scope)
            })
            .collect())
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let installed = self.installed_apps(ctx, LoggableTaskType::ListUpdates).await;
        let output = ctx.run(LoggableTaskType::ListUpdates, ["status"]).await;

        Ok(parse_status(&output.stdout)
            .into_iter()
            .filter_map(|(id, version, latest)| {
                let app = installed
                    .iter()
                    .find(|app| app.id == id && app.version == version)?;
                Some(
                    Package::new(format_as_name(&id), id, version, app.bucket.clone(), ctx.name())
                        .with_new_version(latest)
                        .with_scope(app.scope),
                )
            })
            .collect())
    }

    async fn refresh_package_indexes(&self, ctx: &ManagerContext) -> Result<()> {
        if !self.claim_refresh(Instant::now()) {
            log::debug!("Skipping scoop update, buckets were refreshed recently");
            return Ok(());
        }
        ctx.run(LoggableTaskType::RefreshIndexes, ["update"]).await;
        Ok(())
    }
}

pub struct ScoopOperations;

impl OperationProvider for ScoopOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        let target = if operation == OperationType::Install && !package.source.is_empty() {
            format!("{}/{}", package.source, package.id)
        } else {
            package.id.clone()
        };
        let mut args = vec![verb(properties, operation), target];

        if options.effective_scope(package).unwrap_or(package.scope) == PackageScope::Global {
            args.push("--global".to_string());
        }

        args.extend(options.custom_parameters(operation).iter().cloned());

        if operation == OperationType::Uninstall {
            if options.remove_data_on_uninstall {
                args.push("--purge".to_string());
            }
        } else if options.skip_hash_check {
            args.push("--skip-hash-check".to_string());
        }

        if operation == OperationType::Install {
            if let Some(arch) = architecture_flag(&options.architecture) {
                args.extend(["--arch".to_string(), arch.to_string()]);
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

        if output_contains_any(output, &[GLOBAL_HINT])
            && options.effective_scope(package) != Some(PackageScope::Global)
        {
            options.installation_scope = Some(PackageScope::Global);
            options.run_as_administrator = true;
            return OperationVerdict::AutoRetry;
        }

        if output_contains_any(output, ADMIN_HINTS) && !options.runs_elevated(package) {
            options.run_as_administrator = true;
            return OperationVerdict::AutoRetry;
        }

        if exit_code != 0 || output_contains_any(output, &["ERROR"]) {
            return OperationVerdict::Failed;
        }
        OperationVerdict::Succeeded
    }

    fn is_integrity_failure(&self, output: &[String]) -> bool {
        output_contains_any(output, &["Hash check failed"])
    }
}

pub struct ScoopSources;

#[async_trait]
impl SourceProvider for ScoopSources {
    async fn load_sources(&self, ctx: &ManagerContext) -> Result<Vec<ManagerSource>> {
        let output = ctx.run(LoggableTaskType::ListSources, ["bucket", "list"]).await;
        parse_buckets(&output.stdout)
    }

    fn add_source_args(&self, source: &ManagerSource) -> Vec<String> {
        vec![
            "bucket".to_string(),
            "add".to_string(),
            source.name.clone(),
            source.url(),
        ]
    }

    fn remove_source_args(&self, source: &ManagerSource) -> Vec<String> {
        vec!["bucket".to_string(), "rm".to_string(), source.name.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OverriddenOptions;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn package() -> Package {
        Package::new("Ripgrep", "ripgrep", "14.0.0", "main", NAME)
    }

    #[test]
    fn test_fast_search_groups_by_bucket() {
        let out = lines(
            "'main' bucket:\n    ripgrep (14.1.0)\n    rga (0.10.6) --> includes 'rga.exe'\n\n'extras' bucket:\n    ripgrep-all (0.10.6)\n",
        );
        assert_eq!(
            parse_fast_search(&out),
            vec![
                ("ripgrep".to_string(), "14.1.0".to_string(), "main".to_string()),
                ("rga".to_string(), "0.10.6".to_string(), "main".to_string()),
                ("ripgrep-all".to_string(), "0.10.6".to_string(), "extras".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_table() {
        let out = lines(
            "Results from local buckets...\n\nName    Version Source Binaries\n----    ------- ------ --------\nripgrep 14.1.0  main\n",
        );
        assert_eq!(
            parse_search(&out),
            vec![("ripgrep".to_string(), "14.1.0".to_string(), "main".to_string())]
        );
    }

    #[test]
    fn test_installed_marks_global_apps() {
        let out = lines(
            "Installed apps:\n\nName    Version Source Updated             Info\n----    ------- ------ -------             ----\n7zip    23.01   main   2024-01-10 10:00:00\ngit     2.44.0  main   2024-02-01 09:30:00 Global install\n",
        );
        let apps = parse_installed(&out);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].scope, PackageScope::User);
        assert_eq!(apps[1].id, "git");
        assert_eq!(apps[1].scope, PackageScope::Global);
    }

    #[test]
    fn test_status_table() {
        let out = lines(
            "Name    Installed Version Latest Version Missing Dependencies Info\n----    ----------------- -------------- -------------------- ----\nripgrep 13.0.0            14.1.0\n",
        );
        assert_eq!(
            parse_status(&out),
            vec![("ripgrep".to_string(), "13.0.0".to_string(), "14.1.0".to_string())]
        );
    }

    #[test]
    fn test_bucket_list_with_local_bucket() {
        let out = lines(
            "Name   Source                                   Updated             Manifests\n----   ------                                   -------             ---------\nmain   https://github.com/ScoopInstaller/Main   4/5/2024 2:03:11 PM      1283\nmine   C:\\buckets\\mine                          2024-01-01 08:00:00        3\nshort  https://example.com/bucket\n",
        );
        let buckets = parse_buckets(&out).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].name, "main");
        assert_eq!(buckets[0].url(), "https://github.com/ScoopInstaller/Main");
        assert_eq!(buckets[0].package_count, Some(1283));
        assert_eq!(buckets[0].update_date.as_deref(), Some("4/5/2024 2:03:11"));
        assert!(buckets[1].url().ends_with("mine"));
        assert!(buckets[1].url().contains("buckets"));
        assert_eq!(buckets[1].package_count, Some(3));
    }

    #[test]
    fn test_install_args() {
        let def = definition().unwrap();
        let options = InstallOptions {
            skip_hash_check: true,
            architecture: "x64".to_string(),
            installation_scope: Some(PackageScope::Global),
            ..Default::default()
        };
        assert_eq!(
            ScoopOperations.install_args(&def.properties, &package(), &options),
            vec!["install", "main/ripgrep", "--global", "--skip-hash-check", "--arch", "64bit"]
        );
    }

    #[test]
    fn test_uninstall_purges_data() {
        let def = definition().unwrap();
        let options = InstallOptions {
            remove_data_on_uninstall: true,
            ..Default::default()
        };
        assert_eq!(
            ScoopOperations.uninstall_args(&def.properties, &package(), &options),
            vec!["uninstall", "ripgrep", "--purge"]
        );
    }

    #[test]
    fn test_global_hint_switches_scope_and_elevates() {
        let package = package();
        let mut options = InstallOptions::default();
        let output = vec![format!("ERROR: 'ripgrep' is installed globally. {}", GLOBAL_HINT)];

        let verdict = ScoopOperations.operation_verdict(&package, &mut options, OperationType::Update, 1, &output);
        assert_eq!(verdict, OperationVerdict::AutoRetry);
        assert_eq!(options.installation_scope, Some(PackageScope::Global));
        assert!(options.run_as_administrator);
        assert_eq!(package.overrides(), OverriddenOptions::default());

        let again = ScoopOperations.operation_verdict(&package, &mut options, OperationType::Update, 1, &output);
        assert_eq!(again, OperationVerdict::Failed);
    }

    #[test]
    fn test_admin_hint_elevates_once() {
        let package = package();
        let mut options = InstallOptions::default();
        let output = vec!["ERROR: you need admin rights to install global apps".to_string()];

        let verdict = ScoopOperations.operation_verdict(&package, &mut options, OperationType::Install, 1, &output);
        assert_eq!(verdict, OperationVerdict::AutoRetry);
        assert!(options.runs_elevated(&package));

        let again = ScoopOperations.operation_verdict(&package, &mut options, OperationType::Install, 1, &output);
        assert_eq!(again, OperationVerdict::Failed);
    }

    #[test]
    fn test_error_line_fails_despite_zero_exit() {
        let mut options = InstallOptions::default();
        let output = vec!["ERROR Couldn't find manifest for 'nope'".to_string()];
        assert_eq!(
            ScoopOperations.operation_verdict(&package(), &mut options, OperationType::Install, 0, &output),
            OperationVerdict::Failed
        );
        assert_eq!(
            ScoopOperations.operation_verdict(&package(), &mut options, OperationType::Install, 0, &[]),
            OperationVerdict::Succeeded
        );
    }

    #[test]
    fn test_refresh_is_throttled() {
        let listing = ScoopListing::default();
        let start = Instant::now();
        assert!(listing.claim_refresh(start));
        assert!(!listing.claim_refresh(start + Duration::from_secs(60)));
        assert!(listing.claim_refresh(start + INDEX_REFRESH_INTERVAL + Duration::from_secs(1)));
    }
}
