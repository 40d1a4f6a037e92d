//! Node's package manager
//!
//! Listings come from `npm ... --json`. Search output is either a JSON array
//! or one object per line depending on the npm version; both are accepted.

use super::{home_dir, strings, verb};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageScope, format_as_name};
use crate::core::verdict::OperationVerdict;
use crate::error::Result;
use crate::managers::engine::ManagerDefinition;
use crate::managers::traits::{ListingProvider, ManagerContext, OperationProvider, exit_code_verdict};
use crate::managers::types::{ManagerCapabilities, ManagerProperties};
use crate::process::{LoggableTaskType, ProcessOutput};
use crate::sources::ManagerSource;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const NAME: &str = "Npm";
const DEFAULT_SOURCE: &str = "npm";
const DEFAULT_SOURCE_URL: &str = "https://www.npmjs.com/";

pub fn definition() -> Result<ManagerDefinition> {
    let source = ManagerSource::new(NAME, DEFAULT_SOURCE, DEFAULT_SOURCE_URL);
    Ok(ManagerDefinition {
        properties: ManagerProperties {
            name: NAME.to_string(),
            display_name: "Npm".to_string(),
            description: "Node JS's package manager: JavaScript libraries and related utilities"
                .to_string(),
            executable_names: strings(&["npm"]),
            executable_call_args: Vec::new(),
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
            supports_custom_scopes: true,
            supports_pre_release: true,
            ..Default::default()
        },
        listing: Arc::new(NpmListing),
        operations: Arc::new(NpmOperations),
        sources: None,
    })
}

/// `(id, version)` pairs from `npm search --json`
pub fn parse_search(stdout: &[String]) -> Vec<(String, String)> {
    let joined = stdout.join("\n");
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&joined) {
        return items.iter().filter_map(name_and_version).collect();
    }

    stdout
        .iter()
        .filter(|l| l.trim_start().starts_with('{'))
        .filter_map(|l| serde_json::from_str::<Value>(l.trim().trim_end_matches(',')).ok())
        .filter_map(|v| name_and_version(&v))
        .collect()
}

fn name_and_version(node: &Value) -> Option<(String, String)> {
    let id = node.get("name")?.as_str()?;
    let version = node.get("version")?.as_str()?;
    Some((id.to_string(), version.to_string()))
}

/// `(id, version)` pairs from the `dependencies` object of `npm list --json`
pub fn parse_installed(stdout: &[String]) -> Vec<(String, String)> {
    let Ok(doc) = serde_json::from_str::<Value>(&stdout.join("\n")) else {
        return Vec::new();
    };
    let Some(deps) = doc.get("dependencies").and_then(Value::as_object) else {
        return Vec::new();
    };
    deps.iter()
        .filter_map(|(id, data)| {
            let version = data.get("version")?.as_str()?;
            Some((id.clone(), version.to_string()))
        })
        .collect()
}

/// `(id, current, latest)` triples from `npm outdated --json`
pub fn parse_outdated(stdout: &[String]) -> Vec<(String, String, String)> {
    let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(&stdout.join("\n")) else {
        return Vec::new();
    };
    doc.iter()
        .filter_map(|(id, data)| {
            let current = data.get("current")?.as_str()?;
            let latest = data.get("latest")?.as_str()?;
            Some((id.clone(), current.to_string(), latest.to_string()))
        })
        .collect()
}

fn scope_args(scope: PackageScope) -> Vec<String> {
    if scope == PackageScope::Global {
        vec!["--global".to_string()]
    } else {
        Vec::new()
    }
}

async fn run_in_home(ctx: &ManagerContext, task: LoggableTaskType, args: Vec<String>) -> ProcessOutput {
    let mut command = ctx.command(task).args(args);
    if let Some(home) = home_dir() {
        command = command.current_dir(home);
    }
    ctx.harness.run(command).await
}

pub struct NpmListing;

#[async_trait]
impl ListingProvider for NpmListing {
    async fn find_packages(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        let output = run_in_home(
            ctx,
            LoggableTaskType::FindPackages,
            vec!["search".to_string(), query.to_string(), "--json".to_string()],
        )
        .await;
        Ok(parse_search(&output.stdout)
            .into_iter()
            .map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
            })
            .collect())
    }

    async fn list_installed(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        for scope in [PackageScope::Local, PackageScope::Global] {
            let mut args = strings(&["list", "--json"]);
            args.extend(scope_args(scope));
            let output = run_in_home(ctx, LoggableTaskType::ListInstalledPackages, args).await;
            packages.extend(parse_installed(&output.stdout).into_iter().map(|(id, version)| {
                Package::new(format_as_name(&id), id, version, DEFAULT_SOURCE, ctx.name())
                    .with_scope(scope)
            }));
        }
        Ok(packages)
    }

    async fn list_upgrades(&self, ctx: &ManagerContext) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        for scope in [PackageScope::Local, PackageScope::Global] {
            let mut args = strings(&["outdated", "--json"]);
            args.extend(scope_args(scope));
            let output = run_in_home(ctx, LoggableTaskType::ListUpdates, args).await;
            packages.extend(parse_outdated(&output.stdout).into_iter().map(
                |(id, current, latest)| {
                    Package::new(format_as_name(&id), id, current, DEFAULT_SOURCE, ctx.name())
                        .with_new_version(latest)
                        .with_scope(scope)
                },
            ));
        }
        Ok(packages)
    }
}

pub struct NpmOperations;

impl OperationProvider for NpmOperations {
    fn operation_args(
        &self,
        properties: &ManagerProperties,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> Vec<String> {
        let target = if operation != OperationType::Uninstall && !options.version.is_empty() {
            format!("{}@{}", package.id, options.version)
        } else {
            package.id.clone()
        };
        let mut args = vec![verb(properties, operation), target];

        let scope = options.effective_scope(package).unwrap_or(package.scope);
        args.extend(scope_args(scope));

        if operation == OperationType::Install && options.pre_release {
            args.extend(strings(&["--include", "dev"]));
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_search_accepts_json_array() {
        let out = lines(
            r#"[
  {"name":"left-pad","version":"1.3.0","description":"pad"},
  {"name":"pad-left","version":"2.1.0"},
  {"description":"no name"}
]"#,
        );
        assert_eq!(
            parse_search(&out),
            vec![
                ("left-pad".to_string(), "1.3.0".to_string()),
                ("pad-left".to_string(), "2.1.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_accepts_object_per_line() {
        let out = lines(
            "npm WARN something\n{\"name\":\"left-pad\",\"version\":\"1.3.0\"}\n{broken json\n",
        );
        assert_eq!(
            parse_search(&out),
            vec![("left-pad".to_string(), "1.3.0".to_string())]
        );
    }

    #[test]
    fn test_installed_reads_dependencies() {
        let out = lines(
            r#"{"name":"project","dependencies":{"typescript":{"version":"5.4.5"},"broken":{}}}"#,
        );
        assert_eq!(
            parse_installed(&out),
            vec![("typescript".to_string(), "5.4.5".to_string())]
        );
    }

    #[test]
    fn test_outdated_reads_current_and_latest() {
        let out = lines(r#"{"eslint":{"current":"8.57.0","wanted":"8.57.0","latest":"9.2.0"}}"#);
        assert_eq!(
            parse_outdated(&out),
            vec![(
                "eslint".to_string(),
                "8.57.0".to_string(),
                "9.2.0".to_string()
            )]
        );
        assert!(parse_outdated(&[]).is_empty());
    }

    #[test]
    fn test_install_args_with_version_and_global_scope() {
        let def = definition().unwrap();
        let package = Package::new("Typescript", "typescript", "5.0.0", "npm", NAME)
            .with_scope(PackageScope::Global);
        let options = InstallOptions {
            version: "5.4.5".to_string(),
            custom_parameters_install: vec!["--no-audit".to_string()],
            ..Default::default()
        };
        let args = NpmOperations.install_args(&def.properties, &package, &options);
        assert_eq!(args, vec!["install", "typescript@5.4.5", "--global", "--no-audit"]);
    }

    #[test]
    fn test_uninstall_ignores_version() {
        let def = definition().unwrap();
        let package = Package::new("Typescript", "typescript", "5.0.0", "npm", NAME);
        let options = InstallOptions {
            version: "5.4.5".to_string(),
            ..Default::default()
        };
        let args = NpmOperations.uninstall_args(&def.properties, &package, &options);
        assert_eq!(args, vec!["uninstall", "typescript"]);
    }

    #[test]
    fn test_verdict_is_exit_code_based() {
        let package = Package::new("x", "x", "1", "npm", NAME);
        let mut options = InstallOptions::default();
        assert_eq!(
            NpmOperations.operation_verdict(&package, &mut options, OperationType::Install, 0, &[]),
            OperationVerdict::Succeeded
        );
        assert_eq!(
            NpmOperations.operation_verdict(&package, &mut options, OperationType::Install, 1, &[]),
            OperationVerdict::Failed
        );
        assert_eq!(options, InstallOptions::default());
    }
}
