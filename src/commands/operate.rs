//! Install, Update and Uninstall Commands
//!
//! Builds the install options from the command line (optionally on top of a
//! saved document), queues one operation and runs it.

use crate::cli::args::{GlobalFlags, OperationArgs};
use crate::commands::Session;
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageScope, format_as_name};
use crate::error::{EngineError, Result};
use crate::managers::PackageManager;
use crate::operations::{EnqueueOutcome, OperationQueue, OperationReport, OperationRunner, PackageOperation};
use crate::ui as output;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub struct OperateOptions<'a> {
    pub manager: &'a str,
    pub id: &'a str,
    pub operation: OperationType,
    pub args: &'a OperationArgs,
    pub remove_data: bool,
}

pub async fn run(global: &GlobalFlags, opts: OperateOptions<'_>) -> Result<()> {
    let mut options = build_options(opts.args, opts.operation)?;
    options.remove_data_on_uninstall |= opts.remove_data;

    let session = Session::start(global, Some(opts.manager)).await?;
    let manager = session.single_ready()?;
    let package = locate_package(manager, opts.id, opts.operation).await;

    log::debug!("Running {} of {} with {}", opts.operation, package, options);
    let queue = OperationQueue::new();
    if queue.enqueue(PackageOperation::new(Arc::clone(manager), package, opts.operation, options))
        == EnqueueOutcome::Duplicate
    {
        return Err(EngineError::Other(format!("{} is already queued", opts.id)));
    }

    let reports = OperationRunner::new().drain(&queue).await;
    session.finish();
    report_outcome(&reports, session.json)
}

/// Start from the `--options` document (if any) and apply the flags on top
pub fn build_options(args: &OperationArgs, operation: OperationType) -> Result<InstallOptions> {
    let mut options = match &args.options_file {
        Some(path) => load_options_file(path)?,
        None => InstallOptions::default(),
    };

    if let Some(version) = &args.version {
        options.version = version.clone();
    }
    if let Some(scope) = &args.scope {
        options.installation_scope = Some(
            scope
                .parse::<PackageScope>()
                .map_err(EngineError::InvalidOptions)?,
        );
    }
    if let Some(arch) = &args.arch {
        options.architecture = arch.clone();
    }
    if let Some(location) = &args.location {
        options.custom_install_location = location.clone();
    }
    options.run_as_administrator |= args.admin;
    options.interactive_installation |= args.interactive;
    options.skip_hash_check |= args.skip_hash_check;
    options.pre_release |= args.pre_release;

    if let Some(params) = &args.params {
        let split = shlex::split(params).ok_or_else(|| {
            EngineError::InvalidOptions(format!("Unbalanced quotes in parameters: {}", params))
        })?;
        match operation {
            OperationType::Install => options.custom_parameters_install = split,
            OperationType::Update => options.custom_parameters_update = split,
            OperationType::Uninstall => options.custom_parameters_uninstall = split,
        }
    }

    Ok(options)
}

pub fn load_options_file(path: &Path) -> Result<InstallOptions> {
    let content = fs::read_to_string(path).map_err(|e| EngineError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let document: serde_json::Value = serde_json::from_str(&content)?;
    InstallOptions::from_json(&document)
}

/// The canonical installed instance for updates and uninstalls, a fresh record otherwise
async fn locate_package(manager: &Arc<PackageManager>, id: &str, operation: OperationType) -> Arc<Package> {
    if operation != OperationType::Install {
        let listed = match operation {
            OperationType::Update => manager.get_available_updates().await,
            _ => manager.get_installed_packages().await,
        };
        if let Some(found) = listed.into_iter().find(|p| p.id.eq_ignore_ascii_case(id)) {
            return found;
        }
        log::warn!("{} is not listed by {}, trying anyway", id, manager.display_name());
    }

    Arc::new(Package::new(
        format_as_name(id),
        id,
        "",
        manager.properties().default_source_name(),
        manager.name(),
    ))
}

pub fn report_outcome(reports: &[OperationReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        for report in reports {
            let line = format!(
                "{} {} via {}: {} after {} attempt(s)",
                report.operation, report.package_id, report.manager, report.verdict, report.attempts
            );
            if report.succeeded() {
                output::success(&line);
            } else {
                output::error(&line);
                if report.integrity_failed {
                    output::indent("The package failed its integrity check. Retry with --skip-hash-check to ignore it.", 1);
                }
                for text in report.output.iter().rev().take(5).rev() {
                    output::indent(text, 1);
                }
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        return Err(EngineError::Other(format!("{} of {} operations did not succeed", failed, reports.len())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_become_options() {
        let args = OperationArgs {
            version: Some("2.0.0".to_string()),
            scope: Some("global".to_string()),
            admin: true,
            params: Some("--foo 'bar baz'".to_string()),
            ..Default::default()
        };
        let options = build_options(&args, OperationType::Update).unwrap();

        assert_eq!(options.version, "2.0.0");
        assert_eq!(options.installation_scope, Some(PackageScope::Global));
        assert!(options.run_as_administrator);
        assert_eq!(options.custom_parameters_update, vec!["--foo", "bar baz"]);
        assert!(options.custom_parameters_install.is_empty());
    }

    #[test]
    fn test_unbalanced_params_are_rejected() {
        let args = OperationArgs {
            params: Some("--foo 'bar".to_string()),
            ..Default::default()
        };
        assert!(build_options(&args, OperationType::Install).is_err());
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let args = OperationArgs {
            scope: Some("galaxy".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_options(&args, OperationType::Install),
            Err(EngineError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_flags_apply_on_top_of_document() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"SkipHashCheck": true, "Architecture": "x86"}}"#).unwrap();
        let args = OperationArgs {
            options_file: Some(file.path().to_path_buf()),
            arch: Some("arm64".to_string()),
            ..Default::default()
        };
        let options = build_options(&args, OperationType::Install).unwrap();

        assert!(options.skip_hash_check);
        assert_eq!(options.architecture, "arm64");
    }

    #[test]
    fn test_failed_report_is_an_error() {
        let report = OperationReport {
            manager: "Npm".to_string(),
            package_id: "left-pad".to_string(),
            operation: "install".to_string(),
            verdict: crate::core::verdict::OperationVerdict::Failed,
            attempts: 1,
            integrity_failed: false,
            output: vec!["boom".to_string()],
        };
        assert!(report_outcome(&[report], true).is_err());
        assert!(report_outcome(&[], true).is_ok());
    }
}
