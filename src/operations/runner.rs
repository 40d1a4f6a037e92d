//! Executes queued operations against their manager
//!
//! A run tags the package as being processed, kills the processes the user
//! asked for, runs the pre-operation hook, then drives the manager through at
//! most [`MAX_OPERATION_ATTEMPTS`] attempts. Only an `AutoRetry` verdict leads
//! to another attempt, and the verdict function has already adjusted the
//! options for it by then.

use super::queue::{OperationQueue, PackageOperation};
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageTag};
use crate::core::verdict::OperationVerdict;
use crate::events::{EngineEvent, OperationVerdictProduced};
use crate::managers::PackageManager;
use crate::process::{LoggableTaskType, ProcessCommand, ProcessOutput};
use serde::Serialize;
use std::path::PathBuf;

pub const MAX_OPERATION_ATTEMPTS: u32 = 2;

/// Outcome of one operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub manager: String,
    pub package_id: String,
    pub operation: String,
    pub verdict: OperationVerdict,
    /// Manager invocations made, 0 when the run stopped before the first
    pub attempts: u32,
    pub integrity_failed: bool,
    /// Output of the last attempt
    pub output: Vec<String>,
}

impl OperationReport {
    fn new(op: &PackageOperation) -> Self {
        Self {
            manager: op.manager.name().to_string(),
            package_id: op.package.id.clone(),
            operation: op.operation.to_string(),
            verdict: OperationVerdict::Failed,
            attempts: 0,
            integrity_failed: false,
            output: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.verdict == OperationVerdict::Succeeded
    }
}

fn task_type(operation: OperationType) -> LoggableTaskType {
    match operation {
        OperationType::Install => LoggableTaskType::InstallPackage,
        OperationType::Update => LoggableTaskType::UpdatePackage,
        OperationType::Uninstall => LoggableTaskType::UninstallPackage,
    }
}

fn final_tag(operation: OperationType, verdict: OperationVerdict) -> PackageTag {
    match (verdict, operation) {
        (OperationVerdict::Succeeded, OperationType::Install) => PackageTag::AlreadyInstalled,
        (OperationVerdict::Failed | OperationVerdict::AutoRetry, _) => PackageTag::Failed,
        _ => PackageTag::Default,
    }
}

/// Command that terminates every process called `name`
fn kill_command(name: &str) -> ProcessCommand {
    if cfg!(windows) {
        ProcessCommand::new(LoggableTaskType::OtherTask, "taskkill").args(["/F", "/IM", name])
    } else {
        ProcessCommand::new(LoggableTaskType::OtherTask, "pkill").args(["-x", name])
    }
}

/// Re-target `command` at `elevator`, keeping the original executable as its first argument
fn elevate(command: ProcessCommand, task: LoggableTaskType, elevator: PathBuf) -> ProcessCommand {
    ProcessCommand::new(task, elevator)
        .args([command.executable().display().to_string()])
        .args(command.argv().to_vec())
}

#[derive(Debug, Clone)]
pub struct OperationRunner {
    /// Elevation is skipped (and logged) when no elevator is available
    elevator: Option<PathBuf>,
}

impl OperationRunner {
    pub fn new() -> Self {
        Self {
            elevator: which::which("sudo").ok(),
        }
    }

    /// Runner that never elevates
    pub fn without_elevation() -> Self {
        Self { elevator: None }
    }

    pub async fn run(&self, op: PackageOperation) -> OperationReport {
        let mut report = OperationReport::new(&op);
        let manager = &op.manager;
        let package = &op.package;

        if !manager.is_ready() {
            log::error!(
                "Cannot {} {}: manager {} is {}",
                op.operation,
                package.id,
                manager.name(),
                manager.state()
            );
            package.set_tag(PackageTag::Failed);
            return report;
        }

        package.set_tag(PackageTag::BeingProcessed);
        let mut options = op.options.clone();

        self.kill_before_operation(manager, &options).await;

        if !self.run_pre_hook(manager, &options, op.operation).await {
            log::error!(
                "Pre-{} command failed for {}, aborting",
                op.operation,
                package.id
            );
            package.set_tag(PackageTag::Failed);
            return report;
        }

        for attempt in 0..MAX_OPERATION_ATTEMPTS {
            report.attempts = attempt + 1;
            let output = self.invoke(manager, package, &options, op.operation).await;
            let lines = output.all_lines();

            let integrity_failed = op.operation == OperationType::Install
                && !options.skip_hash_check
                && !output.success()
                && manager.operations().is_integrity_failure(&lines);

            let mut verdict = if integrity_failed {
                report.integrity_failed = true;
                OperationVerdict::Failed
            } else {
                manager.operation_verdict(package, &mut options, op.operation, output.exit_code, &lines)
            };

            manager
                .events()
                .publish(EngineEvent::OperationVerdictProduced(OperationVerdictProduced {
                    manager: manager.name().to_string(),
                    package_id: package.id.clone(),
                    operation: op.operation,
                    verdict,
                    attempt,
                }));
            report.output = lines;

            if verdict == OperationVerdict::AutoRetry {
                if attempt + 1 < MAX_OPERATION_ATTEMPTS {
                    log::info!(
                        "{} of {} will be retried with adjusted options:\n{}",
                        op.operation,
                        package.id,
                        options
                    );
                    continue;
                }
                verdict = OperationVerdict::Failed;
            }
            report.verdict = verdict;
            break;
        }

        if report.verdict == OperationVerdict::Succeeded {
            self.run_post_hook(manager, &options, op.operation).await;
        }
        package.set_tag(final_tag(op.operation, report.verdict));
        log::info!(
            "{} of {} on {} finished: {}",
            op.operation,
            package.id,
            manager.name(),
            report.verdict
        );
        report
    }

    /// Run every queued operation in order
    pub async fn drain(&self, queue: &OperationQueue) -> Vec<OperationReport> {
        let mut reports = Vec::new();
        while let Some(op) = queue.dequeue() {
            let hash = op.hash();
            reports.push(self.run(op).await);
            queue.complete(hash);
        }
        reports
    }

    async fn invoke(
        &self,
        manager: &PackageManager,
        package: &Package,
        options: &InstallOptions,
        operation: OperationType,
    ) -> ProcessOutput {
        let ctx = manager.context();
        let task = task_type(operation);
        let args = manager.operation_args(package, options, operation);
        let mut command = ctx.command(task).args(args);

        if options.runs_elevated(package) {
            match &self.elevator {
                Some(elevator) => command = elevate(command, task, elevator.clone()),
                None => log::warn!(
                    "{} should run elevated but no elevator was found, running unelevated",
                    package.id
                ),
            }
        }
        ctx.harness.run(command).await
    }

    async fn kill_before_operation(&self, manager: &PackageManager, options: &InstallOptions) {
        for name in options.kill_before_operation.iter().filter(|n| !n.trim().is_empty()) {
            log::info!("Killing process {} before the operation", name);
            let output = manager.context().harness.run(kill_command(name)).await;
            if !output.success() {
                log::debug!("Could not kill {} (exit code {})", name, output.exit_code);
            }
        }
    }

    /// False when the hook failed and the options ask to abort on that
    async fn run_pre_hook(
        &self,
        manager: &PackageManager,
        options: &InstallOptions,
        operation: OperationType,
    ) -> bool {
        let hook = options.pre_command(operation).trim();
        if hook.is_empty() {
            return true;
        }
        let output = manager
            .context()
            .harness
            .run(ProcessCommand::shell(LoggableTaskType::OtherTask, hook))
            .await;
        if output.success() {
            return true;
        }
        log::warn!("Pre-operation command exited with code {}", output.exit_code);
        !options.abort_on_pre_fail(operation)
    }

    async fn run_post_hook(&self, manager: &PackageManager, options: &InstallOptions, operation: OperationType) {
        let hook = options.post_command(operation).trim();
        if hook.is_empty() {
            return;
        }
        let output = manager
            .context()
            .harness
            .run(ProcessCommand::shell(LoggableTaskType::OtherTask, hook))
            .await;
        if !output.success() {
            log::warn!("Post-operation command exited with code {}", output.exit_code);
        }
    }
}

impl Default for OperationRunner {
    fn default() -> Self {
        Self::new()
    }
}
