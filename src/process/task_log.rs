//! Diagnostic records of subprocess-based and native tasks
//!
//! A task log is created open, appended to while the task runs and closed
//! exactly once. Writing to a closed log is an error. Reports are rendered as
//! severity-tagged lines so any front end can colour them.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Local};
use std::fmt;

/// Return code recorded when a task was closed without reporting one
pub const RETURN_CODE_UNSET: i32 = -200;

const RULE: &str = "------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggableTaskType {
    FindPackages,
    ListInstalledPackages,
    ListUpdates,
    ListSources,
    RefreshIndexes,
    LoadPackageVersions,
    LoadManagerVersion,
    InstallPackage,
    UpdatePackage,
    UninstallPackage,
    AddSource,
    RemoveSource,
    OtherTask,
}

impl fmt::Display for LoggableTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Colour/severity class of a report line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// White
    Info,
    /// Grey
    Verbose,
    /// Red
    Error,
    /// Blue, echoed stdin
    Input,
    /// Green
    Success,
    /// Yellow
    Warning,
}

impl Severity {
    pub fn code(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Verbose => 1,
            Severity::Error => 2,
            Severity::Input => 3,
            Severity::Success => 4,
            Severity::Warning => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub severity: Severity,
    pub text: String,
}

impl LogLine {
    fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(Severity::Info, "")
    }
}

/// Start/end bookkeeping shared by both log kinds
#[derive(Debug, Clone)]
struct Lifetime {
    start: DateTime<Local>,
    end: Option<DateTime<Local>>,
    return_code: Option<i32>,
}

impl Lifetime {
    fn open() -> Self {
        Self {
            start: Local::now(),
            end: None,
            return_code: None,
        }
    }

    fn is_open(&self) -> bool {
        self.return_code.is_none()
    }

    fn ensure_open(&self, kind: &str) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EngineError::Other(format!(
                "Attempted to write log into an already-closed {}",
                kind
            )))
        }
    }

    fn close(&mut self, kind: &str, return_code: i32) -> Result<()> {
        self.ensure_open(kind)?;
        self.return_code = Some(return_code);
        self.end = Some(Local::now());
        Ok(())
    }

    fn push_times(&self, out: &mut Vec<LogLine>, label: &str) {
        out.push(LogLine::new(
            Severity::Info,
            format!("{} start time: {}", label, format_time(&self.start)),
        ));
        match &self.end {
            Some(end) => out.push(LogLine::new(
                Severity::Info,
                format!("{} end time:   {}", label, format_time(end)),
            )),
            None => out.push(LogLine::new(
                Severity::Error,
                format!("{} end time:   UNFINISHED", label),
            )),
        }
    }
}

fn format_time(t: &DateTime<Local>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn push_nonempty(target: &mut Vec<String>, text: &str) {
    target.extend(
        text.split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
}

fn push_section(
    out: &mut Vec<LogLine>,
    title: &str,
    lines: &[String],
    severity: Severity,
    expanded: bool,
) {
    if lines.is_empty() {
        return;
    }
    out.push(LogLine::blank());
    out.push(LogLine::new(Severity::Info, title));
    if expanded {
        out.extend(
            lines
                .iter()
                .map(|line| LogLine::new(severity, format!("  {}", line))),
        );
    } else {
        out.push(LogLine::new(Severity::Verbose, " ..."));
    }
}

fn push_footer(out: &mut Vec<LogLine>) {
    out.push(LogLine::blank());
    out.push(LogLine::new(Severity::Info, RULE));
    out.push(LogLine::blank());
}

/// Log of one child-process invocation
#[derive(Debug, Clone)]
pub struct ProcessTaskLog {
    manager: String,
    task: LoggableTaskType,
    executable: String,
    arguments: String,
    stdin: Vec<String>,
    stdout: Vec<String>,
    stderr: Vec<String>,
    lifetime: Lifetime,
}

impl ProcessTaskLog {
    const KIND: &'static str = "ProcessTaskLog";

    pub fn new(
        manager: impl Into<String>,
        task: LoggableTaskType,
        executable: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            manager: manager.into(),
            task,
            executable: executable.into(),
            arguments: arguments.into(),
            stdin: Vec::new(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            lifetime: Lifetime::open(),
        }
    }

    pub fn add_stdin(&mut self, text: &str) -> Result<()> {
        self.lifetime.ensure_open(Self::KIND)?;
        push_nonempty(&mut self.stdin, text);
        Ok(())
    }

    pub fn add_stdout(&mut self, text: &str) -> Result<()> {
        self.lifetime.ensure_open(Self::KIND)?;
        push_nonempty(&mut self.stdout, text);
        Ok(())
    }

    pub fn add_stderr(&mut self, text: &str) -> Result<()> {
        self.lifetime.ensure_open(Self::KIND)?;
        push_nonempty(&mut self.stderr, text);
        Ok(())
    }

    pub fn close(&mut self, return_code: i32) -> Result<()> {
        self.lifetime.close(Self::KIND, return_code)
    }

    pub fn is_open(&self) -> bool {
        self.lifetime.is_open()
    }

    pub fn return_code(&self) -> Option<i32> {
        self.lifetime.return_code
    }

    pub fn task(&self) -> LoggableTaskType {
        self.task
    }

    pub fn stdout(&self) -> &[String] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    pub fn report(&self, verbose: bool) -> Vec<LogLine> {
        let mut out = vec![
            LogLine::new(
                Severity::Info,
                format!(
                    "Logged subprocess-based task on manager {}. Task type is {}",
                    self.manager, self.task
                ),
            ),
            LogLine::new(
                Severity::Info,
                format!("Subprocess executable: \"{}\"", self.executable),
            ),
            LogLine::new(
                Severity::Info,
                format!("Command-line arguments: \"{}\"", self.arguments),
            ),
        ];
        self.lifetime.push_times(&mut out, "Process");

        push_section(&mut out, "-- Process STDIN", &self.stdin, Severity::Input, verbose);
        push_section(&mut out, "-- Process STDOUT", &self.stdout, Severity::Verbose, verbose);
        push_section(&mut out, "-- Process STDERR", &self.stderr, Severity::Error, true);

        out.push(LogLine::blank());
        out.push(match self.lifetime.return_code {
            None => LogLine::new(Severity::Warning, "Return code: Process has not finished yet"),
            Some(RETURN_CODE_UNSET) => LogLine::new(Severity::Warning, "Return code: UNSPECIFIED"),
            Some(0) => LogLine::new(Severity::Success, "Return code: SUCCESS (0)"),
            Some(code) => LogLine::new(Severity::Error, format!("Return code: FAILED ({})", code)),
        });
        push_footer(&mut out);
        out
    }
}

/// Log of a task performed in-process (HTTP feeds, cache work)
#[derive(Debug, Clone)]
pub struct NativeTaskLog {
    manager: String,
    task: LoggableTaskType,
    info: Vec<String>,
    errors: Vec<String>,
    lifetime: Lifetime,
}

impl NativeTaskLog {
    const KIND: &'static str = "NativeTaskLog";

    pub fn new(manager: impl Into<String>, task: LoggableTaskType) -> Self {
        Self {
            manager: manager.into(),
            task,
            info: Vec::new(),
            errors: Vec::new(),
            lifetime: Lifetime::open(),
        }
    }

    pub fn log(&mut self, text: &str) -> Result<()> {
        self.lifetime.ensure_open(Self::KIND)?;
        push_nonempty(&mut self.info, text);
        Ok(())
    }

    pub fn error(&mut self, text: &str) -> Result<()> {
        self.lifetime.ensure_open(Self::KIND)?;
        push_nonempty(&mut self.errors, text);
        Ok(())
    }

    pub fn close(&mut self, return_code: i32) -> Result<()> {
        self.lifetime.close(Self::KIND, return_code)
    }

    pub fn is_open(&self) -> bool {
        self.lifetime.is_open()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn report(&self, verbose: bool) -> Vec<LogLine> {
        let mut out = vec![LogLine::new(
            Severity::Info,
            format!(
                "Logged native task on manager {}. Task type is {}",
                self.manager, self.task
            ),
        )];
        self.lifetime.push_times(&mut out, "Task");

        push_section(&mut out, "-- Task information", &self.info, Severity::Verbose, verbose);
        push_section(&mut out, "-- Task errors", &self.errors, Severity::Error, true);

        out.push(LogLine::blank());
        out.push(match self.lifetime.return_code {
            None => LogLine::new(Severity::Warning, "The task has not finished yet"),
            Some(RETURN_CODE_UNSET) => {
                LogLine::new(Severity::Warning, "The task did not report a finish status")
            }
            Some(0) => LogLine::new(Severity::Success, "The task reported success"),
            Some(code) => LogLine::new(
                Severity::Error,
                format!("The task reported a failure ({})", code),
            ),
        });
        push_footer(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[LogLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_process_report_header_and_success() {
        let mut log = ProcessTaskLog::new("Npm", LoggableTaskType::FindPackages, "/usr/bin/npm", "search foo");
        log.add_stdout("line one\n\nline two").unwrap();
        log.close(0).unwrap();

        let report = log.report(true);
        assert_eq!(
            report[0].text,
            "Logged subprocess-based task on manager Npm. Task type is FindPackages"
        );
        assert_eq!(report[1].text, "Subprocess executable: \"/usr/bin/npm\"");
        assert_eq!(report[2].text, "Command-line arguments: \"search foo\"");
        assert!(texts(&report).contains(&"  line one"));
        assert!(texts(&report).contains(&"  line two"));

        let code_line = report.iter().find(|l| l.text.starts_with("Return code")).unwrap();
        assert_eq!(code_line.text, "Return code: SUCCESS (0)");
        assert_eq!(code_line.severity, Severity::Success);
    }

    #[test]
    fn test_non_verbose_hides_stdout_but_not_stderr() {
        let mut log = ProcessTaskLog::new("Pip", LoggableTaskType::ListUpdates, "pip", "list");
        log.add_stdin("secret input").unwrap();
        log.add_stdout("noise").unwrap();
        log.add_stderr("boom").unwrap();
        log.close(2).unwrap();

        let report = log.report(false);
        let lines = texts(&report);
        assert!(!lines.contains(&"  noise"));
        assert!(!lines.contains(&"  secret input"));
        assert!(lines.contains(&"  boom"));
        assert_eq!(lines.iter().filter(|l| **l == " ...").count(), 2);
        assert!(lines.contains(&"Return code: FAILED (2)"));
    }

    #[test]
    fn test_open_log_reports_unfinished() {
        let log = ProcessTaskLog::new("Cargo", LoggableTaskType::ListInstalledPackages, "cargo", "");
        let report = log.report(false);

        let end = report.iter().find(|l| l.text.contains("end time")).unwrap();
        assert!(end.text.ends_with("UNFINISHED"));
        assert_eq!(end.severity, Severity::Error);
        assert!(texts(&report).contains(&"Return code: Process has not finished yet"));
    }

    #[test]
    fn test_unset_return_code_is_unspecified() {
        let mut log = ProcessTaskLog::new("Cargo", LoggableTaskType::OtherTask, "cargo", "");
        log.close(RETURN_CODE_UNSET).unwrap();
        assert!(texts(&log.report(false)).contains(&"Return code: UNSPECIFIED"));
    }

    #[test]
    fn test_writing_after_close_fails() {
        let mut log = ProcessTaskLog::new("Npm", LoggableTaskType::OtherTask, "npm", "");
        log.close(0).unwrap();
        assert!(log.add_stdout("late").is_err());
        assert!(log.close(1).is_err());
        assert_eq!(log.return_code(), Some(0));
    }

    #[test]
    fn test_native_report() {
        let mut log = NativeTaskLog::new("DotNet", LoggableTaskType::FindPackages);
        log.log("querying feed").unwrap();
        log.error("feed returned 500").unwrap();
        log.close(1).unwrap();

        let report = log.report(false);
        let lines = texts(&report);
        assert_eq!(
            lines[0],
            "Logged native task on manager DotNet. Task type is FindPackages"
        );
        assert!(lines[1].starts_with("Task start time: "));
        assert!(lines[2].starts_with("Task end time: "));
        assert!(!lines.iter().any(|l| l.starts_with("Process")));
        assert!(lines.contains(&"-- Task errors"));
        assert!(lines.contains(&"  feed returned 500"));
        assert!(lines.contains(&"The task reported a failure (1)"));
        assert!(log.error("again").is_err());
    }

    #[test]
    fn test_severity_codes() {
        assert_eq!(Severity::Info.code(), 0);
        assert_eq!(Severity::Input.code(), 3);
        assert_eq!(Severity::Warning.code(), 5);
    }
}
