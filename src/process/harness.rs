use crate::process::logger::{ManagerLogger, lock};
use crate::process::task_log::LoggableTaskType;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Exit code fabricated when the process could not be started
pub const START_FAILED_EXIT_CODE: i32 = -1;

/// Exit code reported when the process was terminated by a signal
pub const SIGNALED_EXIT_CODE: i32 = -2;

/// One child-process invocation
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    task: LoggableTaskType,
    executable: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    stdin: Option<String>,
}

impl ProcessCommand {
    pub fn new(task: LoggableTaskType, executable: impl Into<PathBuf>) -> Self {
        Self {
            task,
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            stdin: None,
        }
    }

    /// Run `command` through the platform shell
    pub fn shell(task: LoggableTaskType, command: &str) -> Self {
        if cfg!(windows) {
            Self::new(task, "cmd").args(["/C", command])
        } else {
            Self::new(task, "sh").args(["-c", command])
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Text written to the child's stdin, after which stdin is closed
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    fn display_args(&self) -> String {
        shlex::try_join(self.args.iter().map(String::as_str))
            .unwrap_or_else(|_| self.args.join(" "))
    }
}

/// Captured result of one invocation
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    /// Stdout lines followed by stderr lines
    pub fn all_lines(&self) -> Vec<String> {
        self.stdout.iter().chain(self.stderr.iter()).cloned().collect()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Send every line of `reader` until EOF. Bytes that are not valid UTF-8 are
/// replaced rather than ending the capture.
async fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("Reading child {:?} failed: {}", stream, e);
                break;
            }
        }
    }
}

/// Spawns child processes and records every invocation in the manager's logger.
///
/// The harness never enforces a timeout; bounded waits are the caller's job.
/// Children are spawned with `kill_on_drop`, so a caller that abandons the
/// future (e.g. an aborted listing task) also terminates the process.
#[derive(Debug, Clone)]
pub struct ProcessHarness {
    logger: Arc<ManagerLogger>,
}

impl ProcessHarness {
    pub fn new(logger: Arc<ManagerLogger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<ManagerLogger> {
        &self.logger
    }

    pub async fn run(&self, command: ProcessCommand) -> ProcessOutput {
        let exe_display = command.executable.display().to_string();
        let task_log = self
            .logger
            .create_process(command.task, &exe_display, &command.display_args());

        let mut cmd = Command::new(&command.executable);
        cmd.args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Failed to start '{}': {}", exe_display, e);
                let mut guard = lock(&task_log);
                let _ = guard.add_stderr(&format!("Failed to start process: {}", e));
                let _ = guard.close(START_FAILED_EXIT_CODE);
                return ProcessOutput {
                    exit_code: START_FAILED_EXIT_CODE,
                    stdout: Vec::new(),
                    stderr: vec![format!("Failed to start process: {}", e)],
                };
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<(Stream, String)>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, Stream::Stderr, tx.clone()));
        }

        // Readers are already draining, so a child that writes before it has
        // consumed all of its input cannot block on a full pipe
        if let Some(input) = command.stdin.clone() {
            let _ = lock(&task_log).add_stdin(&input);
            if let Some(mut pipe) = child.stdin.take() {
                let exe = exe_display.clone();
                tokio::spawn(async move {
                    if let Err(e) = pipe.write_all(input.as_bytes()).await {
                        log::debug!("Writing stdin of '{}' failed: {}", exe, e);
                    }
                    // Dropping the pipe closes the child's stdin
                    let _ = pipe.shutdown().await;
                });
            }
        }
        drop(tx);

        let mut output = ProcessOutput::default();
        while let Some((stream, line)) = rx.recv().await {
            let mut guard = lock(&task_log);
            match stream {
                Stream::Stdout => {
                    let _ = guard.add_stdout(&line);
                    output.stdout.push(line);
                }
                Stream::Stderr => {
                    let _ = guard.add_stderr(&line);
                    output.stderr.push(line);
                }
            }
        }

        output.exit_code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(SIGNALED_EXIT_CODE),
            Err(e) => {
                let _ = lock(&task_log).add_stderr(&format!("Failed to wait for process: {}", e));
                START_FAILED_EXIT_CODE
            }
        };
        let _ = lock(&task_log).close(output.exit_code);

        output
    }
}
