//! External process execution with streamed logging and cancellation

use crate::engine::cancel::CancelToken;
use crate::engine::core::ffmpeg_cmd::{BuiltCommand, format_command_line};
use crate::engine::core::log::{LogEntry, LogSink};
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::{Pid, System};
use thiserror::Error;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one process run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code 0 and no cancellation
    pub success: bool,
    pub cancelled: bool,
    pub exit_code: Option<i32>,
    /// Every stderr line, kept as the failure diagnostic
    pub stderr: String,
}

impl RunOutcome {
    fn from_status(status: ExitStatus, cancelled: bool, stderr: String) -> Self {
        Self {
            success: status.success() && !cancelled,
            cancelled,
            exit_code: status.code(),
            stderr,
        }
    }

    /// Last non-empty stderr line, handy as a one-line error summary
    pub fn last_stderr_line(&self) -> Option<&str> {
        self.stderr.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Case-insensitive "error" anywhere in the line
pub fn is_error_line(line: &str) -> bool {
    line.to_ascii_lowercase().contains("error")
}

fn spawn_reader<R, F>(stream: R, name: &str, classify: F, log: Arc<dyn LogSink>) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
    F: Fn(&str) -> LogEntry + Send + 'static,
{
    thread::Builder::new()
        .name(format!("runner-{}", name))
        .spawn(move || {
            let mut captured = String::new();
            for_each_line(BufReader::new(stream), |line| {
                log.push(classify(line));
                captured.push_str(line);
                captured.push('\n');
            });
            captured
        })
        .ok()
}

/// Feed `on_line` every line as it arrives. ffmpeg rewrites its progress
/// line with `\r`, so both `\r` and `\n` end a line; empty segments are dropped.
fn for_each_line<R: BufRead>(mut reader: R, mut on_line: impl FnMut(&str)) {
    let mut pending: Vec<u8> = Vec::new();
    let mut emit = |pending: &mut Vec<u8>| {
        if !pending.is_empty() {
            on_line(&String::from_utf8_lossy(pending));
            pending.clear();
        }
    };
    loop {
        let consumed = match reader.fill_buf() {
            Ok([]) => break,
            Ok(buf) => {
                for &byte in buf {
                    if byte == b'\n' || byte == b'\r' {
                        emit(&mut pending);
                    } else {
                        pending.push(byte);
                    }
                }
                buf.len()
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        reader.consume(consumed);
    }
    emit(&mut pending);
}

/// PIDs of every live descendant of `root`
fn descendants(system: &System, root: Pid) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for (pid, process) in system.processes() {
            if process.parent() == Some(parent) && !found.contains(pid) {
                found.push(*pid);
                frontier.push(*pid);
            }
        }
    }
    found
}

/// Kill the child and everything it started
fn terminate_tree(child: &mut Child) {
    let root = Pid::from_u32(child.id());

    let mut system = System::new();
    system.refresh_processes();
    for pid in descendants(&system, root).into_iter().rev() {
        if let Some(process) = system.process(pid) {
            process.kill();
        }
    }

    #[cfg(unix)]
    {
        // the child leads its own process group
        // SAFETY: killpg has no memory-safety preconditions
        unsafe {
            libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
        }
    }

    if let Err(e) = child.kill() {
        tracing::debug!("kill after group signal: {}", e);
    }
}

/// Launches external binaries without a shell
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn run_built(
        &self,
        built: &BuiltCommand,
        cancel: &CancelToken,
        log: Arc<dyn LogSink>,
    ) -> Result<RunOutcome, RunnerError> {
        self.run(&built.program, &built.args, cancel, log)
    }

    /// Run `program args...` to completion or cancellation.
    ///
    /// The composed command line is logged once at `Command` level before launch.
    /// stdout lines are logged as Info, stderr lines as Error when they mention
    /// "error" and Info otherwise.
    pub fn run(
        &self,
        program: &Path,
        args: &[OsString],
        cancel: &CancelToken,
        log: Arc<dyn LogSink>,
    ) -> Result<RunOutcome, RunnerError> {
        let program_name = program.display().to_string();
        log.push(LogEntry::command(format_command_line(program, args)));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: program_name.clone(),
            source,
        })?;
        tracing::debug!(pid = child.id(), program = %program_name, "process started");

        let stdout_reader = child
            .stdout
            .take()
            .and_then(|out| spawn_reader(out, "stdout", |line: &str| LogEntry::info(line), log.clone()));
        let stderr_reader = child.stderr.take().and_then(|err| {
            spawn_reader(
                err,
                "stderr",
                |line: &str| {
                    if is_error_line(line) {
                        LogEntry::error(line)
                    } else {
                        LogEntry::info(line)
                    }
                },
                log.clone(),
            )
        });

        let mut killed = false;
        let status = loop {
            if cancel.is_cancelled() && !killed {
                tracing::info!(pid = child.id(), "cancel requested, terminating process tree");
                terminate_tree(&mut child);
                killed = true;
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(self.poll_interval),
                Err(source) => {
                    terminate_tree(&mut child);
                    return Err(RunnerError::Wait {
                        program: program_name,
                        source,
                    });
                }
            }
        };

        if let Some(handle) = stdout_reader {
            let _ = handle.join();
        }
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        // checked after exit so a natural finish racing a cancel still counts as cancelled
        let cancelled = cancel.is_cancelled();
        let outcome = RunOutcome::from_status(status, cancelled, stderr);
        tracing::debug!(
            exit_code = ?outcome.exit_code,
            cancelled = outcome.cancelled,
            "process finished"
        );
        Ok(outcome)
    }
}

/// Resolve a bare program name against PATH, like a shell would
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(format!("{}.exe", program));
            [plain, exe]
        })
        .find(|p| p.is_file())
}
