// Process runner behaviour against real child processes
#![cfg(unix)]

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use transq::engine::cancel::CancelToken;
use transq::engine::core::log::{LogLevel, LogSink, MemoryLog};
use transq::engine::runner::ProcessRunner;

fn sh(script: &str) -> Vec<OsString> {
    vec![OsString::from("-c"), OsString::from(script)]
}

fn run_sh(script: &str, cancel: &CancelToken) -> (transq::engine::RunOutcome, MemoryLog) {
    let memory = MemoryLog::new();
    let log: Arc<dyn LogSink> = Arc::new(memory.clone());
    let outcome = ProcessRunner::with_poll_interval(Duration::from_millis(10))
        .run(Path::new("sh"), &sh(script), cancel, log)
        .expect("sh should start");
    (outcome, memory)
}

#[test]
fn stderr_error_lines_are_classified() {
    let (outcome, log) = run_sh(
        "echo 'frame=1 fps=0.0' >&2; echo 'Some ERROR happened' >&2; echo done",
        &CancelToken::new(),
    );
    assert!(outcome.success);
    assert_eq!(outcome.exit_code, Some(0));

    let entries = log.entries();
    assert_eq!(entries[0].level, LogLevel::Command);
    assert!(entries[0].message.starts_with("sh -c"));
    assert_eq!(log.count(LogLevel::Command), 1);
    assert_eq!(log.count(LogLevel::Error), 1);
    assert!(entries.iter().any(|e| e.level == LogLevel::Info && e.message == "done"));
    assert!(entries.iter().any(|e| e.level == LogLevel::Info && e.message == "frame=1 fps=0.0"));
}

#[test]
fn nonzero_exit_keeps_stderr() {
    let (outcome, _) = run_sh("echo 'Conversion failed!' >&2; exit 3", &CancelToken::new());
    assert!(!outcome.success);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.exit_code, Some(3));
    assert_eq!(outcome.last_stderr_line(), Some("Conversion failed!"));
}

#[test]
fn cancellation_wins_over_clean_exit() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let (outcome, _) = run_sh("exit 0", &cancel);
    assert!(outcome.cancelled);
    assert!(!outcome.success);
}

#[test]
fn cancel_terminates_descendants() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.cancel();
    });

    let started = Instant::now();
    // the background sleep keeps the stderr pipe open unless it is killed too
    let (outcome, _) = run_sh("sleep 30 & sleep 30; wait", &cancel);
    canceller.join().unwrap();

    assert!(outcome.cancelled);
    assert!(!outcome.success);
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn progress_updates_stream_as_separate_lines() {
    let (outcome, log) = run_sh(
        r"printf 'frame=1\rframe=2\rframe=3\r' >&2; printf 'done\n' >&2",
        &CancelToken::new(),
    );
    assert!(outcome.success);

    let lines: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.level != LogLevel::Command)
        .map(|e| e.message)
        .collect();
    assert_eq!(lines, ["frame=1", "frame=2", "frame=3", "done"]);
    assert_eq!(outcome.stderr, "frame=1\nframe=2\nframe=3\ndone\n");
}
