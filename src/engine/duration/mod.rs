//! Source duration detection.
//!
//! Providers are tried in order and the first strictly positive duration wins.
//! Each provider gets a normal attempt and, if that finds nothing, one retry with
//! an extended scan. Failures are logged and never stop the chain.

mod ffprobe;
mod mediainfo;
mod mp4;

pub use ffprobe::FfprobeDuration;
pub use mediainfo::MediaInfoDuration;
pub use mp4::{Mp4HeaderDuration, read_mvhd_duration};

use crate::engine::cancel::CancelToken;
use crate::engine::core::log::{LogSink, LogSinkExt};
use crate::engine::core::types::DurationSource;
use crate::engine::probe::ProbeError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// How deep a provider should look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDepth {
    Normal,
    Extended,
}

pub trait DurationProvider: Send + Sync {
    fn source(&self) -> DurationSource;

    /// `Ok(None)` when the provider ran but found no usable duration
    fn try_duration(&self, path: &Path, depth: ScanDepth) -> Result<Option<f64>, ProbeError>;
}

/// Outcome of the provider chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedDuration {
    pub seconds: Option<f64>,
    pub source: DurationSource,
}

impl DetectedDuration {
    pub fn unknown() -> Self {
        Self {
            seconds: None,
            source: DurationSource::Unknown,
        }
    }
}

/// Pending result of a background duration lookup
pub struct DurationTask {
    rx: Receiver<DetectedDuration>,
    done: Option<DetectedDuration>,
}

impl DurationTask {
    fn ready(result: DetectedDuration) -> Self {
        let (_tx, rx) = mpsc::channel();
        Self {
            rx,
            done: Some(result),
        }
    }

    /// Block until the chain finishes. A panicked worker counts as unknown.
    pub fn wait(mut self) -> DetectedDuration {
        if let Some(done) = self.done.take() {
            return done;
        }
        self.rx.recv().unwrap_or_else(|_| DetectedDuration::unknown())
    }

    /// Non-blocking poll
    pub fn try_result(&mut self) -> Option<DetectedDuration> {
        if self.done.is_none() {
            match self.rx.try_recv() {
                Ok(result) => self.done = Some(result),
                Err(TryRecvError::Disconnected) => self.done = Some(DetectedDuration::unknown()),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.done
    }
}

fn valid_duration(seconds: Option<f64>) -> Option<f64> {
    seconds.filter(|s| s.is_finite() && *s > 0.0)
}

/// Chain of duration providers
#[derive(Clone)]
pub struct DurationResolver {
    providers: Vec<Arc<dyn DurationProvider>>,
}

impl DurationResolver {
    pub fn new(providers: Vec<Arc<dyn DurationProvider>>) -> Self {
        Self { providers }
    }

    /// Container header, then mediainfo, then ffprobe
    pub fn standard(mediainfo: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        let providers: Vec<Arc<dyn DurationProvider>> = vec![
            Arc::new(Mp4HeaderDuration),
            Arc::new(MediaInfoDuration::new(mediainfo)),
            Arc::new(FfprobeDuration::new(ffprobe)),
        ];
        Self::new(providers)
    }

    pub fn providers(&self) -> impl Iterator<Item = DurationSource> + '_ {
        self.providers.iter().map(|p| p.source())
    }

    fn attempt(
        provider: &dyn DurationProvider,
        path: &Path,
        depth: ScanDepth,
        log: &dyn LogSink,
    ) -> Option<f64> {
        match provider.try_duration(path, depth) {
            Ok(seconds) => valid_duration(seconds),
            Err(e) => {
                log.info(format!("{} unavailable: {}", provider.source(), e));
                None
            }
        }
    }

    /// Run the chain on the current thread.
    ///
    /// Cancellation is checked before each provider starts, not during a call.
    pub fn resolve_blocking(
        &self,
        path: &Path,
        cancel: &CancelToken,
        log: &dyn LogSink,
    ) -> DetectedDuration {
        for provider in &self.providers {
            if cancel.is_cancelled() {
                break;
            }
            let found = Self::attempt(provider.as_ref(), path, ScanDepth::Normal, log).or_else(|| {
                tracing::debug!(source = %provider.source(), path = %path.display(), "retrying with extended scan");
                Self::attempt(provider.as_ref(), path, ScanDepth::Extended, log)
            });
            if let Some(seconds) = found {
                return DetectedDuration {
                    seconds: Some(seconds),
                    source: provider.source(),
                };
            }
        }
        DetectedDuration::unknown()
    }

    /// Run the chain on a one-shot background thread
    pub fn resolve(
        &self,
        path: &Path,
        cancel: &CancelToken,
        log: Arc<dyn LogSink>,
    ) -> DurationTask {
        if cancel.is_cancelled() {
            return DurationTask::ready(DetectedDuration::unknown());
        }

        let (tx, rx) = mpsc::channel();
        let resolver = self.clone();
        let path = path.to_path_buf();
        let cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name("duration-probe".to_string())
            .spawn(move || {
                let result = resolver.resolve_blocking(&path, &cancel, log.as_ref());
                let _ = tx.send(result);
            });

        match spawned {
            Ok(_) => DurationTask { rx, done: None },
            Err(e) => {
                tracing::warn!("could not start duration thread: {}", e);
                DurationTask::ready(DetectedDuration::unknown())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::log::{LogLevel, MemoryLog};
    use std::sync::Mutex;

    /// Scripted provider: returns `normal` on the first pass and `extended` on the retry
    struct Scripted {
        source: DurationSource,
        normal: Option<f64>,
        extended: Option<f64>,
        fail: bool,
        calls: Mutex<Vec<ScanDepth>>,
    }

    impl Scripted {
        fn new(source: DurationSource, normal: Option<f64>, extended: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                source,
                normal,
                extended,
                fail: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(source: DurationSource) -> Arc<Self> {
            Arc::new(Self {
                source,
                normal: None,
                extended: None,
                fail: true,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<ScanDepth> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn chain_of(providers: &[Arc<Scripted>]) -> DurationResolver {
        DurationResolver::new(
            providers
                .iter()
                .map(|p| p.clone() as Arc<dyn DurationProvider>)
                .collect(),
        )
    }

    impl DurationProvider for Scripted {
        fn source(&self) -> DurationSource {
            self.source
        }

        fn try_duration(&self, _path: &Path, depth: ScanDepth) -> Result<Option<f64>, ProbeError> {
            self.calls.lock().unwrap().push(depth);
            if self.fail {
                return Err(ProbeError::Io(std::io::Error::other("boom")));
            }
            Ok(match depth {
                ScanDepth::Normal => self.normal,
                ScanDepth::Extended => self.extended,
            })
        }
    }

    #[test]
    fn first_positive_result_wins() {
        let a = Scripted::new(DurationSource::MetadataStore, Some(0.0), None);
        let b = Scripted::new(DurationSource::MediaFramework, Some(42.0), None);
        let c = Scripted::new(DurationSource::ProbeTool, Some(99.0), None);
        let resolver = chain_of(&[a.clone(), b.clone(), c.clone()]);
        let log = MemoryLog::new();

        let found = resolver.resolve_blocking(Path::new("x.mp4"), &CancelToken::new(), &log);
        assert_eq!(found.seconds, Some(42.0));
        assert_eq!(found.source, DurationSource::MediaFramework);
        assert_eq!(a.calls(), vec![ScanDepth::Normal, ScanDepth::Extended]);
        assert_eq!(b.calls(), vec![ScanDepth::Normal]);
        assert!(c.calls().is_empty());
    }

    #[test]
    fn extended_scan_can_succeed() {
        let a = Scripted::new(DurationSource::MetadataStore, None, Some(7.5));
        let resolver = chain_of(&[a]);
        let found =
            resolver.resolve_blocking(Path::new("x.mp4"), &CancelToken::new(), &MemoryLog::new());
        assert_eq!(found.seconds, Some(7.5));
        assert_eq!(found.source, DurationSource::MetadataStore);
    }

    #[test]
    fn failures_are_logged_and_skipped() {
        let a = Scripted::failing(DurationSource::MetadataStore);
        let b = Scripted::new(DurationSource::ProbeTool, Some(3.0), None);
        let resolver = chain_of(&[a, b]);
        let log = MemoryLog::new();
        let found = resolver.resolve_blocking(Path::new("x"), &CancelToken::new(), &log);
        assert_eq!(found.source, DurationSource::ProbeTool);
        assert_eq!(log.count(LogLevel::Info), 2);
        assert!(log.entries()[0].message.contains("unavailable"));
    }

    #[test]
    fn nothing_found_is_unknown() {
        let resolver = chain_of(&[Scripted::new(
            DurationSource::MetadataStore,
            Some(f64::NAN),
            Some(-1.0),
        )]);
        let found = resolver.resolve_blocking(Path::new("x"), &CancelToken::new(), &MemoryLog::new());
        assert_eq!(found, DetectedDuration::unknown());
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let a = Scripted::new(DurationSource::MetadataStore, Some(1.0), None);
        let resolver = chain_of(&[a.clone()]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let task = resolver.resolve(Path::new("x"), &cancel, Arc::new(MemoryLog::new()));
        assert_eq!(task.wait(), DetectedDuration::unknown());
        assert!(a.calls().is_empty());
    }

    #[test]
    fn background_task_delivers_result() {
        let resolver = chain_of(&[Scripted::new(DurationSource::ProbeTool, Some(12.0), None)]);
        let mut task = resolver.resolve(Path::new("x"), &CancelToken::new(), Arc::new(MemoryLog::new()));
        let mut polled = None;
        for _ in 0..200 {
            polled = task.try_result();
            if polled.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(polled.map(|d| d.seconds), Some(Some(12.0)));
        assert_eq!(task.wait().source, DurationSource::ProbeTool);
    }
}
