// Sequential run queue driving one ffmpeg process at a time

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use uuid::Uuid;

use super::cancel::CancelToken;
use super::core::ffmpeg_cmd::{BuildOptions, RunWarnings, build_ffmpeg_cmd};
use super::core::log::{LogSink, LogSinkExt};
use super::core::output::{DEFAULT_FILENAME_PATTERN, derive_output_path};
use super::core::preset::EncoderPriority;
use super::core::types::{ItemStatus, QueueItem};
use super::hardware::{CapabilityProbe, EncoderCapabilities};
use super::queue::Queue;
use super::runner::{ProcessRunner, RunOutcome};
use super::validate::{ValidationError, same_file, validate_item, validate_output};

/// Run-level settings handed in by the caller; never persisted by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub ffmpeg_path: PathBuf,
    /// `None` renders next to each source
    pub output_folder: Option<PathBuf>,
    /// Overrides every preset's encoder priority when set
    pub encoder_priority: Option<EncoderPriority>,
    /// 1 = fastest, 9 = best quality
    pub speed_quality: u8,
    pub uncheck_after_render: bool,
    pub only_av1_sources: bool,
    pub filename_pattern: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            output_folder: None,
            encoder_priority: None,
            speed_quality: 5,
            uncheck_after_render: false,
            only_av1_sources: true,
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
        }
    }
}

impl RunSettings {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            priority: self.encoder_priority,
            speed_quality: self.speed_quality.clamp(1, 9),
        }
    }

    pub fn output_path_for(&self, item: &QueueItem) -> PathBuf {
        derive_output_path(item, self.output_folder.as_deref(), &self.filename_pattern)
    }
}

/// Message from the orchestrator to whoever displays the run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    ItemStarted { id: Uuid },
    ItemFinished { id: Uuid, status: ItemStatus },
    /// An item failed; the log view should be shown
    SurfaceLog { id: Uuid },
    /// Removed from future runs after a verified render
    Deselected { id: Uuid },
    RunFinished(RunSummary),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub canceled: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Done => self.done += 1,
            ItemStatus::Failed => self.failed += 1,
            ItemStatus::Canceled => self.canceled += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Queued | ItemStatus::Running => {}
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.canceled == 0
    }
}

/// True only for an existing, non-empty file
fn output_is_valid(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Drains the run set one item at a time
pub struct QueueOrchestrator {
    settings: RunSettings,
    capabilities: Arc<CapabilityProbe>,
    runner: ProcessRunner,
    log: Arc<dyn LogSink>,
    events: Option<Sender<RunEvent>>,
}

impl QueueOrchestrator {
    pub fn new(settings: RunSettings, log: Arc<dyn LogSink>) -> Self {
        Self {
            settings,
            capabilities: Arc::new(CapabilityProbe::new()),
            runner: ProcessRunner::new(),
            log,
            events: None,
        }
    }

    /// Share a capability cache across orchestrators
    pub fn with_capability_probe(mut self, probe: Arc<CapabilityProbe>) -> Self {
        self.capabilities = probe;
        self
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_events(mut self, tx: Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Reject invalid items before anything starts. Rejected items are marked
    /// Skipped with the reason kept in `last_error`; the rest of the run proceeds.
    pub fn validate(&self, queue: &mut Queue) -> Vec<ValidationError> {
        let mut rejected = Vec::new();
        for item in queue.items_mut().iter_mut().filter(|i| i.render) {
            let mut errors = validate_item(item).err().unwrap_or_default();
            let output_path = self.settings.output_path_for(item);
            if let Err(e) = validate_output(item, &output_path) {
                errors.push(e);
            }
            if !errors.is_empty() {
                let reason = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                self.log
                    .error(format!("{}: {}", item.file_name(), reason));
                item.status = ItemStatus::Skipped;
                item.last_error = Some(reason);
                rejected.extend(errors);
            }
        }
        rejected
    }

    /// Execute every selected item in queue order.
    ///
    /// Once `cancel` is set no further item starts, the running process tree is
    /// killed and the remaining items are marked Canceled.
    pub fn run(&self, queue: &mut Queue, cancel: &CancelToken) -> RunSummary {
        queue.prepare_run();
        self.validate(queue);

        let run_set = queue.run_set();
        let mut summary = RunSummary {
            total: run_set.len(),
            ..RunSummary::default()
        };

        let caps = self
            .capabilities
            .probe(&self.settings.ffmpeg_path, self.log.as_ref());
        let options = self.settings.build_options();
        let mut warnings = RunWarnings::new();

        self.log.info(format!("Starting run: {} item(s)", run_set.len()));

        for id in run_set {
            let Some(item) = queue.get_mut(id) else {
                continue;
            };

            if item.status == ItemStatus::Queued {
                self.process_item(item, &caps, options, &mut warnings, cancel);
            }

            summary.record(item.status);
            self.emit(RunEvent::ItemFinished {
                id,
                status: item.status,
            });
        }

        self.log.info(format!(
            "Run finished: {} done, {} failed, {} canceled, {} skipped",
            summary.done, summary.failed, summary.canceled, summary.skipped
        ));
        self.emit(RunEvent::RunFinished(summary));
        summary
    }

    fn process_item(
        &self,
        item: &mut QueueItem,
        caps: &EncoderCapabilities,
        options: BuildOptions,
        warnings: &mut RunWarnings,
        cancel: &CancelToken,
    ) {
        let name = item.file_name();

        if cancel.is_cancelled() {
            item.status = ItemStatus::Canceled;
            self.log.info(format!("Canceled before start: {}", name));
            return;
        }

        if self.settings.only_av1_sources {
            if let Some(probe) = item.probe.as_ref().filter(|p| !p.is_av1()) {
                item.status = ItemStatus::Skipped;
                self.log.info(format!(
                    "Skipping {}: source codec is {}, not AV1",
                    name,
                    probe.video_codec.as_deref().unwrap_or("unknown")
                ));
                return;
            }
        }

        let output_path = self.settings.output_path_for(item);
        if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                self.fail(
                    item,
                    format!("could not create output folder {}: {}", dir.display(), e),
                );
                return;
            }
        }

        let built = build_ffmpeg_cmd(
            &self.settings.ffmpeg_path,
            item,
            &output_path,
            caps,
            options,
            warnings,
            self.log.as_ref(),
        );
        item.last_command_line = Some(built.display.clone());
        item.status = ItemStatus::Running;
        self.emit(RunEvent::ItemStarted { id: item.id });
        self.log.info(format!(
            "Rendering {} -> {} ({})",
            name,
            output_path.display(),
            built.encoder
        ));

        match self.runner.run_built(&built, cancel, self.log.clone()) {
            Ok(outcome) => self.finish(item, &output_path, outcome),
            Err(e) => self.fail(item, e.to_string()),
        }
    }

    fn finish(&self, item: &mut QueueItem, output_path: &Path, outcome: RunOutcome) {
        let name = item.file_name();

        if outcome.success {
            item.status = ItemStatus::Done;
            self.log.info(format!("Done: {}", name));
            if self.settings.uncheck_after_render {
                if output_is_valid(output_path) {
                    item.render = false;
                    self.emit(RunEvent::Deselected { id: item.id });
                } else {
                    self.log.warning(format!(
                        "{} reported success but {} is missing or empty; keeping it selected",
                        name,
                        output_path.display()
                    ));
                }
            }
            return;
        }

        if outcome.cancelled {
            item.status = ItemStatus::Canceled;
            if output_path.exists() {
                self.log.warning(format!(
                    "Canceled: {} (partial output kept at {})",
                    name,
                    output_path.display()
                ));
            } else {
                self.log.warning(format!("Canceled: {}", name));
            }
            return;
        }

        let reason = match (outcome.exit_code, outcome.last_stderr_line()) {
            (Some(code), Some(line)) => format!("exit code {}: {}", code, line),
            (Some(code), None) => format!("exit code {}", code),
            (None, Some(line)) => format!("terminated by signal: {}", line),
            (None, None) => "terminated by signal".to_string(),
        };
        if output_path.exists() && !same_file(output_path, &item.input_path) {
            match fs::remove_file(output_path) {
                Ok(()) => tracing::debug!(path = %output_path.display(), "removed partial output"),
                Err(e) => tracing::warn!("could not remove partial output {}: {}", output_path.display(), e),
            }
        }
        self.fail(item, reason);
        // full stderr is the diagnostic
        if !outcome.stderr.trim().is_empty() {
            item.last_error = Some(outcome.stderr);
        }
    }

    fn fail(&self, item: &mut QueueItem, reason: String) {
        self.log
            .error(format!("Failed: {} ({})", item.file_name(), reason));
        item.status = ItemStatus::Failed;
        item.last_error = Some(reason);
        self.emit(RunEvent::SurfaceLog { id: item.id });
    }
}
