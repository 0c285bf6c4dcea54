//! Queue items and their edit operations between runs

use crate::engine::cancel::CancelToken;
use crate::engine::core::log::{LogSink, LogSinkExt};
use crate::engine::core::preset::Preset;
use crate::engine::core::trim::TrimTime;
use crate::engine::core::types::{DurationSource, ItemStatus, ProbeInfo, QueueItem};
use crate::engine::duration::{DetectedDuration, DurationResolver};
use crate::engine::probe::probe_input_info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Ordered collection of queue items.
///
/// The caller mutates the queue between runs; a run borrows it mutably for its
/// whole duration, so no locking is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Queue {
    items: Vec<QueueItem>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [QueueItem] {
        &mut self.items
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.items.iter().any(|i| i.input_path == path)
    }

    /// Add a file with a snapshot of `preset`. Duplicate paths are ignored.
    pub fn add(&mut self, path: PathBuf, preset: &Preset) -> Option<Uuid> {
        if self.contains_path(&path) {
            tracing::debug!(path = %path.display(), "already queued");
            return None;
        }
        let item = QueueItem::new(path, preset);
        let id = item.id;
        self.items.push(item);
        Some(id)
    }

    pub fn add_many(&mut self, paths: impl IntoIterator<Item = PathBuf>, preset: &Preset) -> Vec<Uuid> {
        paths
            .into_iter()
            .filter_map(|p| self.add(p, preset))
            .collect()
    }

    /// Explicit removal; items are never dropped implicitly
    pub fn remove(&mut self, id: Uuid) -> Option<QueueItem> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Assign a fresh snapshot of `preset` to one item
    pub fn set_preset(&mut self, id: Uuid, preset: &Preset) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.preset = preset.snapshot();
                true
            }
            None => false,
        }
    }

    /// Each item receives its own snapshot
    pub fn apply_preset_to_all(&mut self, preset: &Preset) {
        for item in &mut self.items {
            item.preset = preset.snapshot();
        }
    }

    /// User trim edit; marks the trim as edited so detected durations no longer
    /// overwrite the end
    pub fn set_trim(&mut self, id: Uuid, enabled: bool, start: &str, end: &str) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.trim_enabled = enabled;
                item.trim_start = start.trim().to_string();
                item.trim_end = end.trim().to_string();
                item.trim_edited = true;
                true
            }
            None => false,
        }
    }

    /// Back to disabled, `00:00:00` to the known duration
    pub fn reset_trim(&mut self, id: Uuid) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.trim_enabled = false;
                let end = default_trim_end(item);
                item.trim_start = TrimTime::ZERO.to_string();
                item.trim_end = end;
                item.trim_edited = false;
                true
            }
            None => false,
        }
    }

    /// Record a detected duration; an untouched trim end follows it
    pub fn set_duration(&mut self, id: Uuid, detected: DetectedDuration) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.duration_s = detected.seconds;
                item.duration_source = detected.source;
                if !item.trim_edited {
                    let end = default_trim_end(item);
                    item.trim_end = end;
                }
                true
            }
            None => false,
        }
    }

    pub fn set_probe(&mut self, id: Uuid, probe: ProbeInfo) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                // probe duration fills in only when the chain found nothing
                if item.duration_s.is_none() && probe.duration_seconds > 0.0 {
                    item.duration_s = Some(probe.duration_seconds);
                    item.duration_source = DurationSource::ProbeTool;
                    if !item.trim_edited {
                        item.trim_end = TrimTime::from_secs_f64(probe.duration_seconds).to_string();
                    }
                }
                item.probe = Some(probe);
                true
            }
            None => false,
        }
    }

    pub fn set_output_folder(&mut self, id: Uuid, folder: Option<PathBuf>) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.output_folder = folder;
                true
            }
            None => false,
        }
    }

    pub fn set_render(&mut self, id: Uuid, render: bool) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.render = render;
                true
            }
            None => false,
        }
    }

    /// Ids of the items included in the next run, in queue order
    pub fn run_set(&self) -> Vec<Uuid> {
        self.items
            .iter()
            .filter(|i| i.render)
            .map(|i| i.id)
            .collect()
    }

    /// Reset run-scoped state of the included items before a new run
    pub fn prepare_run(&mut self) {
        for item in self.items.iter_mut().filter(|i| i.render) {
            item.status = ItemStatus::Queued;
            item.last_error = None;
        }
    }

    /// Detect duration and probe metadata for items that have none yet.
    ///
    /// The duration chain runs in the background while ffprobe reads stream
    /// metadata. Failures only leave the fields unset.
    pub fn analyze_sources(
        &mut self,
        resolver: &DurationResolver,
        ffprobe: &Path,
        cancel: &CancelToken,
        log: Arc<dyn LogSink>,
    ) {
        let pending: Vec<(Uuid, PathBuf)> = self
            .items
            .iter()
            .filter(|i| i.probe.is_none())
            .map(|i| (i.id, i.input_path.clone()))
            .collect();

        for (id, path) in pending {
            if cancel.is_cancelled() {
                break;
            }
            let task = resolver.resolve(&path, cancel, log.clone());
            let probe = probe_input_info(ffprobe, &path);

            let detected = task.wait();
            if detected.seconds.is_some() {
                self.set_duration(id, detected);
            }
            match probe {
                Ok(info) => {
                    self.set_probe(id, info);
                }
                Err(e) => log.warning(format!("Could not probe {}: {}", path.display(), e)),
            }
        }
    }
}

fn default_trim_end(item: &QueueItem) -> String {
    item.known_duration()
        .map(|d| TrimTime::from_secs_f64(d).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::preset::TargetCodec;

    fn preset() -> Preset {
        Preset::defaults().remove(0)
    }

    #[test]
    fn preset_snapshots_are_independent() {
        let mut live = preset();
        let mut queue = Queue::new();
        let a = queue.add(PathBuf::from("a.mkv"), &live).unwrap();
        let b = queue.add(PathBuf::from("b.mkv"), &live).unwrap();

        live.bitrate_kbps = 1234;
        live.target_codec = TargetCodec::H265;
        assert_eq!(queue.get(a).unwrap().preset.bitrate_kbps, 8000);

        queue.get_mut(a).unwrap().preset.bitrate_kbps = 999;
        assert_eq!(queue.get(b).unwrap().preset.bitrate_kbps, 8000);

        queue.apply_preset_to_all(&live);
        queue.get_mut(a).unwrap().preset.bitrate_kbps = 1;
        assert_eq!(queue.get(b).unwrap().preset.bitrate_kbps, 1234);
    }

    #[test]
    fn duplicates_ignored_and_removal_is_explicit() {
        let mut queue = Queue::new();
        let ids = queue.add_many(
            vec![PathBuf::from("a.mkv"), PathBuf::from("a.mkv"), PathBuf::from("b.mkv")],
            &preset(),
        );
        assert_eq!(ids.len(), 2);
        assert!(queue.remove(ids[0]).is_some());
        assert!(queue.remove(ids[0]).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn detected_duration_refreshes_untouched_trim_end() {
        let mut queue = Queue::new();
        let id = queue.add(PathBuf::from("a.mkv"), &preset()).unwrap();
        assert_eq!(queue.get(id).unwrap().trim_end, "");

        queue.set_duration(
            id,
            DetectedDuration {
                seconds: Some(75.5),
                source: DurationSource::MetadataStore,
            },
        );
        let item = queue.get(id).unwrap();
        assert_eq!(item.trim_end, "00:01:15.500");
        assert_eq!(item.duration_source, DurationSource::MetadataStore);

        queue.set_trim(id, true, "00:00:01", "00:00:02");
        queue.set_duration(
            id,
            DetectedDuration {
                seconds: Some(80.0),
                source: DurationSource::ProbeTool,
            },
        );
        assert_eq!(queue.get(id).unwrap().trim_end, "00:00:02");

        queue.reset_trim(id);
        let item = queue.get(id).unwrap();
        assert!(!item.trim_enabled);
        assert!(!item.trim_edited);
        assert_eq!(item.trim_start, "00:00:00");
        assert_eq!(item.trim_end, "00:01:20");
    }

    #[test]
    fn probe_fills_missing_duration() {
        let mut queue = Queue::new();
        let id = queue.add(PathBuf::from("a.mkv"), &preset()).unwrap();
        queue.set_probe(
            id,
            ProbeInfo {
                duration_seconds: 10.0,
                ..ProbeInfo::default()
            },
        );
        let item = queue.get(id).unwrap();
        assert_eq!(item.duration_s, Some(10.0));
        assert_eq!(item.duration_source, DurationSource::ProbeTool);
        assert_eq!(item.trim_end, "00:00:10");
    }

    #[test]
    fn run_set_and_prepare() {
        let mut queue = Queue::new();
        let a = queue.add(PathBuf::from("a.mkv"), &preset()).unwrap();
        let b = queue.add(PathBuf::from("b.mkv"), &preset()).unwrap();
        queue.set_render(b, false);
        assert_eq!(queue.run_set(), vec![a]);

        queue.get_mut(a).unwrap().status = ItemStatus::Failed;
        queue.get_mut(b).unwrap().status = ItemStatus::Done;
        queue.prepare_run();
        assert_eq!(queue.get(a).unwrap().status, ItemStatus::Queued);
        assert_eq!(queue.get(b).unwrap().status, ItemStatus::Done);
    }

    #[test]
    fn cancelled_analysis_probes_nothing() {
        use crate::engine::core::log::{LogLevel, MemoryLog};

        let mut queue = Queue::new();
        let id = queue.add(PathBuf::from("/nope/a.mkv"), &preset()).unwrap();
        let memory = MemoryLog::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let resolver = DurationResolver::standard("/nope/mediainfo", "/nope/ffprobe");
        queue.analyze_sources(&resolver, Path::new("/nope/ffprobe"), &cancel, Arc::new(memory.clone()));

        assert!(queue.get(id).unwrap().probe.is_none());
        assert_eq!(memory.count(LogLevel::Warning), 0);
    }
}
