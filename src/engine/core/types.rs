use super::preset::Preset;
use super::trim::{TrimRangeError, TrimTime, check_trim};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemStatus {
    Queued,
    Running,
    Done,
    Failed,
    Canceled,
    Skipped,
}

impl ItemStatus {
    /// True once the item has left the run loop for this run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

/// Which provider produced a detected duration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DurationSource {
    #[default]
    Unknown,
    MetadataStore,
    MediaFramework,
    ProbeTool,
}

impl fmt::Display for DurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::MetadataStore => "MetadataStore",
            Self::MediaFramework => "MediaFramework",
            Self::ProbeTool => "ProbeTool",
        };
        f.write_str(s)
    }
}

/// Source metadata reported by the probe tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    pub duration_seconds: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: Option<u32>,
    pub audio_bitrate_kbps: Option<u32>,
    pub overall_bitrate_kbps: Option<u32>,
    /// ffprobe `codec_name` of the first video stream
    #[serde(default)]
    pub video_codec: Option<String>,
}

impl ProbeInfo {
    /// Unknown codec counts as AV1 so that a failed probe never skips an item
    pub fn is_av1(&self) -> bool {
        self.video_codec
            .as_deref()
            .map(|c| c.eq_ignore_ascii_case("av1"))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub input_path: PathBuf,

    /// Included in the next run
    pub render: bool,

    /// Owned copy of the preset at assignment time
    pub preset: Preset,

    pub trim_enabled: bool,
    pub trim_start: String,
    pub trim_end: String,
    #[serde(default)]
    pub trim_edited: bool,

    pub duration_s: Option<f64>,
    #[serde(default)]
    pub duration_source: DurationSource,

    pub status: ItemStatus,
    pub probe: Option<ProbeInfo>,
    pub output_folder: Option<PathBuf>,

    /// Display form of the last executed command (diagnostics only)
    pub last_command_line: Option<String>,
    pub last_error: Option<String>,
}

impl QueueItem {
    /// New queued item with trim disabled
    pub fn new(input_path: PathBuf, preset: &Preset) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_path,
            render: true,
            preset: preset.snapshot(),
            trim_enabled: false,
            trim_start: TrimTime::ZERO.to_string(),
            trim_end: String::new(),
            trim_edited: false,
            duration_s: None,
            duration_source: DurationSource::Unknown,
            status: ItemStatus::Queued,
            probe: None,
            output_folder: None,
            last_command_line: None,
            last_error: None,
        }
    }

    /// Duration known to the item: detected value, else the probe's
    pub fn known_duration(&self) -> Option<f64> {
        self.duration_s.filter(|d| *d > 0.0).or_else(|| {
            self.probe
                .as_ref()
                .map(|p| p.duration_seconds)
                .filter(|d| *d > 0.0)
        })
    }

    /// Parsed trim window, `None` when trim is disabled
    pub fn trim_window(&self) -> Result<Option<(TrimTime, TrimTime)>, TrimRangeError> {
        check_trim(
            self.trim_enabled,
            &self.trim_start,
            &self.trim_end,
            self.known_duration(),
        )
    }

    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_defaults() {
        let preset = Preset::defaults().remove(0);
        let item = QueueItem::new(PathBuf::from("/v/a.mkv"), &preset);
        assert_eq!(item.status, ItemStatus::Queued);
        assert!(item.render);
        assert!(!item.trim_enabled);
        assert_eq!(item.trim_start, "00:00:00");
        assert_eq!(item.preset, preset);
        assert_eq!(item.file_name(), "a.mkv");
        assert_eq!(item.trim_window(), Ok(None));
    }

    #[test]
    fn known_duration_falls_back_to_probe() {
        let mut item = QueueItem::new(PathBuf::from("a.mkv"), &Preset::default());
        assert_eq!(item.known_duration(), None);
        item.probe = Some(ProbeInfo {
            duration_seconds: 12.5,
            ..ProbeInfo::default()
        });
        assert_eq!(item.known_duration(), Some(12.5));
        item.duration_s = Some(13.0);
        assert_eq!(item.known_duration(), Some(13.0));
    }

    #[test]
    fn unknown_codec_is_treated_as_av1() {
        let mut info = ProbeInfo::default();
        assert!(info.is_av1());
        info.video_codec = Some("AV1".to_string());
        assert!(info.is_av1());
        info.video_codec = Some("h264".to_string());
        assert!(!info.is_av1());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ItemStatus::Queued.is_terminal());
        assert!(!ItemStatus::Running.is_terminal());
        assert!(ItemStatus::Done.is_terminal());
        assert!(ItemStatus::Skipped.is_terminal());
    }
}
