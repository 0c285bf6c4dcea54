use super::log::LogEntry;
use super::preset::Preset;
use super::types::{DurationSource, ItemStatus, QueueItem};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One queue item as written to the JSON export
#[derive(Debug, Serialize)]
pub struct ItemExport<'a> {
    pub id: Uuid,
    pub input_path: &'a Path,
    pub render: bool,
    pub preset: &'a str,
    pub status: ItemStatus,
    pub duration_s: Option<f64>,
    pub duration_source: DurationSource,
    pub trim_enabled: bool,
    pub trim_start: &'a str,
    pub trim_end: &'a str,
    pub output_folder: Option<&'a Path>,
    pub last_command_line: Option<&'a str>,
    pub last_error: Option<&'a str>,
}

impl<'a> From<&'a QueueItem> for ItemExport<'a> {
    fn from(item: &'a QueueItem) -> Self {
        Self {
            id: item.id,
            input_path: &item.input_path,
            render: item.render,
            preset: &item.preset.name,
            status: item.status,
            duration_s: item.duration_s,
            duration_source: item.duration_source,
            trim_enabled: item.trim_enabled,
            trim_start: &item.trim_start,
            trim_end: &item.trim_end,
            output_folder: item.output_folder.as_deref(),
            last_command_line: item.last_command_line.as_deref(),
            last_error: item.last_error.as_deref(),
        }
    }
}

pub fn export_items_json(items: &[QueueItem]) -> Result<String> {
    let export: Vec<ItemExport<'_>> = items.iter().map(ItemExport::from).collect();
    serde_json::to_string_pretty(&export).context("Failed to serialize queue items")
}

/// Plain-text report for bug reports: binary path, presets, then every log line
pub fn diagnostics_report(ffmpeg_path: &Path, presets: &[Preset], entries: &[LogEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "transq {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "ffmpeg: {}", ffmpeg_path.display());
    let _ = writeln!(out);

    let _ = writeln!(out, "Presets ({}):", presets.len());
    for preset in presets {
        let _ = writeln!(
            out,
            "  {} [{}] {} audio={:?} pix_fmt={} priority={}{}",
            preset.name,
            preset.target_codec,
            preset.bitrate_label(),
            preset.audio_mode,
            preset.pixel_format,
            preset.encoder_priority.label(),
            if preset.built_in { " (built-in)" } else { "" }
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Log ({} lines):", entries.len());
    for entry in entries {
        let _ = writeln!(out, "{}", entry.format_line());
    }
    out
}

/// Write the report and the JSON item export side by side in `dir`.
/// Returns the two paths written.
pub fn write_diagnostics(
    dir: &Path,
    ffmpeg_path: &Path,
    presets: &[Preset],
    entries: &[LogEntry],
    items: &[QueueItem],
) -> Result<(PathBuf, PathBuf)> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let report_path = dir.join(format!("transq_diagnostics_{}.txt", stamp));
    let json_path = dir.join(format!("transq_queue_{}.json", stamp));

    let mut report = File::create(&report_path)
        .with_context(|| format!("Failed to create {}", report_path.display()))?;
    report
        .write_all(diagnostics_report(ffmpeg_path, presets, entries).as_bytes())
        .context("Failed to write diagnostics report")?;

    let mut json = File::create(&json_path)
        .with_context(|| format!("Failed to create {}", json_path.display()))?;
    json.write_all(export_items_json(items)?.as_bytes())
        .context("Failed to write queue export")?;

    Ok((report_path, json_path))
}
