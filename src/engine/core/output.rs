use super::bitrate::{compute_bitrate, estimated_size_kb};
use super::preset::TargetCodec;
use super::types::QueueItem;
use std::path::{Path, PathBuf};

pub const OUTPUT_EXTENSION: &str = "mp4";
pub const DEFAULT_FILENAME_PATTERN: &str = "{basename}_{codec}";

/// Expand a filename pattern for one input.
///
/// Supports `{basename}` (stem), `{filename}` (full name) and `{codec}`
/// (`h264`/`h265`). Path separators produced by the pattern are replaced so the
/// output always lands in the chosen folder.
pub fn output_file_name(input_path: &Path, codec: TargetCodec, pattern: &str) -> String {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let original_filename = input_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let pattern = if pattern.trim().is_empty() {
        DEFAULT_FILENAME_PATTERN
    } else {
        pattern
    };

    let name = pattern
        .replace("{basename}", &stem)
        .replace("{filename}", &original_filename)
        .replace("{codec}", codec.file_tag())
        .replace(['/', '\\'], "_");

    format!("{}.{}", name, OUTPUT_EXTENSION)
}

/// Folder an item renders into: item override, else the run folder, else the
/// source file's folder
pub fn output_folder(item: &QueueItem, run_folder: Option<&Path>) -> PathBuf {
    if let Some(folder) = item.output_folder.as_deref() {
        return folder.to_path_buf();
    }
    if let Some(folder) = run_folder {
        return folder.to_path_buf();
    }
    item.input_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

pub fn derive_output_path(item: &QueueItem, run_folder: Option<&Path>, pattern: &str) -> PathBuf {
    output_folder(item, run_folder).join(output_file_name(
        &item.input_path,
        item.preset.target_codec,
        pattern,
    ))
}

/// Estimated output size using the trimmed length when a trim window applies
pub fn estimated_item_size_kb(item: &QueueItem) -> Option<u64> {
    let duration = match item.trim_window() {
        Ok(Some((start, end))) => end.as_secs_f64() - start.as_secs_f64(),
        _ => item.known_duration()?,
    };
    let kbps = compute_bitrate(&item.preset, item.probe.as_ref()).target_kbps;
    estimated_size_kb(duration, kbps)
}
