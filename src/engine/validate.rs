//! Pre-run validation: items that cannot produce a sensible command are rejected
//! before the run starts, never mid-run.

use crate::engine::core::bitrate::compute_bitrate;
use crate::engine::core::preset::BitrateMode;
use crate::engine::core::types::QueueItem;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Error)]
#[error("{file}: {message} ({field})")]
pub struct ValidationError {
    pub item_id: Uuid,
    pub file: String,
    pub field: String,
    pub message: String,
}

fn err(item: &QueueItem, field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        item_id: item.id,
        file: item.file_name(),
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate one item against its preset, trim window and source metadata
pub fn validate_item(item: &QueueItem) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if item.preset.name.trim().is_empty() {
        errors.push(err(item, "preset", "no preset selected"));
    }

    if !item.input_path.is_file() {
        errors.push(err(item, "input_path", "input file not found"));
    }

    let bitrate = compute_bitrate(&item.preset, item.probe.as_ref());
    if !bitrate.is_resolved() {
        let message = match item.preset.bitrate_mode {
            BitrateMode::FixedKbps => "bitrate must be greater than 0",
            BitrateMode::MultiplierFromSource | BitrateMode::AutoMatch => {
                "could not determine source bitrate or resolution"
            }
        };
        errors.push(err(item, "bitrate", message));
    }

    if let Err(e) = item.trim_window() {
        errors.push(err(item, "trim", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Reject an output path that resolves to the item's own source file
pub fn validate_output(item: &QueueItem, output_path: &Path) -> Result<(), ValidationError> {
    if same_file(&item.input_path, output_path) {
        Err(err(item, "output_path", "output path is the same as the input file"))
    } else {
        Ok(())
    }
}

/// Canonical form of `path`; falls back to the canonical parent when the
/// file itself does not exist yet
fn resolved(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Whether two paths name the same file
pub fn same_file(a: &Path, b: &Path) -> bool {
    a == b || resolved(a) == resolved(b)
}

/// Validate every item marked for rendering, collecting all problems
pub fn validate_run(items: &[QueueItem]) -> Vec<ValidationError> {
    items
        .iter()
        .filter(|item| item.render)
        .filter_map(|item| validate_item(item).err())
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::preset::Preset;
    use crate::engine::core::types::ProbeInfo;
    use std::path::PathBuf;

    fn on_disk_item(preset: Preset) -> (tempfile::TempDir, QueueItem) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("in.mkv");
        std::fs::write(&path, b"x").unwrap();
        let item = QueueItem::new(path, &preset);
        (dir, item)
    }

    fn named(preset: Preset) -> Preset {
        Preset {
            name: "test".to_string(),
            ..preset
        }
    }

    #[test]
    fn valid_fixed_item_passes() {
        let (_dir, item) = on_disk_item(named(Preset::default()));
        assert_eq!(validate_item(&item), Ok(()));
    }

    #[test]
    fn zero_bitrate_rejected() {
        let (_dir, item) = on_disk_item(named(Preset {
            bitrate_kbps: 0,
            ..Preset::default()
        }));
        let errors = validate_item(&item).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "bitrate");
    }

    #[test]
    fn multiplier_without_metadata_rejected() {
        let (_dir, mut item) = on_disk_item(named(Preset {
            bitrate_mode: BitrateMode::MultiplierFromSource,
            ..Preset::default()
        }));
        assert!(validate_item(&item).is_err());
        item.probe = Some(ProbeInfo {
            width: 1280,
            height: 720,
            ..ProbeInfo::default()
        });
        assert_eq!(validate_item(&item), Ok(()));
    }

    #[test]
    fn bad_trim_rejected() {
        let (_dir, mut item) = on_disk_item(named(Preset::default()));
        item.trim_enabled = true;
        item.trim_start = "00:00:10".to_string();
        item.trim_end = "00:00:05".to_string();
        let errors = validate_item(&item).unwrap_err();
        assert_eq!(errors[0].field, "trim");
        assert!(errors[0].message.contains("before"));
    }

    #[test]
    fn output_over_source_rejected() {
        let (dir, item) = on_disk_item(named(Preset::default()));
        let error = validate_output(&item, &dir.path().join("in.mkv")).unwrap_err();
        assert_eq!(error.field, "output_path");

        // same file reached through a `..` detour
        let detour = dir.path().join("sub");
        std::fs::create_dir(&detour).unwrap();
        assert!(validate_output(&item, &detour.join("..").join("in.mkv")).is_err());

        assert_eq!(validate_output(&item, &dir.path().join("in_h264.mp4")), Ok(()));
    }

    #[test]
    fn run_validation_skips_unchecked_items() {
        let mut missing = QueueItem::new(PathBuf::from("/nope/a.mkv"), &Preset::default());
        let errors = validate_run(std::slice::from_ref(&missing));
        // missing file and missing preset name
        assert_eq!(errors.len(), 2);
        missing.render = false;
        assert!(validate_run(&[missing]).is_empty());
    }
}
