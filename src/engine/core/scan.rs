use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source extensions picked up when a directory is queued
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "m4v", "avi", "ts", "ivf"];

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Walk `root` recursively and invoke `on_file` for each video file
pub fn scan_streaming<F>(root: &Path, mut on_file: F) -> Result<()>
where
    F: FnMut(PathBuf),
{
    // symlinks are not followed so a link back up the tree cannot loop
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && is_video_file(path) {
            on_file(path.to_path_buf());
        }
    }

    Ok(())
}

/// Scan a directory recursively for video files
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    scan_streaming(root, |path| files.push(path))?;
    Ok(files)
}

/// Expand command-line inputs into queueable files.
///
/// Files are taken as given regardless of extension; directories are scanned.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = scan(path).with_context(|| format!("scanning {}", path.display()))?;
            tracing::debug!(dir = %path.display(), count = found.len(), "scanned directory");
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(files)
}
