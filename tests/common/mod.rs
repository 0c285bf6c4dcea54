#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use transq::engine::{Preset, QueueItem};

/// Write an executable shell script into `dir`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Listing branch shared by the fake ffmpeg scripts: reports NVENC H264 and libdav1d
pub const FAKE_LISTINGS: &str = r#"case "$2" in
  -encoders) echo " V....D libx264   libx264 H.264"; echo " V....D h264_nvenc NVIDIA NVENC H.264 encoder"; exit 0;;
  -decoders) echo " V....D libdav1d  dav1d AV1 decoder by VideoLAN"; exit 0;;
esac
for last; do :; done"#;

/// Fake ffmpeg that writes a small output file and exits 0
#[cfg(unix)]
pub fn fake_ffmpeg_ok(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg-ok",
        &format!(
            "{}\necho \"frame=    1 fps=0.0 q=0.0 size=0kB\" >&2\nprintf 'encoded' > \"$last\"\nexit 0",
            FAKE_LISTINGS
        ),
    )
}

/// Fake ffmpeg that leaves a partial output behind and fails
#[cfg(unix)]
pub fn fake_ffmpeg_fail(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg-fail",
        &format!(
            "{}\nprintf 'partial' > \"$last\"\necho \"Error while encoding stream #0:0\" >&2\nexit 1",
            FAKE_LISTINGS
        ),
    )
}

/// Fake ffmpeg that writes a partial output and then hangs in a child process
#[cfg(unix)]
pub fn fake_ffmpeg_slow(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg-slow",
        &format!("{}\nprintf 'partial' > \"$last\"\nsleep 30\nexit 0", FAKE_LISTINGS),
    )
}

/// A real (tiny) input file in `dir`
pub fn input_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"not really av1").unwrap();
    path
}

pub fn h264_preset() -> Preset {
    Preset::defaults().remove(0)
}

pub fn item_at(path: &str, preset: &Preset) -> QueueItem {
    QueueItem::new(PathBuf::from(path), preset)
}
