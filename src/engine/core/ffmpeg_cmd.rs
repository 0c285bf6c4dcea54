use super::bitrate::resolve_bitrate;
use super::log::{LogSink, LogSinkExt};
use super::preset::{AudioMode, EncoderPriority};
use super::trim::is_full_range;
use super::types::QueueItem;
use crate::engine::hardware::{
    DAV1D_DECODER, EncoderCapabilities, VideoEncoder, select_encoder,
};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Warnings that are reported at most once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnceWarning {
    MissingDav1d,
}

/// Per-run record of which one-time warnings were already logged
#[derive(Debug, Default)]
pub struct RunWarnings {
    warned: HashSet<OnceWarning>,
}

impl RunWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a warning is seen in this run
    pub fn first(&mut self, warning: OnceWarning) -> bool {
        self.warned.insert(warning)
    }

    pub fn contains(&self, warning: OnceWarning) -> bool {
        self.warned.contains(&warning)
    }
}

/// Run-level inputs to the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Overrides the preset's priority when set
    pub priority: Option<EncoderPriority>,
    /// 1 = fastest, 9 = best quality
    pub speed_quality: u8,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            priority: None,
            speed_quality: 5,
        }
    }
}

/// A fully composed ffmpeg invocation
#[derive(Debug, Clone)]
pub struct BuiltCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Human readable, quoted form. Never passed to a shell.
    pub display: String,
    pub encoder: VideoEncoder,
    /// 0 when no bitrate arguments were emitted
    pub bitrate_kbps: u32,
    pub output_path: PathBuf,
}

impl BuiltCommand {
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Arguments as lossy strings, handy for assertions and diagnostics
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }
}

/// Quote an argument for display.
///
/// Empty values become `""`; values containing whitespace, a backslash or a double
/// quote are wrapped in quotes with inner quotes escaped.
pub fn escape_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }
    if arg.chars().any(|c| c.is_whitespace() || c == '\\' || c == '"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

pub fn format_command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|a| escape_arg(&a.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a preset's extra arguments shell-style, quoted words kept together
pub fn split_extra_args(extra: &str) -> Vec<String> {
    if extra.trim().is_empty() {
        return Vec::new();
    }
    shlex::split(extra).unwrap_or_else(|| {
        // unbalanced quotes: plain whitespace split
        extra.split_whitespace().map(str::to_string).collect()
    })
}

#[derive(Default)]
struct ArgList(Vec<OsString>);

impl ArgList {
    fn push(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.0.push(arg.as_ref().to_os_string());
        self
    }

    fn pair(&mut self, flag: &str, value: impl AsRef<OsStr>) -> &mut Self {
        self.push(flag).push(value)
    }
}

/// Compose the ffmpeg argument vector for one item.
///
/// Order: global flags, forced decoder, input, trim window, encoder, bitrate,
/// speed/quality, pixel format, audio, extra arguments, output.
pub fn build_ffmpeg_cmd(
    ffmpeg: &Path,
    item: &QueueItem,
    output_path: &Path,
    caps: &EncoderCapabilities,
    options: BuildOptions,
    warnings: &mut RunWarnings,
    log: &dyn LogSink,
) -> BuiltCommand {
    let preset = &item.preset;
    let mut args = ArgList::default();

    args.push("-hide_banner").push("-y");

    if preset.force_dav1d {
        if caps.dav1d_decoder {
            args.pair("-c:v", DAV1D_DECODER);
        } else if warnings.first(OnceWarning::MissingDav1d) {
            log.warning("libdav1d decoder not available in this ffmpeg build; using the default AV1 decoder");
        }
    }

    args.pair("-i", &item.input_path);

    match item.trim_window() {
        Ok(Some((start, end))) if !is_full_range(start, end, item.known_duration()) => {
            args.pair("-ss", start.to_string()).pair("-to", end.to_string());
        }
        Ok(_) => {}
        Err(e) => log.warning(format!(
            "Ignoring trim for {}: {}",
            item.file_name(),
            e
        )),
    }

    let priority = options.priority.unwrap_or(preset.encoder_priority);
    let encoder = select_encoder(preset.target_codec, priority, caps, log);
    args.pair("-c:v", encoder.ffmpeg_name());

    let kbps = resolve_bitrate(preset, item.probe.as_ref(), log);
    if kbps > 0 {
        args.pair("-b:v", format!("{}k", kbps))
            .pair("-maxrate", format!("{}k", kbps))
            .pair("-bufsize", format!("{}k", u64::from(kbps) * 2));
    }

    let [speed_flag, speed_value] = encoder.speed_args(options.speed_quality);
    args.pair(speed_flag, speed_value);

    let pix_fmt = preset.pixel_format.trim();
    if !pix_fmt.is_empty() {
        args.pair("-pix_fmt", pix_fmt);
    }

    match preset.audio_mode {
        AudioMode::Copy => {
            args.pair("-c:a", "copy");
        }
        AudioMode::Aac192 => {
            args.pair("-c:a", "aac").pair("-b:a", "192k");
        }
    }

    for extra in split_extra_args(&preset.extra_args) {
        args.push(extra);
    }

    args.push(output_path);

    let display = format_command_line(ffmpeg, &args.0);
    BuiltCommand {
        program: ffmpeg.to_path_buf(),
        args: args.0,
        display,
        encoder,
        bitrate_kbps: kbps,
        output_path: output_path.to_path_buf(),
    }
}
