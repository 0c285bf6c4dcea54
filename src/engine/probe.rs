// Input probing using ffprobe

use crate::engine::core::types::ProbeInfo;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("could not parse {tool} output: {message}")]
    Parse { tool: String, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Run a metadata tool and return its stdout, mapping launch and exit failures
pub(crate) fn run_tool(tool: &Path, args: &[&str], input: &Path) -> Result<String, ProbeError> {
    let name = tool.display().to_string();
    let output = Command::new(tool)
        .args(args)
        .arg(input)
        .output()
        .map_err(|source| ProbeError::Launch {
            tool: name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            tool: name,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// ffprobe reports bits per second as a decimal string
fn bps_to_kbps(value: Option<&str>) -> Option<u32> {
    let bps: f64 = value?.trim().parse().ok()?;
    let kbps = (bps / 1000.0).round();
    (kbps > 0.0 && kbps <= u32::MAX as f64).then_some(kbps as u32)
}

/// Parse a fraction string like "30000/1001" to f64
pub fn parse_fraction(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let numerator: f64 = num.trim().parse().ok()?;
    let denominator: f64 = den.trim().parse().ok()?;

    if denominator == 0.0 {
        return None;
    }

    Some(numerator / denominator)
}

/// Turn `ffprobe -print_format json -show_format -show_streams` output into [`ProbeInfo`]
pub fn parse_ffprobe_json(json: &str) -> Result<ProbeInfo, ProbeError> {
    let parsed: FfprobeOutput = serde_json::from_str(json).map_err(|e| ProbeError::Parse {
        tool: "ffprobe".to_string(),
        message: e.to_string(),
    })?;

    let mut info = ProbeInfo {
        duration_seconds: parsed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0),
        overall_bitrate_kbps: bps_to_kbps(parsed.format.bit_rate.as_deref()),
        ..ProbeInfo::default()
    };

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    if let Some(v) = video {
        info.width = v.width.unwrap_or(0);
        info.height = v.height.unwrap_or(0);
        // r_frame_rate is the container's nominal rate; "0/0" means unknown
        info.fps = v
            .r_frame_rate
            .as_deref()
            .and_then(parse_fraction)
            .filter(|f| *f > 0.0)
            .or_else(|| v.avg_frame_rate.as_deref().and_then(parse_fraction))
            .unwrap_or(0.0);
        info.video_bitrate_kbps = bps_to_kbps(v.bit_rate.as_deref());
        info.video_codec = v.codec_name.clone();
    }

    info.audio_bitrate_kbps = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|a| bps_to_kbps(a.bit_rate.as_deref()));

    Ok(info)
}

/// Probe input file using ffprobe to get video metadata
pub fn probe_input_info(ffprobe: &Path, input_path: &Path) -> Result<ProbeInfo, ProbeError> {
    let json = run_tool(
        ffprobe,
        &["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"],
        input_path,
    )?;
    parse_ffprobe_json(&json)
}

/// First line of `<tool> -version`
pub fn tool_version(tool: &Path) -> Result<String, ProbeError> {
    let name = tool.display().to_string();
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .map_err(|source| ProbeError::Launch {
            tool: name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            tool: name,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
}

/// `ffprobe` next to a configured `ffmpeg`, else the bare name
pub fn sibling_ffprobe(ffmpeg: &Path) -> std::path::PathBuf {
    let exe = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    match ffmpeg.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(exe),
        _ => std::path::PathBuf::from(exe),
    }
}
