//! Duration from ffprobe's format section, the last resort.

use super::{DurationProvider, ScanDepth};
use crate::engine::core::types::DurationSource;
use crate::engine::probe::{ProbeError, run_tool};
use std::path::{Path, PathBuf};

/// Parse `ffprobe -of json -show_entries format=duration` output
pub fn parse_ffprobe_duration(json: &str) -> Result<Option<f64>, ProbeError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| ProbeError::Parse {
        tool: "ffprobe".to_string(),
        message: e.to_string(),
    })?;

    let duration = &value["format"]["duration"];
    Ok(duration
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .or_else(|| duration.as_f64()))
}

pub struct FfprobeDuration {
    binary: PathBuf,
}

impl FfprobeDuration {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl DurationProvider for FfprobeDuration {
    fn source(&self) -> DurationSource {
        DurationSource::ProbeTool
    }

    fn try_duration(&self, path: &Path, depth: ScanDepth) -> Result<Option<f64>, ProbeError> {
        let mut args = vec!["-v", "error"];
        if depth == ScanDepth::Extended {
            args.extend(["-probesize", "50M", "-analyzeduration", "50M"]);
        }
        args.extend(["-show_entries", "format=duration", "-of", "json"]);
        let json = run_tool(&self.binary, &args, path)?;
        parse_ffprobe_duration(&json)
    }
}
