//! Duration from MediaInfo's General track.

use super::{DurationProvider, ScanDepth};
use crate::engine::core::types::DurationSource;
use crate::engine::probe::{ProbeError, run_tool};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct MediaInfoResponse {
    media: Option<MediaInfoMedia>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoMedia {
    #[serde(default)]
    track: Vec<MediaInfoTrack>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoTrack {
    #[serde(rename = "@type")]
    track_type: String,
    #[serde(rename = "Duration")]
    duration: Option<String>,
}

/// Seconds from `mediainfo --Output=JSON`; the General track's `Duration` is in seconds
pub fn parse_mediainfo_duration(json: &str) -> Result<Option<f64>, ProbeError> {
    let response: MediaInfoResponse =
        serde_json::from_str(json).map_err(|e| ProbeError::Parse {
            tool: "mediainfo".to_string(),
            message: e.to_string(),
        })?;

    Ok(response
        .media
        .into_iter()
        .flat_map(|m| m.track)
        .find(|t| t.track_type == "General")
        .and_then(|t| t.duration)
        .and_then(|d| d.trim().parse::<f64>().ok()))
}

pub struct MediaInfoDuration {
    binary: PathBuf,
}

impl MediaInfoDuration {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl DurationProvider for MediaInfoDuration {
    fn source(&self) -> DurationSource {
        DurationSource::MediaFramework
    }

    fn try_duration(&self, path: &Path, depth: ScanDepth) -> Result<Option<f64>, ProbeError> {
        let args: &[&str] = match depth {
            ScanDepth::Normal => &["--Output=JSON"],
            ScanDepth::Extended => &["--Output=JSON", "--ParseSpeed=1"],
        };
        let json = run_tool(&self.binary, args, path)?;
        parse_mediainfo_duration(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_track_duration() {
        let json = r#"{"creatingLibrary":{"name":"MediaInfoLib"},"media":{"@ref":"a.mkv","track":[
            {"@type":"General","Format":"Matroska","Duration":"61.040"},
            {"@type":"Video","Format":"AV1","Duration":"61.000"}]}}"#;
        assert_eq!(parse_mediainfo_duration(json).unwrap(), Some(61.04));
    }

    #[test]
    fn missing_duration_or_media() {
        let json = r#"{"media":{"track":[{"@type":"General","Format":"Matroska"}]}}"#;
        assert_eq!(parse_mediainfo_duration(json).unwrap(), None);
        assert_eq!(parse_mediainfo_duration(r#"{"media":null}"#).unwrap(), None);
        assert!(parse_mediainfo_duration("<xml/>").is_err());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let provider = MediaInfoDuration::new("/nonexistent/mediainfo");
        assert!(matches!(
            provider.try_duration(Path::new("a.mkv"), ScanDepth::Normal),
            Err(ProbeError::Launch { .. })
        ));
    }
}
