// Global configuration management

use crate::engine::core::output::DEFAULT_FILENAME_PATTERN;
use crate::engine::core::preset::{EncoderPriority, Preset};
use crate::engine::probe::sibling_ffprobe;
use crate::engine::worker::RunSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,

    #[serde(default)]
    pub run: RunConfig,

    /// User presets, listed after the built-in ones
    #[serde(default)]
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Defaults to the ffprobe next to `ffmpeg_path`
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub mediainfo_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Used when `same_as_source` is off
    #[serde(default)]
    pub output_folder: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub same_as_source: bool,

    /// Overrides the priority stored in each preset
    #[serde(default)]
    pub encoder_priority: Option<EncoderPriority>,

    /// 1 = fastest, 9 = best quality
    #[serde(default = "default_speed_quality")]
    pub speed_quality: u8,

    #[serde(default)]
    pub uncheck_after_render: bool,

    #[serde(default = "default_true")]
    pub only_av1_sources: bool,

    /// Supports: {basename}, {filename}, {codec}
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    #[serde(default)]
    pub last_selected_preset: Option<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_true() -> bool {
    true
}

fn default_speed_quality() -> u8 {
    5
}

fn default_filename_pattern() -> String {
    DEFAULT_FILENAME_PATTERN.to_string()
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: None,
            mediainfo_path: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_folder: None,
            same_as_source: true,
            encoder_priority: None,
            speed_quality: default_speed_quality(),
            uncheck_after_render: false,
            only_av1_sources: true,
            filename_pattern: default_filename_pattern(),
            last_selected_preset: None,
        }
    }
}

impl FfmpegConfig {
    pub fn ffprobe(&self) -> PathBuf {
        self.ffprobe_path
            .clone()
            .unwrap_or_else(|| sibling_ffprobe(&self.ffmpeg_path))
    }

    pub fn mediainfo(&self) -> PathBuf {
        self.mediainfo_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("mediainfo"))
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("transq")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("transq")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk; a missing file yields the defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Built-in presets followed by the user's
    pub fn all_presets(&self) -> Vec<Preset> {
        Preset::all(&self.presets)
    }

    /// Resolve a preset by name, falling back to the last selection and then
    /// the first fixed-bitrate built-in
    pub fn preset(&self, name: Option<&str>) -> Option<Preset> {
        match name.or(self.run.last_selected_preset.as_deref()) {
            Some(name) => Preset::find(&self.all_presets(), name).cloned(),
            None => Preset::defaults().into_iter().next(),
        }
    }

    /// Owned settings for one run; the engine never writes them back
    pub fn run_settings(&self) -> RunSettings {
        let output_folder = if self.run.same_as_source {
            None
        } else {
            self.run.output_folder.clone()
        };

        RunSettings {
            ffmpeg_path: self.ffmpeg.ffmpeg_path.clone(),
            output_folder,
            encoder_priority: self.run.encoder_priority,
            speed_quality: self.run.speed_quality.clamp(1, 9),
            uncheck_after_render: self.run.uncheck_after_render,
            only_av1_sources: self.run.only_av1_sources,
            filename_pattern: self.run.filename_pattern.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ffmpeg.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert!(config.run.same_as_source);
        assert!(config.run.only_av1_sources);
        assert_eq!(config.run.speed_quality, 5);
        assert_eq!(config.run.encoder_priority, None);
        assert_eq!(config.run.filename_pattern, "{basename}_{codec}");
        assert!(config.presets.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [run]
            speed_quality = 8
            same_as_source = false
            output_folder = "/out"
            "#,
        )
        .unwrap();
        assert_eq!(config.run.speed_quality, 8);
        assert!(config.run.only_av1_sources);

        let settings = config.run_settings();
        assert_eq!(settings.output_folder, Some(PathBuf::from("/out")));
        assert_eq!(settings.speed_quality, 8);
    }

    #[test]
    fn test_same_as_source_ignores_folder() {
        let mut config = Config::default();
        config.run.output_folder = Some(PathBuf::from("/out"));
        assert_eq!(config.run_settings().output_folder, None);
    }

    #[test]
    fn test_user_presets_roundtrip_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("transq").join("config.toml");

        let mut config = Config::default();
        let mine = Preset::defaults()[1].duplicate("Archive HEVC");
        config.presets.push(mine.clone());
        config.run.last_selected_preset = Some("Archive HEVC".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.presets, vec![mine]);
        assert_eq!(loaded.preset(None).unwrap().name, "Archive HEVC");
        assert_eq!(loaded.preset(Some("H264 8 Mbps")).unwrap().name, "H264 8 Mbps");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.presets.is_empty());
    }
}
