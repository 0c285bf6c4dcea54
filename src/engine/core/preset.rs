use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Output video codec family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetCodec {
    #[default]
    H264,
    H265,
}

impl TargetCodec {
    /// Suffix used in ffmpeg encoder names (`h264_nvenc`, `hevc_qsv`, ...)
    pub fn encoder_prefix(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "hevc",
        }
    }

    /// Short tag used in output filenames
    pub fn file_tag(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
        }
    }
}

impl fmt::Display for TargetCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "H264"),
            Self::H265 => write!(f, "H265"),
        }
    }
}

/// Which encoder vendor to try first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EncoderPriority {
    /// NVENC, then QSV, then AMF, then CPU
    #[default]
    AutoHW,
    Nvenc,
    Qsv,
    Amf,
    Cpu,
}

impl EncoderPriority {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AutoHW => "Auto(HW)",
            Self::Nvenc => "NVENC",
            Self::Qsv => "Intel QSV",
            Self::Amf => "AMD AMF",
            Self::Cpu => "CPU",
        }
    }

    /// Parse a user-supplied priority name (case-insensitive)
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "auto" | "autohw" | "auto(hw)" => Some(Self::AutoHW),
            "nvenc" => Some(Self::Nvenc),
            "qsv" | "intel qsv" => Some(Self::Qsv),
            "amf" | "amd amf" => Some(Self::Amf),
            "cpu" | "software" => Some(Self::Cpu),
            _ => None,
        }
    }
}

/// How the target bitrate is derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum BitrateMode {
    /// Use `Preset::bitrate_kbps` verbatim
    #[default]
    FixedKbps,
    /// Scale the source video bitrate by `Preset::multiplier`
    MultiplierFromSource,
    /// Codec-aware heuristic from source bitrate, resolution and frame rate
    AutoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioMode {
    #[default]
    Copy,
    /// Re-encode to AAC at 192 kbps
    Aac192,
}

/// A reusable encode configuration.
///
/// Queue items hold their own clone (see [`Preset::snapshot`]); editing a preset
/// afterwards never touches items that were already assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,

    #[serde(default)]
    pub target_codec: TargetCodec,

    #[serde(default)]
    pub bitrate_mode: BitrateMode,

    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// 0 = balanced multipliers, 100 = safe multipliers (auto-match only)
    #[serde(default)]
    pub auto_match_bias: u8,

    /// Empty string leaves the pixel format to the encoder
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    #[serde(default)]
    pub audio_mode: AudioMode,

    /// Force the libdav1d AV1 decoder when the ffmpeg build ships it
    #[serde(default = "default_true")]
    pub force_dav1d: bool,

    #[serde(default)]
    pub encoder_priority: EncoderPriority,

    /// Extra ffmpeg arguments, split shell-style, placed before the output path
    #[serde(default)]
    pub extra_args: String,

    #[serde(skip)]
    pub built_in: bool,
}

fn default_bitrate_kbps() -> u32 {
    8000
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            target_codec: TargetCodec::H264,
            bitrate_mode: BitrateMode::FixedKbps,
            bitrate_kbps: default_bitrate_kbps(),
            multiplier: default_multiplier(),
            auto_match_bias: 0,
            pixel_format: default_pixel_format(),
            audio_mode: AudioMode::Copy,
            force_dav1d: true,
            encoder_priority: EncoderPriority::AutoHW,
            extra_args: String::new(),
            built_in: false,
        }
    }
}

impl Preset {
    /// Deep copy for assignment to a queue item
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Copy under a new name with a fresh id (for "duplicate preset")
    pub fn duplicate(&self, new_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new_name.to_string(),
            built_in: false,
            ..self.clone()
        }
    }

    /// Human-readable bitrate policy, e.g. `8000 kbps` or `x1.50`
    pub fn bitrate_label(&self) -> String {
        match self.bitrate_mode {
            BitrateMode::FixedKbps => format!("{} kbps", self.bitrate_kbps),
            BitrateMode::MultiplierFromSource => format!("x{:.2}", self.multiplier),
            BitrateMode::AutoMatch => format!("auto (bias {})", self.auto_match_bias.min(100)),
        }
    }

    /// Fixed-bitrate presets shipped with the binary
    pub fn defaults() -> Vec<Preset> {
        vec![
            Preset {
                id: Uuid::from_u128(0x1),
                name: "H264 8 Mbps".to_string(),
                target_codec: TargetCodec::H264,
                bitrate_kbps: 8000,
                built_in: true,
                ..Preset::default()
            },
            Preset {
                id: Uuid::from_u128(0x2),
                name: "H265 6 Mbps".to_string(),
                target_codec: TargetCodec::H265,
                bitrate_kbps: 6000,
                built_in: true,
                ..Preset::default()
            },
        ]
    }

    /// Auto-match presets; never written back to config
    pub fn auto_presets() -> Vec<Preset> {
        vec![
            Preset {
                id: Uuid::from_u128(0x11),
                name: "Auto H264 (match)".to_string(),
                target_codec: TargetCodec::H264,
                bitrate_mode: BitrateMode::AutoMatch,
                bitrate_kbps: 0,
                built_in: true,
                ..Preset::default()
            },
            Preset {
                id: Uuid::from_u128(0x12),
                name: "Auto H265 (match)".to_string(),
                target_codec: TargetCodec::H265,
                bitrate_mode: BitrateMode::AutoMatch,
                bitrate_kbps: 0,
                built_in: true,
                ..Preset::default()
            },
        ]
    }

    /// Built-ins followed by user presets
    pub fn all(user: &[Preset]) -> Vec<Preset> {
        let mut presets = Self::auto_presets();
        presets.extend(Self::defaults());
        presets.extend(user.iter().cloned());
        presets
    }

    /// Find a preset by name (case-insensitive)
    pub fn find<'a>(presets: &'a [Preset], name: &str) -> Option<&'a Preset> {
        presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_independent_of_source() {
        let mut live = Preset::defaults().remove(0);
        let snap = live.snapshot();
        live.bitrate_kbps = 1;
        live.pixel_format = "nv12".to_string();
        assert_eq!(snap.bitrate_kbps, 8000);
        assert_eq!(snap.pixel_format, "yuv420p");
    }

    #[test]
    fn duplicate_gets_new_identity() {
        let base = Preset::defaults().remove(1);
        let copy = base.duplicate("Mine");
        assert_ne!(copy.id, base.id);
        assert_eq!(copy.name, "Mine");
        assert!(!copy.built_in);
        assert_eq!(copy.target_codec, TargetCodec::H265);
    }

    #[test]
    fn find_is_case_insensitive() {
        let all = Preset::all(&[]);
        let found = Preset::find(&all, "auto h265 (MATCH)").unwrap();
        assert_eq!(found.bitrate_mode, BitrateMode::AutoMatch);
        assert!(Preset::find(&all, "nope").is_none());
    }

    #[test]
    fn priority_parse_accepts_labels() {
        assert_eq!(EncoderPriority::parse("Intel QSV"), Some(EncoderPriority::Qsv));
        assert_eq!(EncoderPriority::parse("nvenc"), Some(EncoderPriority::Nvenc));
        assert_eq!(EncoderPriority::parse("auto"), Some(EncoderPriority::AutoHW));
        assert_eq!(EncoderPriority::parse("vaapi"), None);
    }

    #[test]
    fn preset_deserializes_with_defaults() {
        let preset: Preset = toml::from_str(r#"name = "Tiny""#).unwrap();
        assert_eq!(preset.bitrate_kbps, 8000);
        assert!(preset.force_dav1d);
        assert_eq!(preset.audio_mode, AudioMode::Copy);
        assert_ne!(preset.id, Uuid::nil());
    }
}
