//! Hardware encoder detection and selection

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use serde::Serialize;

use crate::engine::core::log::{LogSink, LogSinkExt};
use crate::engine::core::preset::{EncoderPriority, TargetCodec};

/// libx264/libx265 presets, fastest first
pub const X26X_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// NVENC presets indexed by speed/quality knob 1-9
pub const NVENC_PRESETS: &[&str] = &["p1", "p2", "p3", "p4", "p4", "p5", "p6", "p7", "p7"];

/// QSV presets for the fast/balanced/quality buckets
pub const QSV_PRESETS: &[&str] = &["veryfast", "medium", "veryslow"];

/// AMF `-quality` values for the fast/balanced/quality buckets
pub const AMF_QUALITY: &[&str] = &["speed", "balanced", "quality"];

/// AV1 software decoder forced in front of the input
pub const DAV1D_DECODER: &str = "libdav1d";

// ============================================================================
// Vendors and encoders
// ============================================================================

/// Hardware encoder vendor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Vendor {
    Nvenc,
    Qsv,
    Amf,
}

impl Vendor {
    /// Order tried by `AutoHW`
    pub const AUTO_ORDER: [Vendor; 3] = [Vendor::Nvenc, Vendor::Qsv, Vendor::Amf];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Nvenc => "NVENC",
            Self::Qsv => "QSV",
            Self::Amf => "AMF",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Nvenc => "nvenc",
            Self::Qsv => "qsv",
            Self::Amf => "amf",
        }
    }

    fn from_priority(priority: EncoderPriority) -> Option<Self> {
        match priority {
            EncoderPriority::Nvenc => Some(Self::Nvenc),
            EncoderPriority::Qsv => Some(Self::Qsv),
            EncoderPriority::Amf => Some(Self::Amf),
            EncoderPriority::AutoHW | EncoderPriority::Cpu => None,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A concrete ffmpeg video encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VideoEncoder {
    /// Software encoder for the codec (libx264 / libx265)
    Cpu(TargetCodec),
    Hardware(Vendor, TargetCodec),
}

impl VideoEncoder {
    /// Get the FFmpeg encoder name
    pub fn ffmpeg_name(&self) -> String {
        match self {
            Self::Cpu(TargetCodec::H264) => "libx264".to_string(),
            Self::Cpu(TargetCodec::H265) => "libx265".to_string(),
            Self::Hardware(vendor, codec) => {
                format!("{}_{}", codec.encoder_prefix(), vendor.suffix())
            }
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware(..))
    }

    pub fn codec(&self) -> TargetCodec {
        match self {
            Self::Cpu(codec) | Self::Hardware(_, codec) => *codec,
        }
    }

    /// Speed/quality arguments for a knob value (clamped to 1-9).
    ///
    /// Software and NVENC encoders get a nine step table, QSV and AMF use three
    /// buckets (1-3, 4-6, 7-9).
    pub fn speed_args(&self, speed_quality: u8) -> [&'static str; 2] {
        let step = usize::from(speed_quality.clamp(1, 9) - 1);
        let bucket = step / 3;
        match self {
            Self::Cpu(_) => ["-preset", X26X_PRESETS[step]],
            Self::Hardware(Vendor::Nvenc, _) => ["-preset", NVENC_PRESETS[step]],
            Self::Hardware(Vendor::Qsv, _) => ["-preset", QSV_PRESETS[bucket]],
            Self::Hardware(Vendor::Amf, _) => ["-quality", AMF_QUALITY[bucket]],
        }
    }
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ffmpeg_name())
    }
}

// ============================================================================
// Capability probing
// ============================================================================

/// Encoders and decoders a given ffmpeg binary reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EncoderCapabilities {
    pub h264_nvenc: bool,
    pub hevc_nvenc: bool,
    pub h264_qsv: bool,
    pub hevc_qsv: bool,
    pub h264_amf: bool,
    pub hevc_amf: bool,
    pub dav1d_decoder: bool,
}

fn contains_token(haystack_lower: &str, token: &str) -> bool {
    haystack_lower.contains(&token.to_ascii_lowercase())
}

impl EncoderCapabilities {
    /// Nothing available; CPU encoders are always assumed
    pub fn none() -> Self {
        Self::default()
    }

    /// Match the free-text listings case-insensitively against known encoder names
    pub fn from_listings(encoders: &str, decoders: &str) -> Self {
        let enc = encoders.to_ascii_lowercase();
        let dec = decoders.to_ascii_lowercase();
        Self {
            h264_nvenc: contains_token(&enc, "h264_nvenc"),
            hevc_nvenc: contains_token(&enc, "hevc_nvenc"),
            h264_qsv: contains_token(&enc, "h264_qsv"),
            hevc_qsv: contains_token(&enc, "hevc_qsv"),
            h264_amf: contains_token(&enc, "h264_amf"),
            hevc_amf: contains_token(&enc, "hevc_amf"),
            dav1d_decoder: contains_token(&dec, DAV1D_DECODER),
        }
    }

    pub fn supports(&self, vendor: Vendor, codec: TargetCodec) -> bool {
        match (vendor, codec) {
            (Vendor::Nvenc, TargetCodec::H264) => self.h264_nvenc,
            (Vendor::Nvenc, TargetCodec::H265) => self.hevc_nvenc,
            (Vendor::Qsv, TargetCodec::H264) => self.h264_qsv,
            (Vendor::Qsv, TargetCodec::H265) => self.hevc_qsv,
            (Vendor::Amf, TargetCodec::H264) => self.h264_amf,
            (Vendor::Amf, TargetCodec::H265) => self.hevc_amf,
        }
    }

    pub fn any_hardware(&self) -> bool {
        Vendor::AUTO_ORDER.iter().any(|v| {
            self.supports(*v, TargetCodec::H264) || self.supports(*v, TargetCodec::H265)
        })
    }
}

/// Run `<binary> -hide_banner <flag>` and return stdout followed by stderr
fn list_output(binary: &Path, flag: &str) -> std::io::Result<String> {
    let output = Command::new(binary)
        .args(["-hide_banner", flag])
        .output()?;
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}

/// Queries ffmpeg binaries for encoder/decoder support, caching by binary path.
///
/// A launch failure degrades to [`EncoderCapabilities::none`] and is not cached,
/// so a later probe (after the binary is installed) can still succeed.
#[derive(Debug, Default)]
pub struct CapabilityProbe {
    cache: Mutex<HashMap<PathBuf, EncoderCapabilities>>,
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, binary: &Path) -> Option<EncoderCapabilities> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(binary).copied())
    }

    pub fn probe(&self, binary: &Path, log: &dyn LogSink) -> EncoderCapabilities {
        if let Some(caps) = self.cached(binary) {
            return caps;
        }

        let listings = list_output(binary, "-encoders")
            .and_then(|enc| list_output(binary, "-decoders").map(|dec| (enc, dec)));

        match listings {
            Ok((encoders, decoders)) => {
                let caps = EncoderCapabilities::from_listings(&encoders, &decoders);
                tracing::debug!(binary = %binary.display(), ?caps, "probed encoder capabilities");
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(binary.to_path_buf(), caps);
                }
                caps
            }
            Err(e) => {
                log.warning(format!(
                    "Could not query {} for encoders ({}); using CPU encoders only",
                    binary.display(),
                    e
                ));
                EncoderCapabilities::none()
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

// ============================================================================
// Encoder selection
// ============================================================================

/// Pick the encoder for a codec under a vendor priority.
///
/// An explicit vendor is used only when the probe confirmed it for this codec,
/// otherwise the CPU encoder is chosen and a warning is logged. `AutoHW` tries
/// NVENC, QSV and AMF in that order before falling back to the CPU.
pub fn select_encoder(
    codec: TargetCodec,
    priority: EncoderPriority,
    caps: &EncoderCapabilities,
    log: &dyn LogSink,
) -> VideoEncoder {
    match priority {
        EncoderPriority::Cpu => VideoEncoder::Cpu(codec),
        EncoderPriority::AutoHW => Vendor::AUTO_ORDER
            .iter()
            .copied()
            .find(|vendor| caps.supports(*vendor, codec))
            .map(|vendor| VideoEncoder::Hardware(vendor, codec))
            .unwrap_or_else(|| {
                log.info(format!(
                    "No hardware {} encoder available. Using {}.",
                    codec,
                    VideoEncoder::Cpu(codec)
                ));
                VideoEncoder::Cpu(codec)
            }),
        explicit => match Vendor::from_priority(explicit) {
            Some(vendor) if caps.supports(vendor, codec) => VideoEncoder::Hardware(vendor, codec),
            Some(vendor) => {
                log.warning(format!(
                    "{} not available for {}. Falling back to CPU.",
                    vendor, codec
                ));
                VideoEncoder::Cpu(codec)
            }
            None => VideoEncoder::Cpu(codec),
        },
    }
}
