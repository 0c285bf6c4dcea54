//! Target bitrate resolution.
//!
//! Fixed presets pass their value through. Multiplier presets scale the source
//! video bitrate, falling back to a resolution tier table when the source does not
//! report one. Auto-match presets blend codec-specific multipliers and adjust for
//! resolution and frame rate.

use super::log::LogSink;
use super::log::LogSinkExt;
use super::preset::{BitrateMode, Preset, TargetCodec};
use super::types::ProbeInfo;

pub const MIN_MULTIPLIER: f64 = 0.1;
pub const MAX_MULTIPLIER: f64 = 10.0;
pub const MIN_TARGET_KBPS: u32 = 500;
pub const MAX_TARGET_KBPS: u32 = 200_000;

/// `(minimum long edge, assumed source kbps)`, highest tier first
pub const RESOLUTION_TIERS: &[(u32, u32)] = &[(2160, 20_000), (1440, 12_000), (1080, 8000), (720, 4500)];
pub const LOWEST_TIER_KBPS: u32 = 2500;

const BASE_PIXELS: f64 = 1920.0 * 1080.0;
const BASE_FPS: f64 = 60.0;
const AUTO_MIN_KBPS: u32 = 800;

/// Where the source bitrate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBitrate {
    /// Fixed preset, or nothing usable
    None,
    Video,
    Overall,
    /// Long edge of the frame used to pick a tier
    ResolutionTier(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBitrate {
    /// 0 means unresolvable
    pub target_kbps: u32,
    pub source_kbps: u32,
    pub source: SourceBitrate,
    /// Resolution/frame-rate factor (auto-match only, 1.0 otherwise)
    pub scale: f64,
}

impl ResolvedBitrate {
    fn unresolved() -> Self {
        Self {
            target_kbps: 0,
            source_kbps: 0,
            source: SourceBitrate::None,
            scale: 1.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.target_kbps > 0
    }
}

/// Assumed bitrate for a frame size, `None` when dimensions are unknown
pub fn tier_fallback_kbps(width: u32, height: u32) -> Option<u32> {
    let long_edge = width.max(height);
    if long_edge == 0 {
        return None;
    }
    let kbps = RESOLUTION_TIERS
        .iter()
        .find(|(min_edge, _)| long_edge >= *min_edge)
        .map(|(_, kbps)| *kbps)
        .unwrap_or(LOWEST_TIER_KBPS);
    Some(kbps)
}

fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

/// Multiplier mode: video bitrate, else the tier table
fn multiplier_source(info: &ProbeInfo) -> Option<(u32, SourceBitrate)> {
    if let Some(kbps) = positive(info.video_bitrate_kbps) {
        return Some((kbps, SourceBitrate::Video));
    }
    tier_fallback_kbps(info.width, info.height)
        .map(|kbps| (kbps, SourceBitrate::ResolutionTier(info.width.max(info.height))))
}

/// Auto-match: video bitrate, overall bitrate, then the tier table
fn auto_match_source(info: &ProbeInfo) -> Option<(u32, SourceBitrate)> {
    if let Some(kbps) = positive(info.video_bitrate_kbps) {
        return Some((kbps, SourceBitrate::Video));
    }
    if let Some(kbps) = positive(info.overall_bitrate_kbps) {
        return Some((kbps, SourceBitrate::Overall));
    }
    multiplier_source(info)
}

/// `clamp((w*h*fps / 1920*1080*60)^0.15, 0.85, 1.25)`; unknown fields assume 1080p60
pub fn auto_match_scale(info: &ProbeInfo) -> f64 {
    let width = if info.width > 0 { info.width as f64 } else { 1920.0 };
    let height = if info.height > 0 { info.height as f64 } else { 1080.0 };
    let fps = if info.fps > 0.0 { info.fps } else { BASE_FPS };
    let ratio = (width * height * fps) / (BASE_PIXELS * BASE_FPS);
    ratio.max(0.25).powf(0.15).clamp(0.85, 1.25)
}

/// `(balanced, safe)` multipliers for an AV1 source
pub fn codec_multipliers(codec: TargetCodec) -> (f64, f64) {
    match codec {
        TargetCodec::H264 => (2.2, 2.8),
        TargetCodec::H265 => (1.35, 1.6),
    }
}

fn compute_multiplier(multiplier: f64, info: &ProbeInfo) -> ResolvedBitrate {
    let Some((source_kbps, source)) = multiplier_source(info) else {
        return ResolvedBitrate::unresolved();
    };

    let factor = if multiplier.is_finite() {
        multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
    } else {
        1.0
    };
    let raw = (source_kbps as f64 * factor).round();
    let target = raw.clamp(MIN_TARGET_KBPS as f64, MAX_TARGET_KBPS as f64) as u32;

    ResolvedBitrate {
        target_kbps: target,
        source_kbps,
        source,
        scale: 1.0,
    }
}

fn compute_auto_match(codec: TargetCodec, bias: u8, info: &ProbeInfo) -> ResolvedBitrate {
    let Some((source_kbps, source)) = auto_match_source(info) else {
        return ResolvedBitrate::unresolved();
    };

    let scale = auto_match_scale(info);
    let (balanced, safe) = codec_multipliers(codec);
    let t = (bias.min(100) as f64) / 100.0;
    let multiplier = balanced + (safe - balanced) * t;
    let raw = source_kbps as f64 * multiplier * scale;
    let rounded = ((raw / 100.0).round() * 100.0) as u64;

    let floor = AUTO_MIN_KBPS.max((source_kbps as f64 * 0.25).round() as u32) as u64;
    let ceiling = 10 * source_kbps as u64;
    // tiny sources can put the floor above the ceiling; the ceiling wins
    let target = rounded.max(floor).min(ceiling) as u32;

    ResolvedBitrate {
        target_kbps: target,
        source_kbps,
        source,
        scale,
    }
}

/// Resolve without logging
pub fn compute_bitrate(preset: &Preset, probe: Option<&ProbeInfo>) -> ResolvedBitrate {
    match preset.bitrate_mode {
        BitrateMode::FixedKbps => ResolvedBitrate {
            target_kbps: preset.bitrate_kbps,
            ..ResolvedBitrate::unresolved()
        },
        BitrateMode::MultiplierFromSource => match probe {
            Some(info) => compute_multiplier(preset.multiplier, info),
            None => ResolvedBitrate::unresolved(),
        },
        BitrateMode::AutoMatch => match probe {
            Some(info) => compute_auto_match(preset.target_codec, preset.auto_match_bias, info),
            None => ResolvedBitrate::unresolved(),
        },
    }
}

/// Resolve the target bitrate in kbps, 0 when unresolvable.
///
/// Emits a warning when the resolution tier table stood in for a missing source
/// bitrate.
pub fn resolve_bitrate(preset: &Preset, probe: Option<&ProbeInfo>, log: &dyn LogSink) -> u32 {
    let resolved = compute_bitrate(preset, probe);
    if let SourceBitrate::ResolutionTier(edge) = resolved.source {
        log.warning(format!(
            "Source bitrate unknown; assuming {} kbps for a {}p-class source",
            resolved.source_kbps, edge
        ));
    }
    resolved.target_kbps
}

/// Rough output size in KB for a duration at a bitrate
pub fn estimated_size_kb(duration_s: f64, kbps: u32) -> Option<u64> {
    let size = duration_s * (kbps as f64 / 8.0);
    if size > 0.0 && size.is_finite() {
        Some(size.round() as u64)
    } else {
        None
    }
}
